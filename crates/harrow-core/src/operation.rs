//! Operations: the descriptor-level description of one write.

use harrow_types::{Cd, ColumnMask, Lts, OperationKind, Pd};

use crate::query::ClusteringRange;

/// One generated write, before compilation into a statement.
///
/// Everything here is derived from `(seed, schema, lts, pd, op_id)`; two
/// derivations of the same operation compare equal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operation {
    pub lts: Lts,
    pub pd: Pd,
    /// Index of the modification this operation belongs to within its visit.
    pub modification: usize,
    /// Index of the operation within its visit, across modifications.
    pub op_id: usize,
    pub kind: OperationKind,
    pub cd: Cd,
    /// Value descriptors, one per regular column. Empty for deletes.
    pub vds: Vec<u64>,
    /// Value descriptors, one per static column. Empty unless the kind
    /// writes statics.
    pub sds: Vec<u64>,
    /// Regular columns written or deleted.
    pub regular_mask: ColumnMask,
    /// Static columns written or deleted.
    pub static_mask: ColumnMask,
    /// Clustering range of range and slice deletes.
    pub range: Option<ClusteringRange>,
}
