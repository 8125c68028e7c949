//! # harrow-types: Core types for `harrow`
//!
//! This crate contains the small value types every other harrow crate
//! passes around:
//! - Logical and real timestamps ([`Lts`], [`Rts`])
//! - Descriptors ([`Pd`], [`Cd`])
//! - Operation kinds ([`OperationKind`])
//! - Consistency levels ([`ConsistencyLevel`])
//! - Column masks ([`ColumnMask`])
//!
//! Descriptors are never stored as objects. They are recomputed from
//! `(seed, schema, lts, attempt)` whenever they are needed, so all of these
//! types are `Copy` and compare by their integer value.

use std::fmt::{self, Display};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ============================================================================
// Timestamps - Copy (8-byte values)
// ============================================================================

/// Logical timestamp: the index of one generated visit.
///
/// The same lts with the same seed and schema always yields the same
/// descriptors and statements.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct Lts(u64);

impl Lts {
    pub const ZERO: Lts = Lts(0);

    /// Largest lts a run may use. Clocks reserve the space above it so
    /// `rts(MAX) + 1` still fits in a signed 64-bit write timestamp.
    pub const MAX: Lts = Lts(1 << 62);

    pub const fn new(lts: u64) -> Self {
        Self(lts)
    }

    /// Returns the lts as a `u64`.
    pub const fn as_u64(&self) -> u64 {
        self.0
    }

    /// Returns the following logical timestamp.
    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }
}

impl Display for Lts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Lts {
    fn from(lts: u64) -> Self {
        Self(lts)
    }
}

/// Real timestamp: the write timestamp handed to the system under test.
///
/// Produced from an [`Lts`] by a monotonic clock. Always below `i64::MAX`
/// so it can be bound as a CQL `bigint`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Rts(u64);

impl Rts {
    pub const fn new(rts: u64) -> Self {
        Self(rts)
    }

    pub const fn as_u64(&self) -> u64 {
        self.0
    }

    /// Returns the timestamp as the signed value the SUT stores.
    pub fn as_i64(&self) -> i64 {
        self.0 as i64
    }

    /// Returns the smallest timestamp strictly greater than this one.
    pub fn successor(&self) -> Self {
        Self(self.0 + 1)
    }
}

impl Display for Rts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Descriptors - Copy (8-byte values)
// ============================================================================

/// Partition descriptor. Stable for the lifetime of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Pd(u64);

impl Pd {
    pub const fn new(pd: u64) -> Self {
        Self(pd)
    }

    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Display for Pd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Clustering descriptor: identifies a row within a partition.
///
/// Ordering of clustering descriptors matches the ordering of the
/// clustering values they decode to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Cd(u64);

impl Cd {
    pub const fn new(cd: u64) -> Self {
        Self(cd)
    }

    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Display for Cd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Operation Kinds
// ============================================================================

/// What a single generated operation does to its partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    /// Insert a full row (row marker plus every regular column).
    Insert,
    /// Insert a full row and every static column.
    InsertWithStatics,
    /// Update a non-empty subset of regular columns.
    Update,
    /// Update a subset of regular columns and a subset of static columns.
    UpdateWithStatics,
    /// Delete a single row.
    DeleteRow,
    /// Delete the whole partition.
    DeletePartition,
    /// Delete a subset of regular columns of one row.
    DeleteColumns,
    /// Delete a subset of regular and static columns.
    DeleteColumnsWithStatics,
    /// Delete a clustering range bounded on both sides.
    DeleteRange,
    /// Delete a clustering range open on one side.
    DeleteSlice,
}

impl OperationKind {
    /// Every kind, in declaration order.
    pub const ALL: [OperationKind; 10] = [
        OperationKind::Insert,
        OperationKind::InsertWithStatics,
        OperationKind::Update,
        OperationKind::UpdateWithStatics,
        OperationKind::DeleteRow,
        OperationKind::DeletePartition,
        OperationKind::DeleteColumns,
        OperationKind::DeleteColumnsWithStatics,
        OperationKind::DeleteRange,
        OperationKind::DeleteSlice,
    ];

    /// Returns true for every kind that removes data.
    pub fn is_delete(&self) -> bool {
        matches!(
            self,
            Self::DeleteRow
                | Self::DeletePartition
                | Self::DeleteColumns
                | Self::DeleteColumnsWithStatics
                | Self::DeleteRange
                | Self::DeleteSlice
        )
    }

    /// Returns true if the operation touches static columns.
    pub fn touches_statics(&self) -> bool {
        matches!(
            self,
            Self::InsertWithStatics | Self::UpdateWithStatics | Self::DeleteColumnsWithStatics
        )
    }

    /// Returns true if only a subset of columns is written or deleted.
    pub fn uses_column_subset(&self) -> bool {
        matches!(
            self,
            Self::Update
                | Self::UpdateWithStatics
                | Self::DeleteColumns
                | Self::DeleteColumnsWithStatics
        )
    }

    /// Returns true if the operation addresses a clustering range.
    pub fn is_range(&self) -> bool {
        matches!(self, Self::DeleteRange | Self::DeleteSlice)
    }

    /// Stable name used in configuration files and logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Insert => "insert",
            Self::InsertWithStatics => "insert_with_statics",
            Self::Update => "update",
            Self::UpdateWithStatics => "update_with_statics",
            Self::DeleteRow => "delete_row",
            Self::DeletePartition => "delete_partition",
            Self::DeleteColumns => "delete_columns",
            Self::DeleteColumnsWithStatics => "delete_columns_with_statics",
            Self::DeleteRange => "delete_range",
            Self::DeleteSlice => "delete_slice",
        }
    }
}

impl Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error returned when parsing an unknown operation kind name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownOperationKind(pub String);

impl Display for UnknownOperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown operation kind: {}", self.0)
    }
}

impl std::error::Error for UnknownOperationKind {}

impl FromStr for OperationKind {
    type Err = UnknownOperationKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| UnknownOperationKind(s.to_string()))
    }
}

// ============================================================================
// Consistency Levels
// ============================================================================

/// Consistency level a statement is executed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConsistencyLevel {
    One,
    #[default]
    Quorum,
    /// Every replica. Used by corruptors and high-assurance reads.
    All,
}

impl Display for ConsistencyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::One => f.write_str("ONE"),
            Self::Quorum => f.write_str("QUORUM"),
            Self::All => f.write_str("ALL"),
        }
    }
}

// ============================================================================
// Column Mask
// ============================================================================

/// Set of column indexes (at most 64) an operation writes or deletes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ColumnMask(u64);

impl ColumnMask {
    pub const MAX_COLUMNS: usize = 64;

    pub fn empty() -> Self {
        Self(0)
    }

    /// Mask selecting the first `count` columns.
    pub fn all(count: usize) -> Self {
        debug_assert!(count <= Self::MAX_COLUMNS, "too many columns: {count}");
        if count >= Self::MAX_COLUMNS {
            Self(u64::MAX)
        } else {
            Self((1u64 << count) - 1)
        }
    }

    pub fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    pub fn bits(&self) -> u64 {
        self.0
    }

    pub fn contains(&self, index: usize) -> bool {
        index < Self::MAX_COLUMNS && self.0 & (1u64 << index) != 0
    }

    pub fn with(self, index: usize) -> Self {
        debug_assert!(index < Self::MAX_COLUMNS);
        Self(self.0 | (1u64 << index))
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn count(&self) -> usize {
        self.0.count_ones() as usize
    }

    /// Iterates over the selected column indexes in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        (0..Self::MAX_COLUMNS).filter(|i| self.contains(*i))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use test_case::test_case;

    #[test]
    fn lts_next_increments() {
        assert_eq!(Lts::ZERO.next(), Lts::new(1));
        assert_eq!(Lts::new(41).next().as_u64(), 42);
    }

    #[test]
    fn rts_successor_is_strictly_greater() {
        let rts = Rts::new(1_000);
        assert!(rts.successor() > rts);
        assert_eq!(rts.successor().as_i64(), 1_001);
    }

    #[test_case(OperationKind::Insert, false, false, false)]
    #[test_case(OperationKind::UpdateWithStatics, false, true, true)]
    #[test_case(OperationKind::DeleteColumnsWithStatics, true, true, true)]
    #[test_case(OperationKind::DeleteRange, true, false, false)]
    #[test_case(OperationKind::DeletePartition, true, false, false)]
    fn operation_kind_classification(
        kind: OperationKind,
        delete: bool,
        statics: bool,
        subset: bool,
    ) {
        assert_eq!(kind.is_delete(), delete);
        assert_eq!(kind.touches_statics(), statics);
        assert_eq!(kind.uses_column_subset(), subset);
    }

    #[test]
    fn operation_kind_names_parse_back() {
        for kind in OperationKind::ALL {
            assert_eq!(kind.name().parse::<OperationKind>(), Ok(kind));
        }
        assert!("upsert".parse::<OperationKind>().is_err());
    }

    #[test]
    fn column_mask_all_and_iter() {
        let mask = ColumnMask::all(3);
        assert_eq!(mask.iter().collect::<Vec<_>>(), vec![0, 1, 2]);
        assert_eq!(ColumnMask::all(64).count(), 64);
        assert!(ColumnMask::empty().is_empty());
        assert!(ColumnMask::empty().with(5).contains(5));
        assert!(!ColumnMask::all(64).contains(64));
    }

    #[test]
    fn consistency_level_displays_cql_name() {
        assert_eq!(ConsistencyLevel::All.to_string(), "ALL");
        assert_eq!(ConsistencyLevel::default(), ConsistencyLevel::Quorum);
    }

    proptest! {
        #[test]
        fn descriptor_order_follows_integer_order(a: u64, b: u64) {
            prop_assert_eq!(Cd::new(a).cmp(&Cd::new(b)), a.cmp(&b));
            prop_assert_eq!(Lts::new(a).cmp(&Lts::new(b)), a.cmp(&b));
        }
    }
}
