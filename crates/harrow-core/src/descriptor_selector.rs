//! Deterministic derivation of clustering and value descriptors.
//!
//! The descriptor selector is the single source of truth for "what data
//! could exist". The generator, the validation path and the corruptors all
//! ask it for candidates and apply their own acceptance rules on top.
//!
//! Every method is a pure function of the run seed, the schema and its
//! arguments. Nothing is cached; derivations are recomputed on demand.

use std::fmt::Debug;
use std::ops::Bound;
use std::sync::Arc;

use harrow_schema::SchemaSpec;
use harrow_types::{Cd, ColumnMask, Lts, OperationKind, Pd};

use crate::error::SelectorConfigError;
use crate::operation::Operation;
use crate::query::ClusteringRange;
use crate::rng::{PcgRng, stream_key};
use crate::streams;

/// Candidate generation shared by generators, validators and corruptors.
pub trait DescriptorSelector: Send + Sync + Debug {
    /// Pseudo-random clustering descriptor for `pd`. The same
    /// `(pd, attempt)` always yields the same cd; callers walk `attempt`
    /// to produce a sequence of candidates.
    fn random_cd(&self, pd: Pd, attempt: u64) -> Cd;

    /// Value descriptors for the regular columns of a row, one per column.
    ///
    /// Delete kinds still derive descriptors; callers ignore them.
    fn vds(&self, pd: Pd, cd: Cd, lts: Lts, op_id: usize, kind: OperationKind) -> Vec<u64>;

    /// Upper bound on distinct clustering descriptors per partition.
    fn max_partition_size(&self) -> u64;
}

// ============================================================================
// Configuration
// ============================================================================

/// Distribution of a per-visit count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Distribution {
    Constant(u64),
    /// Uniform over `min..=max`.
    Uniform { min: u64, max: u64 },
}

impl Distribution {
    /// Maps a random number onto the distribution.
    pub fn sample(&self, random: u64) -> u64 {
        match *self {
            Distribution::Constant(value) => value,
            Distribution::Uniform { min, max } => match max.saturating_sub(min).checked_add(1) {
                Some(span) => min + random % span,
                None => random,
            },
        }
    }

    fn validate(&self, name: &'static str) -> Result<(), SelectorConfigError> {
        match *self {
            Distribution::Uniform { min, max } if min > max => {
                Err(SelectorConfigError::InvalidDistribution { name, min, max })
            }
            _ => Ok(()),
        }
    }
}

/// Shape of the generated workload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorConfig {
    /// Distinct clustering descriptors a partition may hold.
    pub max_partition_size: u64,
    pub modifications_per_lts: Distribution,
    pub operations_per_modification: Distribution,
    /// Relative weight of each operation kind. Kinds missing here, or not
    /// applicable to the schema, are never generated.
    pub operation_weights: Vec<(OperationKind, u32)>,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            max_partition_size: 100,
            modifications_per_lts: Distribution::Uniform { min: 1, max: 2 },
            operations_per_modification: Distribution::Uniform { min: 1, max: 3 },
            operation_weights: vec![
                (OperationKind::Insert, 30),
                (OperationKind::InsertWithStatics, 5),
                (OperationKind::Update, 20),
                (OperationKind::UpdateWithStatics, 5),
                (OperationKind::DeleteRow, 5),
                (OperationKind::DeletePartition, 1),
                (OperationKind::DeleteColumns, 5),
                (OperationKind::DeleteColumnsWithStatics, 2),
                (OperationKind::DeleteRange, 2),
                (OperationKind::DeleteSlice, 2),
            ],
        }
    }
}

// ============================================================================
// Default Selector
// ============================================================================

/// Schema-aware descriptor selector driven by [`PcgRng`].
#[derive(Debug, Clone)]
pub struct DefaultDescriptorSelector {
    rng: PcgRng,
    schema: Arc<SchemaSpec>,
    config: SelectorConfig,
    /// Applicable kinds with cumulative weights.
    cumulative_weights: Vec<(OperationKind, u64)>,
}

impl DefaultDescriptorSelector {
    pub fn new(
        rng: PcgRng,
        schema: Arc<SchemaSpec>,
        config: SelectorConfig,
    ) -> Result<Self, SelectorConfigError> {
        if config.max_partition_size == 0 {
            return Err(SelectorConfigError::ZeroPartitionSize);
        }
        config
            .modifications_per_lts
            .validate("modifications_per_lts")?;
        config
            .operations_per_modification
            .validate("operations_per_modification")?;

        let mut total = 0u64;
        let cumulative_weights: Vec<(OperationKind, u64)> = config
            .operation_weights
            .iter()
            .filter(|(kind, weight)| *weight > 0 && applies_to(*kind, &schema))
            .map(|(kind, weight)| {
                total += u64::from(*weight);
                (*kind, total)
            })
            .collect();
        if cumulative_weights.is_empty() {
            return Err(SelectorConfigError::NoOperationWeights);
        }

        Ok(Self {
            rng,
            schema,
            config,
            cumulative_weights,
        })
    }

    pub fn schema(&self) -> &Arc<SchemaSpec> {
        &self.schema
    }

    pub fn config(&self) -> &SelectorConfig {
        &self.config
    }

    /// The clustering descriptor occupying `position` in a partition.
    ///
    /// Positions `0..max_partition_size` enumerate every cd the generator
    /// can write to `pd`.
    pub fn cd_at_position(&self, pd: Pd, position: u64) -> Cd {
        let raw = self
            .rng
            .random_number(position, stream_key(&[streams::CD, pd.as_u64()]));
        Cd::new(self.schema.ck_codec().adjust(raw))
    }

    /// Clustering descriptor written by operation `op_id` of a visit.
    pub fn cd(&self, pd: Pd, lts: Lts, op_id: usize) -> Cd {
        let position = self.rng.bounded(
            op_id as u64,
            stream_key(&[streams::CD_POSITION, pd.as_u64(), lts.as_u64()]),
            self.config.max_partition_size,
        );
        self.cd_at_position(pd, position)
    }

    /// Number of modifications in the visit of `pd` at `lts`.
    pub fn modifications(&self, pd: Pd, lts: Lts) -> u64 {
        let random = self.rng.random_number(
            0,
            stream_key(&[streams::MODIFICATIONS, pd.as_u64(), lts.as_u64()]),
        );
        self.config.modifications_per_lts.sample(random)
    }

    /// Number of operations in one modification.
    pub fn operations_in(&self, pd: Pd, lts: Lts, modification: usize) -> u64 {
        let random = self.rng.random_number(
            modification as u64,
            stream_key(&[streams::OPERATIONS, pd.as_u64(), lts.as_u64()]),
        );
        self.config.operations_per_modification.sample(random)
    }

    pub fn operation_kind(&self, pd: Pd, lts: Lts, op_id: usize) -> OperationKind {
        let total = self.cumulative_weights.last().map_or(0, |(_, total)| *total);
        let pick = self.rng.bounded(
            op_id as u64,
            stream_key(&[streams::OPERATION_KIND, pd.as_u64(), lts.as_u64()]),
            total,
        );
        self.cumulative_weights
            .iter()
            .find(|(_, cumulative)| pick < *cumulative)
            .map_or(OperationKind::Insert, |(kind, _)| *kind)
    }

    /// Value descriptors for the static columns, one per column.
    pub fn sds(&self, pd: Pd, lts: Lts, op_id: usize, kind: OperationKind) -> Vec<u64> {
        self.schema
            .statics()
            .iter()
            .enumerate()
            .map(|(i, column)| {
                let stream = stream_key(&[
                    streams::SD,
                    pd.as_u64(),
                    lts.as_u64(),
                    kind_tag(kind),
                    i as u64,
                ]);
                column
                    .data_type
                    .adjust_entropy_domain(self.rng.random_number(op_id as u64, stream))
            })
            .collect()
    }

    /// Regular columns an operation writes or deletes.
    pub fn regular_mask(&self, pd: Pd, lts: Lts, op_id: usize, kind: OperationKind) -> ColumnMask {
        let count = self.schema.regulars().len();
        match kind {
            OperationKind::Insert | OperationKind::InsertWithStatics => ColumnMask::all(count),
            OperationKind::Update
            | OperationKind::UpdateWithStatics
            | OperationKind::DeleteColumns
            | OperationKind::DeleteColumnsWithStatics => {
                self.subset(pd, lts, op_id, kind, 0, count)
            }
            _ => ColumnMask::empty(),
        }
    }

    /// Static columns an operation writes or deletes.
    pub fn static_mask(&self, pd: Pd, lts: Lts, op_id: usize, kind: OperationKind) -> ColumnMask {
        let count = self.schema.statics().len();
        if count == 0 {
            return ColumnMask::empty();
        }
        match kind {
            OperationKind::InsertWithStatics => ColumnMask::all(count),
            OperationKind::UpdateWithStatics | OperationKind::DeleteColumnsWithStatics => {
                self.subset(pd, lts, op_id, kind, 1, count)
            }
            _ => ColumnMask::empty(),
        }
    }

    /// Non-empty pseudo-random subset of `count` columns.
    fn subset(
        &self,
        pd: Pd,
        lts: Lts,
        op_id: usize,
        kind: OperationKind,
        family: u64,
        count: usize,
    ) -> ColumnMask {
        let stream = stream_key(&[
            streams::COLUMN_MASK,
            pd.as_u64(),
            lts.as_u64(),
            kind_tag(kind),
            family,
        ]);
        let random = self.rng.random_number(op_id as u64, stream);
        let mask = ColumnMask::from_bits(random & ColumnMask::all(count).bits());
        if mask.is_empty() {
            ColumnMask::empty().with((random % count as u64) as usize)
        } else {
            mask
        }
    }

    /// Clustering range of a range or slice delete.
    pub fn range(
        &self,
        pd: Pd,
        lts: Lts,
        op_id: usize,
        kind: OperationKind,
    ) -> Option<ClusteringRange> {
        let draw = |part: u64| {
            self.rng.random_number(
                op_id as u64,
                stream_key(&[streams::RANGE, pd.as_u64(), lts.as_u64(), part]),
            )
        };
        let bound = |cd: Cd, inclusive: bool| {
            if inclusive {
                Bound::Included(cd)
            } else {
                Bound::Excluded(cd)
            }
        };
        let mps = self.config.max_partition_size;
        let flags = draw(2);

        match kind {
            OperationKind::DeleteRange => {
                let a = self.cd_at_position(pd, draw(0) % mps);
                let b = self.cd_at_position(pd, draw(1) % mps);
                let (lower, upper) = if a <= b { (a, b) } else { (b, a) };
                // An exclusive range over a single cd would be empty.
                let single = lower == upper;
                Some(ClusteringRange::new(
                    bound(lower, single || flags & 1 == 1),
                    bound(upper, single || flags & 2 == 2),
                ))
            }
            OperationKind::DeleteSlice => {
                let cd = self.cd_at_position(pd, draw(0) % mps);
                let edge = bound(cd, flags & 1 == 1);
                Some(if flags & 4 == 4 {
                    ClusteringRange::new(edge, Bound::Unbounded)
                } else {
                    ClusteringRange::new(Bound::Unbounded, edge)
                })
            }
            _ => None,
        }
    }

    /// Derives every operation of the visit of `pd` at `lts`, in execution
    /// order.
    pub fn operations(&self, pd: Pd, lts: Lts) -> Vec<Operation> {
        let mut operations = Vec::new();
        for modification in 0..self.modifications(pd, lts) as usize {
            for _ in 0..self.operations_in(pd, lts, modification) {
                let op_id = operations.len();
                let kind = self.operation_kind(pd, lts, op_id);
                let cd = self.cd(pd, lts, op_id);
                let writes = !kind.is_delete();
                operations.push(Operation {
                    lts,
                    pd,
                    modification,
                    op_id,
                    kind,
                    cd,
                    vds: if writes {
                        self.vds(pd, cd, lts, op_id, kind)
                    } else {
                        Vec::new()
                    },
                    sds: if writes && kind.touches_statics() {
                        self.sds(pd, lts, op_id, kind)
                    } else {
                        Vec::new()
                    },
                    regular_mask: self.regular_mask(pd, lts, op_id, kind),
                    static_mask: self.static_mask(pd, lts, op_id, kind),
                    range: self.range(pd, lts, op_id, kind),
                });
            }
        }
        operations
    }
}

impl DescriptorSelector for DefaultDescriptorSelector {
    fn random_cd(&self, pd: Pd, attempt: u64) -> Cd {
        let position = self.rng.bounded(
            attempt,
            stream_key(&[streams::RANDOM_CD, pd.as_u64()]),
            self.config.max_partition_size,
        );
        self.cd_at_position(pd, position)
    }

    fn vds(&self, pd: Pd, cd: Cd, lts: Lts, op_id: usize, kind: OperationKind) -> Vec<u64> {
        self.schema
            .regulars()
            .iter()
            .enumerate()
            .map(|(i, column)| {
                let stream = stream_key(&[
                    streams::VD,
                    pd.as_u64(),
                    cd.as_u64(),
                    lts.as_u64(),
                    kind_tag(kind),
                    i as u64,
                ]);
                column
                    .data_type
                    .adjust_entropy_domain(self.rng.random_number(op_id as u64, stream))
            })
            .collect()
    }

    fn max_partition_size(&self) -> u64 {
        self.config.max_partition_size
    }
}

fn kind_tag(kind: OperationKind) -> u64 {
    OperationKind::ALL
        .iter()
        .position(|candidate| *candidate == kind)
        .map_or(0, |i| i as u64)
}

/// Kinds that need statics or clustering columns are skipped for schemas
/// without them.
fn applies_to(kind: OperationKind, schema: &SchemaSpec) -> bool {
    if kind.touches_statics() && !schema.has_statics() {
        return false;
    }
    if kind.is_range() && schema.clustering_keys().is_empty() {
        return false;
    }
    true
}
