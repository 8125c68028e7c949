//! Read queries over a single partition.
//!
//! A [`Query`] selects a whole partition, one row, or a clustering slice.
//! Because clustering descriptors order the same way as the values they
//! decode to, [`Query::matches`] is a plain comparison on descriptors.

use std::ops::Bound;
use std::sync::Arc;

use harrow_schema::SchemaSpec;
use harrow_types::{Cd, Lts, Pd};

use crate::descriptor_selector::{DefaultDescriptorSelector, DescriptorSelector};
use crate::rng::stream_key;
use crate::select_helper;
use crate::statement::CompiledStatement;
use crate::streams;

/// A range of clustering descriptors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClusteringRange {
    pub lower: Bound<Cd>,
    pub upper: Bound<Cd>,
}

impl ClusteringRange {
    pub fn new(lower: Bound<Cd>, upper: Bound<Cd>) -> Self {
        Self { lower, upper }
    }

    pub fn contains(&self, cd: Cd) -> bool {
        let above = match self.lower {
            Bound::Included(lower) => cd >= lower,
            Bound::Excluded(lower) => cd > lower,
            Bound::Unbounded => true,
        };
        let below = match self.upper {
            Bound::Included(upper) => cd <= upper,
            Bound::Excluded(upper) => cd < upper,
            Bound::Unbounded => true,
        };
        above && below
    }
}

/// What part of the partition a query reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryKind {
    SinglePartition,
    SingleRow(Cd),
    ClusteringSlice(ClusteringRange),
}

/// A read over one partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Query {
    pub pd: Pd,
    pub kind: QueryKind,
    /// Return rows in descending clustering order.
    pub reverse: bool,
}

impl Query {
    pub fn single_partition(pd: Pd) -> Self {
        Self {
            pd,
            kind: QueryKind::SinglePartition,
            reverse: false,
        }
    }

    pub fn single_row(pd: Pd, cd: Cd) -> Self {
        Self {
            pd,
            kind: QueryKind::SingleRow(cd),
            reverse: false,
        }
    }

    pub fn slice(pd: Pd, range: ClusteringRange) -> Self {
        Self {
            pd,
            kind: QueryKind::ClusteringSlice(range),
            reverse: false,
        }
    }

    pub fn reversed(mut self) -> Self {
        self.reverse = !self.reverse;
        self
    }

    /// Whether a row with clustering descriptor `cd` falls in the result.
    pub fn matches(&self, cd: Cd) -> bool {
        match self.kind {
            QueryKind::SinglePartition => true,
            QueryKind::SingleRow(expected) => cd == expected,
            QueryKind::ClusteringSlice(range) => range.contains(cd),
        }
    }

    /// The select statement reading this query, including write times of
    /// every static and regular column.
    pub fn to_select_statement(&self, schema: &SchemaSpec) -> CompiledStatement {
        select_helper::select(schema, self)
    }
}

/// Derives queries from `(pd, lts, modifier)`.
///
/// Used by the validation path to spread reads across partition shapes.
#[derive(Debug, Clone)]
pub struct QueryGenerator {
    selector: Arc<DefaultDescriptorSelector>,
}

impl QueryGenerator {
    pub fn new(selector: Arc<DefaultDescriptorSelector>) -> Self {
        Self { selector }
    }

    pub fn query(&self, pd: Pd, lts: Lts, modifier: u64) -> Query {
        let schema = self.selector.schema();
        let stream = stream_key(&[streams::QUERY, pd.as_u64(), lts.as_u64()]);
        let draw = |part: u64| {
            self.selector
                .random_cd(pd, stream_key(&[stream, modifier, part]))
        };
        let flags = stream_key(&[stream, modifier]);
        let reverse = flags & 8 == 8;

        if schema.clustering_keys().is_empty() {
            return Query {
                pd,
                kind: QueryKind::SinglePartition,
                reverse,
            };
        }

        let kind = match flags % 4 {
            0 => QueryKind::SinglePartition,
            1 => QueryKind::SingleRow(draw(0)),
            2 => {
                let (a, b) = (draw(0), draw(1));
                let (lower, upper) = if a <= b { (a, b) } else { (b, a) };
                QueryKind::ClusteringSlice(ClusteringRange::new(
                    Bound::Included(lower),
                    if flags & 16 == 16 {
                        Bound::Included(upper)
                    } else {
                        Bound::Excluded(upper)
                    },
                ))
            }
            _ => {
                let edge = draw(0);
                QueryKind::ClusteringSlice(if flags & 32 == 32 {
                    ClusteringRange::new(Bound::Included(edge), Bound::Unbounded)
                } else {
                    ClusteringRange::new(Bound::Unbounded, Bound::Excluded(edge))
                })
            }
        };
        Query { pd, kind, reverse }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor_selector::SelectorConfig;
    use crate::rng::PcgRng;
    use harrow_schema::DataType;
    use test_case::test_case;

    fn range(lower: Bound<u64>, upper: Bound<u64>) -> ClusteringRange {
        ClusteringRange::new(lower.map(Cd::new), upper.map(Cd::new))
    }

    #[test_case(range(Bound::Included(2), Bound::Excluded(5)), 2, true)]
    #[test_case(range(Bound::Included(2), Bound::Excluded(5)), 5, false)]
    #[test_case(range(Bound::Excluded(2), Bound::Unbounded), 2, false)]
    #[test_case(range(Bound::Excluded(2), Bound::Unbounded), u64::MAX, true)]
    #[test_case(range(Bound::Unbounded, Bound::Included(0)), 0, true)]
    fn range_contains(range: ClusteringRange, cd: u64, expected: bool) {
        assert_eq!(range.contains(Cd::new(cd)), expected);
    }

    #[test]
    fn query_matches_by_kind() {
        let pd = Pd::new(1);
        assert!(Query::single_partition(pd).matches(Cd::new(99)));
        assert!(Query::single_row(pd, Cd::new(3)).matches(Cd::new(3)));
        assert!(!Query::single_row(pd, Cd::new(3)).matches(Cd::new(4)));
        let slice = Query::slice(pd, range(Bound::Included(1), Bound::Included(2)));
        assert!(slice.matches(Cd::new(2)));
        assert!(!slice.matches(Cd::new(3)));
        assert!(slice.reversed().reverse);
    }

    #[test]
    fn generator_is_deterministic_and_covers_every_kind() {
        let schema = Arc::new(
            SchemaSpec::builder("harrow", "q")
                .partition_key("pk", DataType::BigInt)
                .clustering_key("ck", DataType::Integer)
                .regular_column("v", DataType::BigInt)
                .build()
                .unwrap(),
        );
        let selector = Arc::new(
            DefaultDescriptorSelector::new(
                PcgRng::new(1, schema.fingerprint()),
                schema,
                SelectorConfig::default(),
            )
            .unwrap(),
        );
        let generator = QueryGenerator::new(selector);
        let mut kinds = [false; 3];
        for modifier in 0..64 {
            let query = generator.query(Pd::new(5), Lts::new(10), modifier);
            assert_eq!(query, generator.query(Pd::new(5), Lts::new(10), modifier));
            let index = match query.kind {
                QueryKind::SinglePartition => 0,
                QueryKind::SingleRow(_) => 1,
                QueryKind::ClusteringSlice(_) => 2,
            };
            kinds[index] = true;
        }
        assert_eq!(kinds, [true; 3]);
    }
}
