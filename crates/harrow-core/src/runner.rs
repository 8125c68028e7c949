//! Drives visitors over a range of logical timestamps.
//!
//! The sequential runner visits lts in order through one visitor. The
//! concurrent runner groups lts by partition and gives every partition its
//! own visitor on its own rayon task: a partition's lts stream stays
//! strictly ordered while independent partitions proceed in parallel.

use std::collections::BTreeMap;

use harrow_types::{Lts, Pd};
use rayon::prelude::*;

use crate::error::{RunnerError, VisitError};
use crate::pd_selector::PdSelector;
use crate::visitor::Visitor;

/// Visits every lts in order, stopping at the first error.
pub fn run_sequential(
    pd_selector: &PdSelector,
    visitor: &mut dyn Visitor,
    lts: impl IntoIterator<Item = Lts>,
) -> Result<u64, VisitError> {
    let mut visits = 0;
    for lts in lts {
        visitor.visit(lts, pd_selector.pd(lts))?;
        visits += 1;
    }
    Ok(visits)
}

/// A partition that stopped at a fatal error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionFailure {
    pub pd: Pd,
    /// Visits that completed before the failure.
    pub completed: u64,
    pub error: VisitError,
}

/// Outcome of a concurrent run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub partitions: usize,
    pub visits: u64,
    pub failures: Vec<PartitionFailure>,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Runs partitions in parallel, one worker per partition at a time.
#[derive(Debug)]
pub struct ConcurrentRunner {
    pool: rayon::ThreadPool,
}

impl ConcurrentRunner {
    /// Builds a pool of `workers` threads; 0 lets rayon pick.
    pub fn new(workers: usize) -> Result<Self, RunnerError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|index| format!("harrow-worker-{index}"))
            .build()?;
        Ok(Self { pool })
    }

    pub fn workers(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Visits every lts, grouped by partition.
    ///
    /// `make_visitor` is called once per partition. A partition stops at its
    /// first error; other partitions keep going.
    pub fn run<V, F>(
        &self,
        pd_selector: &PdSelector,
        lts: impl IntoIterator<Item = Lts>,
        make_visitor: F,
    ) -> RunReport
    where
        V: Visitor,
        F: Fn(Pd) -> V + Sync,
    {
        let mut partitions: BTreeMap<Pd, Vec<Lts>> = BTreeMap::new();
        for lts in lts {
            partitions.entry(pd_selector.pd(lts)).or_default().push(lts);
        }
        for stream in partitions.values_mut() {
            stream.sort_unstable();
        }
        tracing::info!(
            partitions = partitions.len(),
            workers = self.workers(),
            "starting concurrent run"
        );

        let outcomes: Vec<(u64, Option<PartitionFailure>)> = self.pool.install(|| {
            partitions
                .par_iter()
                .map(|(&pd, stream)| {
                    let mut visitor = make_visitor(pd);
                    let mut completed = 0;
                    for &lts in stream {
                        if let Err(error) = visitor.visit(lts, pd) {
                            tracing::warn!(%pd, %lts, %error, "partition stopped");
                            return (
                                completed,
                                Some(PartitionFailure {
                                    pd,
                                    completed,
                                    error,
                                }),
                            );
                        }
                        completed += 1;
                    }
                    (completed, None)
                })
                .collect()
        });

        let mut report = RunReport {
            partitions: partitions.len(),
            ..RunReport::default()
        };
        for (completed, failure) in outcomes {
            report.visits += completed;
            report.failures.extend(failure);
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::PcgRng;
    use harrow_schema::{DataType, KeyCodec};
    use std::sync::Mutex;

    fn pd_selector() -> PdSelector {
        PdSelector::new(
            PcgRng::new(9, 0),
            KeyCodec::new(vec![DataType::BigInt]),
            4,
            2,
        )
        .unwrap()
    }

    /// Records visits into a shared list; fails at `fail_at`.
    struct Tracking<'a> {
        seen: &'a Mutex<Vec<(Pd, Lts)>>,
        fail_at: Option<Lts>,
    }

    impl Visitor for Tracking<'_> {
        fn visit(&mut self, lts: Lts, pd: Pd) -> Result<(), VisitError> {
            if self.fail_at == Some(lts) {
                return Err(VisitError::Halted { lts });
            }
            self.seen.lock().unwrap().push((pd, lts));
            Ok(())
        }
    }

    #[test]
    fn sequential_visits_in_order() {
        let selector = pd_selector();
        let seen = Mutex::new(Vec::new());
        let mut visitor = Tracking {
            seen: &seen,
            fail_at: None,
        };
        let visits = run_sequential(&selector, &mut visitor, (0..6).map(Lts::new)).unwrap();
        assert_eq!(visits, 6);
        let seen = seen.into_inner().unwrap();
        let expected: Vec<_> = (0..6)
            .map(|l| (selector.pd(Lts::new(l)), Lts::new(l)))
            .collect();
        assert_eq!(seen, expected);
    }

    #[test]
    fn sequential_stops_at_first_error() {
        let selector = pd_selector();
        let seen = Mutex::new(Vec::new());
        let mut visitor = Tracking {
            seen: &seen,
            fail_at: Some(Lts::new(2)),
        };
        assert!(run_sequential(&selector, &mut visitor, (0..6).map(Lts::new)).is_err());
        assert_eq!(seen.into_inner().unwrap().len(), 2);
    }

    #[test]
    fn concurrent_keeps_per_partition_order() {
        let selector = pd_selector();
        let runner = ConcurrentRunner::new(3).unwrap();
        assert_eq!(runner.workers(), 3);
        let seen = Mutex::new(Vec::new());
        let report = runner.run(&selector, (0..40).map(Lts::new), |_| Tracking {
            seen: &seen,
            fail_at: None,
        });
        assert!(report.is_success());
        assert_eq!(report.visits, 40);

        let seen = seen.into_inner().unwrap();
        let mut by_pd: BTreeMap<Pd, Vec<Lts>> = BTreeMap::new();
        for (pd, lts) in seen {
            assert_eq!(selector.pd(lts), pd);
            by_pd.entry(pd).or_default().push(lts);
        }
        assert_eq!(by_pd.len(), report.partitions);
        for stream in by_pd.values() {
            assert!(stream.windows(2).all(|w| w[0] < w[1]));
        }
    }

    #[test]
    fn concurrent_isolates_failing_partition() {
        let selector = pd_selector();
        let failing_pd = selector.pd(Lts::new(5));
        let runner = ConcurrentRunner::new(2).unwrap();
        let seen = Mutex::new(Vec::new());
        let report = runner.run(&selector, (0..16).map(Lts::new), |pd| Tracking {
            seen: &seen,
            fail_at: (pd == failing_pd).then_some(Lts::new(5)),
        });
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].pd, failing_pd);

        let seen = seen.into_inner().unwrap();
        assert!(!seen.iter().any(|&(pd, lts)| pd == failing_pd && lts >= Lts::new(5)));
        let others = (0..16)
            .map(Lts::new)
            .filter(|&l| selector.pd(l) != failing_pd)
            .count();
        assert_eq!(seen.iter().filter(|(pd, _)| *pd != failing_pd).count(), others);
    }
}
