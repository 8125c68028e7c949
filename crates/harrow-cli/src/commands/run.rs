//! Runs a seed against the in-memory store.

use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use harrow_config::HarrowConfig;
use harrow_core::{
    ConcurrentRunner, Model, ModelError, MonotonicClock, OperationLog, Query, ResultSetRow, Run,
    ValidationError, Validator,
};
use harrow_test_harness::InMemorySut;
use harrow_types::{ConsistencyLevel, Lts, Pd};

/// Visits `0..max_lts` concurrently and reports per-partition failures.
pub fn run(config: &HarrowConfig) -> Result<()> {
    let schema = Arc::new(config.schema_spec()?);
    let clock: Arc<dyn MonotonicClock> = Arc::new(config.clock()?);
    let sut = Arc::new(InMemorySut::new(Arc::clone(&schema)));

    let run = Run::new(
        config.run.seed,
        Arc::clone(&schema),
        clock,
        config.partition_window()?,
        config.selector_config()?,
        sut.clone(),
    )
    .context("Failed to build run")?;
    run.create_schema().context("Failed to create table")?;

    let log = match &config.log.operation_log {
        Some(path) => OperationLog::create(path)
            .with_context(|| format!("Failed to open operation log {}", path.display()))?,
        None => OperationLog::discard(),
    };
    let runner = ConcurrentRunner::new(config.run.workers).context("Failed to start workers")?;

    println!(
        "Running seed {} over {} lts on {} workers...",
        config.run.seed,
        config.run.max_lts,
        runner.workers()
    );
    tracing::info!(schema = %schema, "starting run");

    let started = Instant::now();
    let report = runner.run(
        &run.pd_selector,
        (0..config.run.max_lts).map(Lts::new),
        |_| run.visitor(config.run.consistency, config.run.failure_policy, log.clone()),
    );
    let elapsed = started.elapsed().as_secs_f64();

    println!(
        "Visited {} lts across {} partitions ({} writes) in {elapsed:.2}s",
        report.visits,
        report.partitions,
        sut.writes()
    );
    if log.failures() > 0 {
        println!("  {} operation log lines dropped", log.failures());
    }

    if !report.is_success() {
        for failure in &report.failures {
            println!(
                "  partition {} failed after {} lts: {}",
                failure.pd, failure.completed, failure.error
            );
        }
        anyhow::bail!(
            "{} of {} partitions failed (reproduce with --seed {})",
            report.failures.len(),
            report.partitions,
            config.run.seed
        );
    }

    if config.validation.corrupt {
        self_check(&run, config)?;
    }

    Ok(())
}

/// Rows read before corruption; any difference afterwards is a detection.
#[derive(Debug)]
struct Snapshot(Vec<ResultSetRow>);

impl Model for Snapshot {
    fn validate(&self, query: &Query, rows: &[ResultSetRow]) -> Result<(), ModelError> {
        if rows == self.0.as_slice() {
            Ok(())
        } else {
            Err(ModelError {
                pd: query.pd,
                message: format!("expected {} rows, read {}", self.0.len(), rows.len()),
            })
        }
    }
}

/// Corrupts the first visited partitions and checks each fault is read back.
fn self_check(run: &Run, config: &HarrowConfig) -> Result<()> {
    let kind = config.validation.corruptor;
    let mut pds: Vec<Pd> = Vec::new();
    for lts in (0..config.run.max_lts).map(Lts::new) {
        if pds.len() as u64 >= config.validation.partitions {
            break;
        }
        let pd = run.pd(lts);
        if !pds.contains(&pd) {
            pds.push(pd);
        }
    }

    let (mut detected, mut skipped) = (0_usize, 0_usize);
    for pd in pds {
        let query = Query::single_partition(pd);
        let rows = run
            .select_helper()
            .execute(&*run.sut, &query, ConsistencyLevel::All)
            .with_context(|| format!("Failed to read partition {pd}"))?;

        let validator = Validator::new(run.select_helper(), Arc::clone(&run.sut), Snapshot(rows))
            .with_corruptor(run.corruptor(kind));
        match validator.validate(&query) {
            Err(ValidationError::Model(error)) => {
                detected += 1;
                tracing::debug!(%pd, %error, "corruption detected");
            }
            Ok(validation) if !validation.corrupted => skipped += 1,
            Ok(_) => anyhow::bail!("{kind:?} corruption of partition {pd} was not visible on read"),
            Err(error) => return Err(error).context("Corruption self-check failed"),
        }
    }

    println!("Corruption self-check ({kind:?}): {detected} detected, {skipped} skipped");
    Ok(())
}
