//! Whole runs through the visitor pipeline against the in-memory store.

use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use harrow_core::{
    ConcurrentRunner, CorruptorKind, FailurePolicy, Model, ModelError, NoOpModel, OffsetClock,
    OperationLog, PartitionWindow, Query, ResultSetRow, Run, SelectorConfig, SystemUnderTest,
    ValidationError, Validator, Visitor, run_sequential,
};
use harrow_schema::{DataType, SchemaSpec};
use harrow_test_harness::{InMemorySut, RecordingSut};
use harrow_types::{Cd, ConsistencyLevel, Lts, Pd};

fn schema() -> Arc<SchemaSpec> {
    Arc::new(
        SchemaSpec::builder("harrow", "pipeline")
            .partition_key("pk", DataType::BigInt)
            .clustering_key("ck", DataType::Ascii { length: 4 })
            .static_column("s", DataType::Integer)
            .regular_column("v0", DataType::BigInt)
            .regular_column("v1", DataType::TinyInt)
            .build()
            .unwrap(),
    )
}

fn run_with(seed: u64, window: PartitionWindow, sut: Arc<dyn SystemUnderTest>) -> Run {
    let run = Run::new(
        seed,
        schema(),
        Arc::new(OffsetClock::new(1_700_000_000_000_000).unwrap()),
        window,
        SelectorConfig {
            max_partition_size: 16,
            ..SelectorConfig::default()
        },
        sut,
    )
    .unwrap();
    run.create_schema().unwrap();
    run
}

fn single_partition() -> PartitionWindow {
    PartitionWindow {
        window_size: 1,
        slide_after_repeats: 10_000,
    }
}

/// A sink appending into a shared buffer.
#[derive(Clone, Default)]
struct Buffer(Arc<Mutex<Vec<u8>>>);

impl Buffer {
    fn lines(&self) -> Vec<String> {
        String::from_utf8(self.0.lock().unwrap().clone())
            .unwrap()
            .lines()
            .map(str::to_owned)
            .collect()
    }
}

impl Write for Buffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// A sink that is always full.
struct Full;

impl Write for Full {
    fn write(&mut self, _: &[u8]) -> io::Result<usize> {
        Err(io::Error::from(io::ErrorKind::StorageFull))
    }

    fn flush(&mut self) -> io::Result<()> {
        Err(io::Error::from(io::ErrorKind::StorageFull))
    }
}

fn read_partition(run: &Run, pd: Pd) -> Vec<ResultSetRow> {
    run.select_helper()
        .execute(&*run.sut, &Query::single_partition(pd), ConsistencyLevel::All)
        .unwrap()
}

#[test]
fn finished_lines_follow_visit_order_without_gaps() {
    let sut = Arc::new(InMemorySut::new(schema()));
    let run = run_with(1, single_partition(), sut.clone());
    let buffer = Buffer::default();
    let mut visitor = run.visitor(
        ConsistencyLevel::Quorum,
        FailurePolicy::FailFast,
        OperationLog::from_writer(buffer.clone()),
    );
    run_sequential(&run.pd_selector, &mut visitor, (0..25).map(Lts::new)).unwrap();

    let finished: Vec<u64> = buffer
        .lines()
        .iter()
        .filter(|line| line.ends_with("Finished"))
        .map(|line| {
            line.trim_start_matches("LTS: ")
                .split('.')
                .next()
                .unwrap()
                .parse()
                .unwrap()
        })
        .collect();
    assert_eq!(finished, (0..25).collect::<Vec<_>>());
    assert_eq!(schema().create_table_cql(), sut.schema_changes()[0]);

    let lines = buffer.lines();
    let first = lines.iter().position(|l| l.starts_with("LTS: 0. ")).unwrap();
    assert!(lines[first].contains("Statement "));
    assert!(sut.writes() > 0);
}

#[test]
fn failing_log_sink_does_not_fail_mutations() {
    let sut = Arc::new(InMemorySut::new(schema()));
    let run = run_with(2, single_partition(), sut.clone());
    let log = OperationLog::from_writer(Full);
    let mut visitor = run.visitor(ConsistencyLevel::All, FailurePolicy::FailFast, log.clone());

    run_sequential(&run.pd_selector, &mut visitor, (0..10).map(Lts::new)).unwrap();
    assert!(sut.writes() > 0);
    assert!(log.failures() >= 10);
    assert!(!read_partition(&run, run.pd(Lts::ZERO)).is_empty());
}

#[test]
fn visits_stop_after_a_fatal_store_error() {
    let sut = Arc::new(InMemorySut::new(schema()));
    let run = run_with(3, single_partition(), sut.clone());
    let mut visitor = run.visitor(ConsistencyLevel::All, FailurePolicy::FailFast, OperationLog::discard());
    visitor.visit(Lts::new(0), run.pd(Lts::new(0))).unwrap();

    sut.set_fail_writes(true);
    assert!(visitor.visit(Lts::new(1), run.pd(Lts::new(1))).is_err());
    sut.set_fail_writes(false);
    assert!(visitor.visit(Lts::new(2), run.pd(Lts::new(2))).is_err());
    assert!(visitor.is_halted());
}

#[test]
fn skip_and_continue_keeps_visiting() {
    let sut = Arc::new(InMemorySut::new(schema()));
    let run = run_with(3, single_partition(), sut.clone());
    let mut visitor = run.visitor(
        ConsistencyLevel::All,
        FailurePolicy::SkipAndContinue,
        OperationLog::discard(),
    );
    sut.set_fail_writes(true);
    run_sequential(&run.pd_selector, &mut visitor, (0..5).map(Lts::new)).unwrap();
    assert_eq!(sut.writes(), 0);
    assert!(visitor.executor().inner().skipped() > 0);
}

#[test]
fn skipped_statements_are_logged() {
    let sut = Arc::new(InMemorySut::new(schema()));
    let run = run_with(4, single_partition(), sut.clone());
    let buffer = Buffer::default();
    let mut visitor = run.visitor(
        ConsistencyLevel::All,
        FailurePolicy::SkipAndContinue,
        OperationLog::from_writer(buffer.clone()),
    );
    sut.set_fail_writes(true);
    run_sequential(&run.pd_selector, &mut visitor, (0..3).map(Lts::new)).unwrap();

    let lines = buffer.lines();
    let statements = lines.iter().filter(|l| l.contains(" Statement ")).count() as u64;
    assert!(statements > 0);
    assert_eq!(statements, visitor.executor().inner().skipped());
    assert_eq!(lines.iter().filter(|l| l.ends_with("Finished")).count(), 3);
}

#[test]
fn failing_statement_is_the_last_logged_line() {
    let sut = Arc::new(InMemorySut::new(schema()));
    let run = run_with(5, single_partition(), sut.clone());
    let buffer = Buffer::default();
    let mut visitor = run.visitor(
        ConsistencyLevel::All,
        FailurePolicy::FailFast,
        OperationLog::from_writer(buffer.clone()),
    );
    visitor.visit(Lts::new(0), run.pd(Lts::new(0))).unwrap();
    sut.set_fail_writes(true);
    assert!(visitor.visit(Lts::new(1), run.pd(Lts::new(1))).is_err());

    let lines = buffer.lines();
    let last = lines.last().unwrap();
    assert!(last.starts_with("LTS: 1. "));
    assert!(last.contains("OpId: 0 Statement "));
    assert!(!lines.iter().any(|l| l == &format!("LTS: 1. Pd {}. Finished", run.pd(Lts::new(1)))));
}

#[test]
fn same_seed_reproduces_the_same_store() {
    let window = PartitionWindow {
        window_size: 3,
        slide_after_repeats: 4,
    };
    let replay = |seed: u64| {
        let sut = Arc::new(RecordingSut::new(InMemorySut::new(schema())));
        let run = run_with(seed, window, sut.clone());
        let mut visitor =
            run.visitor(ConsistencyLevel::All, FailurePolicy::FailFast, OperationLog::discard());
        run_sequential(&run.pd_selector, &mut visitor, (0..60).map(Lts::new)).unwrap();
        let pds: Vec<Pd> = (0..60).map(|l| run.pd(Lts::new(l))).collect();
        let rows: Vec<_> = pds.iter().map(|pd| read_partition(&run, *pd)).collect();
        (sut.writes(), rows)
    };

    let (writes_a, rows_a) = replay(99);
    let (writes_b, rows_b) = replay(99);
    assert_eq!(writes_a, writes_b);
    assert_eq!(rows_a, rows_b);

    let (_, rows_c) = replay(100);
    assert_ne!(rows_a, rows_c);
}

#[test]
fn concurrent_run_matches_sequential_run() {
    let window = PartitionWindow {
        window_size: 5,
        slide_after_repeats: 6,
    };
    let lts = || (0..150).map(Lts::new);

    let sequential_sut = Arc::new(InMemorySut::new(schema()));
    let sequential = run_with(8, window, sequential_sut.clone());
    let mut visitor =
        sequential.visitor(ConsistencyLevel::All, FailurePolicy::FailFast, OperationLog::discard());
    run_sequential(&sequential.pd_selector, &mut visitor, lts()).unwrap();

    let concurrent_sut = Arc::new(InMemorySut::new(schema()));
    let concurrent = run_with(8, window, concurrent_sut.clone());
    let runner = ConcurrentRunner::new(4).unwrap();
    let buffer = Buffer::default();
    let log = OperationLog::from_writer(buffer.clone());
    let report = runner.run(&concurrent.pd_selector, lts(), |_| {
        concurrent.visitor(ConsistencyLevel::All, FailurePolicy::FailFast, log.clone())
    });

    assert!(report.is_success());
    assert_eq!(report.visits, 150);
    assert_eq!(concurrent_sut.writes(), sequential_sut.writes());
    let finished = buffer.lines().iter().filter(|l| l.ends_with("Finished")).count();
    assert_eq!(finished, 150);
    for l in lts() {
        let pd = sequential.pd(l);
        assert_eq!(read_partition(&sequential, pd), read_partition(&concurrent, pd));
    }
}

/// Rejects any row whose cd is not in the expected set.
#[derive(Debug)]
struct KnownRows(Vec<Cd>);

impl Model for KnownRows {
    fn validate(&self, query: &Query, rows: &[ResultSetRow]) -> Result<(), ModelError> {
        match rows.iter().find_map(|row| row.cd.filter(|cd| !self.0.contains(cd))) {
            Some(cd) => Err(ModelError {
                pd: query.pd,
                message: format!("unexpected row {cd}"),
            }),
            None => Ok(()),
        }
    }
}

#[test]
fn validator_detects_an_injected_row() {
    let sut = Arc::new(InMemorySut::new(schema()));
    let run = run_with(4, single_partition(), sut.clone());
    let mut visitor = run.visitor(ConsistencyLevel::All, FailurePolicy::FailFast, OperationLog::discard());
    run_sequential(&run.pd_selector, &mut visitor, (0..20).map(Lts::new)).unwrap();

    let pd = run.pd(Lts::ZERO);
    let query = Query::single_partition(pd);
    let clean = Validator::new(run.select_helper(), Arc::clone(&run.sut), NoOpModel)
        .validate(&query)
        .unwrap();
    assert!(!clean.corrupted);

    let known: Vec<Cd> = clean.rows.iter().filter_map(|row| row.cd).collect();
    let checked = Validator::new(run.select_helper(), Arc::clone(&run.sut), KnownRows(known.clone()));
    assert!(checked.validate(&query).is_ok());

    let corrupting = Validator::new(run.select_helper(), Arc::clone(&run.sut), KnownRows(known))
        .with_corruptor(run.corruptor(CorruptorKind::AddExtraRow));
    assert!(matches!(
        corrupting.validate(&query),
        Err(ValidationError::Model(ModelError { pd: failed, .. })) if failed == pd
    ));
}

#[tokio::test]
async fn async_execution_preserves_lts_order() {
    let sync_sut = Arc::new(InMemorySut::new(schema()));
    let sync_run = run_with(6, single_partition(), sync_sut.clone());
    let mut visitor =
        sync_run.visitor(ConsistencyLevel::All, FailurePolicy::FailFast, OperationLog::discard());
    run_sequential(&sync_run.pd_selector, &mut visitor, (0..15).map(Lts::new)).unwrap();

    let async_sut = Arc::new(InMemorySut::new(schema()));
    let async_run = run_with(6, single_partition(), async_sut.clone());
    let write_helper = async_run.write_helper();
    let statements: Vec<_> = (0..15)
        .map(Lts::new)
        .flat_map(|lts| {
            async_run
                .descriptor_selector
                .operations(async_run.pd(lts), lts)
                .into_iter()
                .map(|op| write_helper.compile(&op, async_run.clock.rts(op.lts)))
                .collect::<Vec<_>>()
        })
        .collect();

    let sut: Arc<dyn SystemUnderTest> = async_sut.clone();
    let task = tokio::spawn(async move {
        for statement in statements {
            sut.execute_async(&statement, ConsistencyLevel::All).await?;
        }
        Ok::<_, harrow_core::SutError>(())
    });
    task.await.unwrap().unwrap();

    let pd = sync_run.pd(Lts::ZERO);
    assert_eq!(async_sut.writes(), sync_sut.writes());
    assert_eq!(read_partition(&sync_run, pd), read_partition(&async_run, pd));
}
