//! The logging stage: records every compiled statement in the audit log,
//! whether it was applied, skipped or failed.

use harrow_types::{Lts, Pd};

use super::{Executed, VisitExecutor};
use crate::error::VisitError;
use crate::operation::Operation;
use crate::oplog::OperationLog;

/// Delegates to an inner executor, then appends to the operation log.
///
/// Log failures never reach the caller: the result of a visit is the inner
/// executor's result.
#[derive(Debug)]
pub struct LoggingExecutor<E> {
    inner: E,
    log: OperationLog,
}

impl<E: VisitExecutor> LoggingExecutor<E> {
    pub fn new(inner: E, log: OperationLog) -> Self {
        Self { inner, log }
    }

    pub fn inner(&self) -> &E {
        &self.inner
    }

    pub fn log(&self) -> &OperationLog {
        &self.log
    }
}

impl<E: VisitExecutor> VisitExecutor for LoggingExecutor<E> {
    fn before_lts(&mut self, lts: Lts, pd: Pd) -> Result<(), VisitError> {
        self.inner.before_lts(lts, pd)
    }

    fn operation(&mut self, operation: &Operation) -> Executed {
        let executed = self.inner.operation(operation);
        if let Some(statement) = &executed.statement {
            self.log.record_operation(operation, statement);
        }
        executed
    }

    fn after_lts(&mut self, lts: Lts, pd: Pd) -> Result<(), VisitError> {
        self.inner.after_lts(lts, pd)?;
        self.log.record_finished(lts, pd);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use harrow_schema::Value;
    use crate::error::SutError;
    use crate::statement::CompiledStatement;
    use harrow_types::{Cd, ColumnMask, OperationKind, Rts};
    use std::io::{self, Write};
    use std::sync::{Arc, Mutex};

    struct Shared(Arc<Mutex<Vec<u8>>>);

    impl Write for Shared {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    /// Compiles a partition delete; fails it when `fail` is set.
    struct Deletes {
        fail: bool,
    }

    impl VisitExecutor for Deletes {
        fn operation(&mut self, operation: &Operation) -> Executed {
            let statement = CompiledStatement::Delete {
                table: "ks.t".into(),
                columns: vec![],
                partition: vec![("pk".into(), Value::BigInt(42))],
                clustering: crate::statement::ClusteringRestriction::None,
                timestamp: Rts::new(operation.lts.as_u64()),
            };
            if self.fail {
                Executed::failed(
                    Some(statement),
                    VisitError::Sut {
                        lts: operation.lts,
                        pd: operation.pd,
                        op_id: operation.op_id,
                        source: SutError::Execution("unavailable".into()),
                    },
                )
            } else {
                Executed::applied(statement)
            }
        }
    }

    fn delete_partition(lts: u64) -> Operation {
        Operation {
            lts: Lts::new(lts),
            pd: Pd::new(42),
            modification: 1,
            op_id: 3,
            kind: OperationKind::DeletePartition,
            cd: Cd::new(7),
            vds: vec![],
            sds: vec![],
            regular_mask: ColumnMask::empty(),
            static_mask: ColumnMask::empty(),
            range: None,
        }
    }

    #[test]
    fn formats_operation_and_finished_lines() {
        let buffer = Arc::new(Mutex::new(Vec::new()));
        let log = OperationLog::from_writer(Shared(Arc::clone(&buffer)));
        let mut executor = LoggingExecutor::new(Deletes { fail: false }, log);
        executor.operation(&delete_partition(4)).outcome.unwrap();
        executor.after_lts(Lts::new(4), Pd::new(42)).unwrap();

        let text = String::from_utf8(buffer.lock().unwrap().clone()).unwrap();
        assert_eq!(
            text,
            "LTS: 4. Pd 42. Cd 7. M 1. OpId: 3 Statement DELETE FROM ks.t USING TIMESTAMP 4 WHERE pk = 42;\n\
             LTS: 4. Pd 42. Finished\n"
        );
    }

    #[test]
    fn records_the_statement_that_failed() {
        let buffer = Arc::new(Mutex::new(Vec::new()));
        let log = OperationLog::from_writer(Shared(Arc::clone(&buffer)));
        let mut executor = LoggingExecutor::new(Deletes { fail: true }, log);
        let executed = executor.operation(&delete_partition(9));
        assert!(executed.outcome.is_err());

        let text = String::from_utf8(buffer.lock().unwrap().clone()).unwrap();
        assert_eq!(
            text,
            "LTS: 9. Pd 42. Cd 7. M 1. OpId: 3 Statement DELETE FROM ks.t USING TIMESTAMP 9 WHERE pk = 42;\n"
        );
    }
}
