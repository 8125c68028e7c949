//! Append-only audit log of executed operations.
//!
//! One line per executed statement and one per completed visit. The log is
//! a diagnostic aid: every write is best effort, and I/O failures are
//! counted and traced but never returned to the mutation path.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use harrow_types::{Lts, Pd};

use crate::operation::Operation;
use crate::statement::CompiledStatement;

type Sink = Box<dyn Write + Send>;

/// Shared handle to the audit log. Clones append to the same sink.
#[derive(Clone)]
pub struct OperationLog {
    sink: Arc<Mutex<Sink>>,
    failures: Arc<AtomicU64>,
}

impl OperationLog {
    /// Opens (or creates) `path` for appending.
    pub fn create(path: impl AsRef<Path>) -> io::Result<Self> {
        let file: File = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self::from_writer(file))
    }

    pub fn from_writer(writer: impl Write + Send + 'static) -> Self {
        Self {
            sink: Arc::new(Mutex::new(Box::new(writer))),
            failures: Arc::new(AtomicU64::new(0)),
        }
    }

    /// A log that discards everything.
    pub fn discard() -> Self {
        Self::from_writer(io::sink())
    }

    /// Records an executed operation.
    pub fn record_operation(&self, operation: &Operation, statement: &CompiledStatement) {
        self.append(&format!(
            "LTS: {}. Pd {}. Cd {}. M {}. OpId: {} Statement {}",
            operation.lts,
            operation.pd,
            operation.cd,
            operation.modification,
            operation.op_id,
            statement
        ));
    }

    /// Records the completion of a visit.
    pub fn record_finished(&self, lts: Lts, pd: Pd) {
        self.append(&format!("LTS: {lts}. Pd {pd}. Finished"));
    }

    /// Number of lines that could not be written.
    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    /// Writes and flushes one line while holding the lock, so lines from
    /// concurrent workers never interleave.
    fn append(&self, line: &str) {
        let result = match self.sink.lock() {
            Ok(mut sink) => sink
                .write_all(format!("{line}\n").as_bytes())
                .and_then(|()| sink.flush()),
            Err(_) => Err(io::Error::other("operation log lock poisoned")),
        };
        if let Err(error) = result {
            self.failures.fetch_add(1, Ordering::Relaxed);
            tracing::trace!(%error, "dropped operation log line");
        }
    }
}

impl std::fmt::Debug for OperationLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationLog")
            .field("failures", &self.failures())
            .finish_non_exhaustive()
    }
}
