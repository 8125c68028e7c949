//! # harrow-test-harness
//!
//! Stores that implement [`harrow_core::SystemUnderTest`] in process:
//!
//! - [`InMemorySut`] resolves writes the way a timestamped wide-column
//!   store does, so whole runs can execute without a cluster.
//! - [`RecordingSut`] wraps any store and records every statement.
//! - [`ScriptedSut`] answers every read with fixed rows.
//!
//! ```ignore
//! let sut = Arc::new(InMemorySut::new(Arc::clone(&schema)));
//! let run = Run::new(seed, schema, clock, window, config, sut)?;
//! ```

mod memory;
mod recording;
mod scripted;

pub use memory::InMemorySut;
pub use recording::RecordingSut;
pub use scripted::{ScriptedSut, raw_row};
