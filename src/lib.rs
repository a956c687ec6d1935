//! # streamweave-topology
//!
//! Stream topology execution engine: wire sources, processors and branches
//! into a graph, pump records through it and track which records have been
//! acknowledged back to their source.
//!
//! ## Architecture
//!
//! - [StreamBuilder] / [StreamHandle] assemble named stages; `build` validates
//!   and freezes them into a [Topology].
//! - [Task] runs the topology: one pump per [Source], each driving its own
//!   sub-graph serially, with every runtime failure funnelled through one
//!   error handler.
//! - Each [Processor] receives a [Pipe] to `mark` (seen) or `commit` (safe to
//!   discard) the messages it handles; both are forwarded to the originating
//!   source. A commit supersedes the marks before it.
//!
//! ```rust,ignore
//! let builder = StreamBuilder::new();
//! let [evens, odds] = builder
//!   .source("numbers", numbers)
//!   .branch_func("parity", [is_even, Predicate::always()]);
//! evens.print("print-even").process("commit-even", committer(1000));
//! odds.map_func("negate", negate).process("commit-odd", committer(1000));
//!
//! let mut task = Task::new(builder.build()?);
//! task.on_error(|err| { eprintln!("{err}"); ErrorAction::Shutdown })?;
//! task.start(&CancellationToken::new())?;
//! task.stopped().await;
//! task.close().await?;
//! ```

pub mod branch;
pub mod error;
pub mod pipe;
pub mod processor;
pub mod processors;
pub mod source;
pub mod task;
#[cfg(test)]
mod testing;
pub mod topology;
pub mod types;

pub use branch::Predicate;
pub use error::{BoxError, BuildError, ConfigError, StreamError, TaskError};
pub use pipe::{AckStats, Pipe};
pub use processor::{Action, Processor};
pub use source::Source;
pub use task::{ErrorAction, Task, TaskConfig, TaskState};
pub use tokio_util::sync::CancellationToken;
pub use topology::{StageKind, StreamBuilder, StreamHandle, Topology};
pub use types::{Message, Token, Value};
