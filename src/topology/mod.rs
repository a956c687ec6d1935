//! Building and inspecting stage graphs.
//!
//! A [StreamBuilder] accumulates stages through [StreamHandle]s; `build`
//! validates the graph and freezes it into a [Topology], which a
//! [crate::Task] then owns and runs.

mod builder;
mod graph;

pub use builder::{StreamBuilder, StreamHandle};
pub use graph::{StageKind, Topology};
pub(crate) use graph::{Pipeline, PipelineStage, StageOp};
