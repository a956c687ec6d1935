//! Processor contract: one stage of a pipeline.

use async_trait::async_trait;

use crate::error::BoxError;
use crate::pipe::Pipe;
use crate::types::Message;

/// What a processor does with the message it was given.
#[derive(Debug)]
pub enum Action {
  /// Forward this message to the next stage.
  Emit(Message),
  /// Consume the message; nothing is forwarded (filters, sinks, taps).
  Drop,
}

/// A named stage that consumes one message at a time.
///
/// A processor is driven by exactly one pump, so `&mut self` state needs no
/// synchronization. Errors returned from any method are reported to the
/// task's error handler; they do not stop the stage by themselves.
#[async_trait]
pub trait Processor: Send {
  /// Receives the stage's [Pipe] once, before the first [Processor::process] call.
  fn with_pipe(&mut self, _pipe: Pipe) {}

  async fn process(&mut self, msg: Message) -> Result<Action, BoxError>;

  /// Periodic hook, decoupled from message arrival; flush batched state here.
  async fn commit(&mut self) -> Result<(), BoxError> {
    Ok(())
  }

  /// Called exactly once during teardown, after the last `process` call.
  async fn close(&mut self) -> Result<(), BoxError> {
    Ok(())
  }
}
