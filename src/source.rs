//! Source contract: where messages enter a topology.

use async_trait::async_trait;

use crate::error::BoxError;
use crate::types::{Message, Token};

/// Produces messages on demand and accepts acknowledgements for the tokens it handed out.
///
/// Sources must tolerate re-consumption after a restart from the last committed
/// token (at-least-once). Persisting that position is entirely up to the source.
#[async_trait]
pub trait Source: Send {
  /// Returns the next message, or `None` when nothing is available right now.
  ///
  /// May block (await) on an external supply. The pump only checks for
  /// cancellation between calls.
  async fn consume(&mut self) -> Result<Option<Message>, BoxError>;

  /// The message holding `token` was observed but is not yet safe to discard.
  async fn mark(&mut self, _token: &Token) -> Result<(), BoxError> {
    Ok(())
  }

  /// The message holding `token`, and everything before it, is safe to discard.
  async fn commit(&mut self, token: &Token) -> Result<(), BoxError>;

  /// Called once during task teardown, after every downstream stage has closed.
  async fn close(&mut self) -> Result<(), BoxError>;
}
