//! Per-stage acknowledgement handle and the per-source commit tracker behind it.
//!
//! Every Pipe of a sub-graph shares one [Committer] wrapping that sub-graph's
//! source. Mark and Commit are forwarded straight to the source (never
//! buffered) and recorded in an acknowledgement ledger. A successful commit
//! supersedes all earlier marks, so the pending-mark count resets to zero.

use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::Mutex as AsyncMutex;
use tracing::instrument;

use crate::error::{BoxError, StreamError};
use crate::source::Source;
use crate::types::{Message, Token};

/// Snapshot of a source's acknowledgement ledger.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AckStats {
  /// Successful Mark calls.
  pub marked: u64,
  /// Successful Commit calls.
  pub committed: u64,
  /// Marks issued since the last commit.
  pub pending: u64,
}

#[derive(Default)]
struct Ledger {
  stats: AckStats,
  last_committed: Option<Token>,
}

/// Owns one source and tracks what has been acknowledged against it.
pub(crate) struct Committer {
  name: String,
  source: AsyncMutex<Box<dyn Source>>,
  ledger: Mutex<Ledger>,
}

impl Committer {
  pub(crate) fn new(name: impl Into<String>, source: Box<dyn Source>) -> Self {
    Self {
      name: name.into(),
      source: AsyncMutex::new(source),
      ledger: Mutex::new(Ledger::default()),
    }
  }

  pub(crate) fn name(&self) -> &str {
    &self.name
  }

  pub(crate) async fn consume(&self) -> Result<Option<Message>, BoxError> {
    self.source.lock().await.consume().await
  }

  async fn mark(&self, token: Option<&Token>) -> Result<(), BoxError> {
    if let Some(token) = token {
      self.source.lock().await.mark(token).await?;
    }
    let mut ledger = self.ledger.lock().unwrap_or_else(PoisonError::into_inner);
    ledger.stats.marked += 1;
    ledger.stats.pending += 1;
    Ok(())
  }

  async fn commit(&self, token: Option<&Token>) -> Result<(), BoxError> {
    if let Some(token) = token {
      self.source.lock().await.commit(token).await?;
    }
    let mut ledger = self.ledger.lock().unwrap_or_else(PoisonError::into_inner);
    ledger.stats.committed += 1;
    ledger.stats.pending = 0;
    if token.is_some() {
      ledger.last_committed = token.cloned();
    }
    Ok(())
  }

  pub(crate) async fn close(&self) -> Result<(), BoxError> {
    self.source.lock().await.close().await
  }

  pub(crate) fn stats(&self) -> AckStats {
    self
      .ledger
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .stats
  }

  pub(crate) fn last_committed(&self) -> Option<Token> {
    self
      .ledger
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .last_committed
      .clone()
  }
}

/// Acknowledgement handle bound to one stage.
///
/// Handed to a [crate::Processor] through `with_pipe` when the task wires the
/// graph. Only pass messages that reached this stage.
pub struct Pipe {
  stage: String,
  committer: Arc<Committer>,
}

impl Pipe {
  pub(crate) fn new(stage: impl Into<String>, committer: Arc<Committer>) -> Self {
    Self {
      stage: stage.into(),
      committer,
    }
  }

  /// Name of the stage this pipe is bound to.
  pub fn stage(&self) -> &str {
    &self.stage
  }

  /// Name of the source acknowledgements are forwarded to.
  pub fn source(&self) -> &str {
    self.committer.name()
  }

  /// `msg` was observed but is not yet safe to discard from the source's replay window.
  #[instrument(level = "trace", skip(self, msg), fields(stage = %self.stage))]
  pub async fn mark(&self, msg: &Message) -> Result<(), StreamError> {
    self
      .committer
      .mark(msg.token())
      .await
      .map_err(|error| StreamError::Commit {
        stage: self.stage.clone(),
        error,
      })
  }

  /// `msg` and everything before it is safe to discard from the source's replay window.
  #[instrument(level = "trace", skip(self, msg), fields(stage = %self.stage))]
  pub async fn commit(&self, msg: &Message) -> Result<(), StreamError> {
    self
      .committer
      .commit(msg.token())
      .await
      .map_err(|error| StreamError::Commit {
        stage: self.stage.clone(),
        error,
      })
  }
}
