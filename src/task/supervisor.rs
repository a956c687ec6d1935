//! Serializes error-handler calls from concurrently running pumps.
//!
//! Pumps send each failure over a channel and wait for the handler's verdict,
//! so the handler runs on one task, once per failure, never concurrently.

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::error::StreamError;

/// Channel depth between pumps and the supervisor.
const REPORT_CHANNEL_CAPACITY: usize = 16;

/// What a pump does after its error has been handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorAction {
  /// Keep pumping; the failed message is dropped.
  Continue,
  /// Stop the pump that reported the error.
  Stop,
  /// Stop every pump of the task.
  Shutdown,
}

/// Error handler registered with [crate::Task::on_error].
pub type ErrorHandler = Box<dyn FnMut(&StreamError) -> ErrorAction + Send>;

/// Handler used when none is registered: halt the failing pump.
pub(crate) fn default_handler() -> ErrorHandler {
  Box::new(|_: &StreamError| ErrorAction::Stop)
}

struct Report {
  error: StreamError,
  reply: oneshot::Sender<ErrorAction>,
}

/// Sending side held by each pump.
#[derive(Clone)]
pub(crate) struct Reporter {
  tx: mpsc::Sender<Report>,
}

impl Reporter {
  /// Hands `error` to the handler and waits for its decision.
  ///
  /// If the supervisor is gone (the handler panicked), the pump is told to stop.
  pub(crate) async fn report(&self, error: StreamError) -> ErrorAction {
    let (reply, verdict) = oneshot::channel();
    if self.tx.send(Report { error, reply }).await.is_err() {
      return ErrorAction::Stop;
    }
    verdict.await.unwrap_or(ErrorAction::Stop)
  }
}

/// Spawns the supervisor task. It exits once every [Reporter] has been dropped.
pub(crate) fn spawn(mut handler: ErrorHandler) -> (Reporter, JoinHandle<()>) {
  let (tx, mut rx) = mpsc::channel::<Report>(REPORT_CHANNEL_CAPACITY);
  let handle = tokio::spawn(async move {
    while let Some(Report { error, reply }) = rx.recv().await {
      let action = handler(&error);
      let _ = reply.send(action);
    }
    debug!("error supervisor stopped");
  });
  (Reporter { tx }, handle)
}
