//! The supervisor that runs a [Topology]: Idle → Running → Draining → Closed.

use std::fmt;
use std::sync::Arc;

use futures::future::join_all;
use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};
use tracing::{debug, info, instrument};

use super::config::TaskConfig;
use super::pump::Pump;
use super::supervisor::{self, ErrorAction, ErrorHandler, Reporter};
use crate::error::{StreamError, TaskError};
use crate::pipe::{AckStats, Committer};
use crate::topology::{PipelineStage, StageOp, Topology};
use crate::types::Token;

/// Lifecycle state of a [Task].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
  Idle,
  Running,
  Draining,
  Closed,
}

impl fmt::Display for TaskState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      TaskState::Idle => write!(f, "idle"),
      TaskState::Running => write!(f, "running"),
      TaskState::Draining => write!(f, "draining"),
      TaskState::Closed => write!(f, "closed"),
    }
  }
}

struct RunningPump {
  committer: Arc<Committer>,
  handle: JoinHandle<Vec<PipelineStage>>,
}

struct Running {
  reporter: Reporter,
  supervisor: JoinHandle<()>,
  pumps: Vec<RunningPump>,
}

/// Drives a topology: one pump per source, one error supervisor.
///
/// ```rust,ignore
/// let mut task = Task::new(topology);
/// task.on_error(|err| {
///   eprintln!("{err}");
///   ErrorAction::Continue
/// })?;
/// task.start(&CancellationToken::new())?;
/// // ... later
/// task.close().await?;
/// ```
pub struct Task {
  state: TaskState,
  topology: Option<Topology>,
  config: TaskConfig,
  handler: Option<ErrorHandler>,
  cancel: CancellationToken,
  committers: Vec<Arc<Committer>>,
  running: Option<Running>,
}

impl Task {
  pub fn new(topology: Topology) -> Self {
    Self::with_config(topology, TaskConfig::default())
  }

  pub fn with_config(topology: Topology, config: TaskConfig) -> Self {
    Self {
      state: TaskState::Idle,
      topology: Some(topology),
      config,
      handler: None,
      cancel: CancellationToken::new(),
      committers: Vec::new(),
      running: None,
    }
  }

  pub fn state(&self) -> TaskState {
    self.state
  }

  /// Registers the handler invoked once per runtime failure. Must precede [Task::start].
  ///
  /// Calls are serialized, so the handler needs no internal synchronization.
  /// Without a handler, a failing pump stops.
  pub fn on_error<F>(&mut self, handler: F) -> Result<(), TaskError>
  where
    F: FnMut(&StreamError) -> ErrorAction + Send + 'static,
  {
    if self.state != TaskState::Idle {
      return Err(TaskError::HandlerAfterStart);
    }
    self.handler = Some(Box::new(handler));
    Ok(())
  }

  /// Launches one pump per source. Must be called from within a tokio runtime.
  ///
  /// Cancelling `ctx` stops the pumps; [Task::close] must still be called to
  /// close the stages.
  #[instrument(level = "debug", skip_all)]
  pub fn start(&mut self, ctx: &CancellationToken) -> Result<(), TaskError> {
    match self.state {
      TaskState::Idle => {}
      TaskState::Running | TaskState::Draining => return Err(TaskError::AlreadyStarted),
      TaskState::Closed => return Err(TaskError::Closed),
    }
    let Some(topology) = self.topology.take() else {
      return Err(TaskError::AlreadyStarted);
    };

    self.cancel = ctx.child_token();
    let handler = self.handler.take().unwrap_or_else(supervisor::default_handler);
    let (reporter, supervisor) = supervisor::spawn(handler);

    let mut pumps = Vec::new();
    for pipeline in topology.into_pipelines() {
      let pump = Pump::new(
        pipeline,
        reporter.clone(),
        self.cancel.clone(),
        self.config,
      );
      let committer = pump.committer();
      self.committers.push(Arc::clone(&committer));
      pumps.push(RunningPump {
        committer,
        handle: tokio::spawn(pump.run()),
      });
    }

    info!(pumps = pumps.len(), "task started");
    self.running = Some(Running {
      reporter,
      supervisor,
      pumps,
    });
    self.state = TaskState::Running;
    Ok(())
  }

  /// Resolves once the task has been asked to stop: by [Task::close], by an
  /// [ErrorAction::Shutdown] verdict, or by cancellation of the start context.
  pub fn stopped(&self) -> WaitForCancellationFuture<'_> {
    self.cancel.cancelled()
  }

  /// Acknowledgement ledger of the named source. Available once started.
  pub fn acknowledgements(&self, source: &str) -> Option<AckStats> {
    self
      .committers
      .iter()
      .find(|c| c.name() == source)
      .map(|c| c.stats())
  }

  /// Last token successfully committed to the named source.
  pub fn last_committed(&self, source: &str) -> Option<Token> {
    self
      .committers
      .iter()
      .find(|c| c.name() == source)
      .and_then(|c| c.last_committed())
  }

  /// Stops pumping, waits for in-flight deliveries, then closes every stage
  /// deepest-first (sinks before their sources).
  ///
  /// A no-op while idle and on every call after the first. Close failures go
  /// to the error handler and are summarized in [TaskError::Teardown]; a pump
  /// that panicked counts as one failure, since its stages are lost.
  #[instrument(level = "debug", skip(self))]
  pub async fn close(&mut self) -> Result<(), TaskError> {
    if self.state != TaskState::Running {
      return Ok(());
    }
    let Some(running) = self.running.take() else {
      return Ok(());
    };
    self.state = TaskState::Draining;
    self.cancel.cancel();

    let Running {
      reporter,
      supervisor,
      pumps,
    } = running;
    let (committers, handles): (Vec<_>, Vec<_>) =
      pumps.into_iter().map(|p| (p.committer, p.handle)).unzip();
    let results = join_all(handles).await;

    let mut failed = 0;
    for (committer, result) in committers.into_iter().zip(results).rev() {
      match result {
        Ok(stages) => {
          for stage in stages.into_iter().rev() {
            let StageOp::Processor(mut p) = stage.op else {
              continue;
            };
            debug!(stage = %stage.name, "closing stage");
            if let Err(error) = p.close().await {
              failed += 1;
              reporter
                .report(StreamError::Close {
                  stage: stage.name,
                  error,
                })
                .await;
            }
          }
        }
        Err(join) => {
          // The pump panicked and took its stages with it; none can be closed.
          failed += 1;
          reporter
            .report(StreamError::Process {
              stage: committer.name().to_string(),
              error: Box::new(join),
            })
            .await;
        }
      }

      debug!(stage = %committer.name(), "closing source");
      if let Err(error) = committer.close().await {
        failed += 1;
        reporter
          .report(StreamError::Close {
            stage: committer.name().to_string(),
            error,
          })
          .await;
      }
    }

    drop(reporter);
    let _ = supervisor.await;
    self.state = TaskState::Closed;
    info!(failed, "task closed");

    if failed > 0 {
      Err(TaskError::Teardown { failed })
    } else {
      Ok(())
    }
  }
}

impl Drop for Task {
  fn drop(&mut self) {
    // Pumps of a task dropped without close stop at their next check.
    self.cancel.cancel();
  }
}
