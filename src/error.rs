//! Error types for topology construction and execution.
//!
//! - [BuildError]: malformed topology, raised only by [crate::StreamBuilder::build].
//! - [StreamError]: runtime failures surfaced to the task's error handler.
//! - [TaskError]: misuse of the task control surface and teardown summaries.

use thiserror::Error;

/// Error type returned by stage implementations (sources, processors, predicates).
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors detected while building a topology. Never raised at run time.
#[derive(Debug, Error)]
pub enum BuildError {
  /// Two stages were registered under the same name.
  #[error("duplicate stage name: {0}")]
  DuplicateStage(String),

  /// The topology has no source stage.
  #[error("topology has no sources")]
  NoSources,

  /// The stage graph contains a cycle through the named stage.
  #[error("cycle detected involving stage: {0}")]
  Cycle(String),

  /// A branch was declared with an empty predicate list.
  #[error("branch '{0}' has no predicates")]
  EmptyBranch(String),

  /// More than one stage was attached to the same stream handle.
  #[error("stage '{stage}' already has a downstream stage attached to output {port}")]
  MultipleDownstream {
    /// Upstream stage name.
    stage: String,
    /// Output slot that was attached twice.
    port: usize,
  },
}

/// Runtime errors. Every variant except [StreamError::TypeMismatch] names the stage it came from.
#[derive(Debug, Error)]
pub enum StreamError {
  /// A source failed to produce a message.
  #[error("source '{stage}' failed to consume: {error}")]
  Consume {
    /// Source stage name.
    stage: String,
    /// Underlying failure.
    #[source]
    error: BoxError,
  },

  /// A stage failed while processing a message; the message is dropped.
  #[error("stage '{stage}' failed to process message: {error}")]
  Process {
    /// Stage name.
    stage: String,
    /// Underlying failure.
    #[source]
    error: BoxError,
  },

  /// Forwarding a Mark/Commit to the source, or a periodic commit hook, failed.
  #[error("stage '{stage}' failed to acknowledge: {error}")]
  Commit {
    /// Stage name.
    stage: String,
    /// Underlying failure.
    #[source]
    error: BoxError,
  },

  /// A branch predicate failed; the message is not routed anywhere.
  #[error("branch '{stage}' predicate failed: {error}")]
  Route {
    /// Branch stage name.
    stage: String,
    /// Underlying failure.
    #[source]
    error: BoxError,
  },

  /// A stage failed to release its resources during teardown.
  #[error("stage '{stage}' failed to close: {error}")]
  Close {
    /// Stage name.
    stage: String,
    /// Underlying failure.
    #[source]
    error: BoxError,
  },

  /// A value was read as a type other than the one it carries.
  #[error("expected value of type {expected}")]
  TypeMismatch {
    /// Requested type name.
    expected: &'static str,
  },
}

impl StreamError {
  /// Name of the stage the error is attributed to, if any.
  pub fn stage(&self) -> Option<&str> {
    match self {
      StreamError::Consume { stage, .. }
      | StreamError::Process { stage, .. }
      | StreamError::Commit { stage, .. }
      | StreamError::Route { stage, .. }
      | StreamError::Close { stage, .. } => Some(stage),
      StreamError::TypeMismatch { .. } => None,
    }
  }

  /// True for failures that cost the current message its delivery (process and route errors).
  pub fn is_process_failure(&self) -> bool {
    matches!(
      self,
      StreamError::Process { .. } | StreamError::Route { .. }
    )
  }

  /// Attributes an error returned by a processor to `stage`.
  ///
  /// Acknowledgement errors raised by a [crate::Pipe] keep their classification;
  /// anything else becomes a [StreamError::Process].
  pub(crate) fn from_process(stage: &str, error: BoxError) -> Self {
    match error.downcast::<StreamError>() {
      Ok(e) if matches!(*e, StreamError::Commit { .. }) => *e,
      Ok(e) => StreamError::Process {
        stage: stage.to_string(),
        error: e,
      },
      Err(error) => StreamError::Process {
        stage: stage.to_string(),
        error,
      },
    }
  }
}

/// Errors loading a [crate::TaskConfig].
#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("failed to read config: {0}")]
  Io(#[from] std::io::Error),

  #[error("invalid config JSON: {0}")]
  Json(#[from] serde_json::Error),

  /// An environment override is not a non-negative integer.
  #[error("invalid value for {var}: {value:?}")]
  InvalidEnv {
    /// Variable name.
    var: String,
    /// Offending value.
    value: String,
  },
}

/// Errors from the [crate::Task] control surface.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TaskError {
  /// `on_error` was called after `start`.
  #[error("error handler must be registered before start")]
  HandlerAfterStart,

  /// `start` was called on a task that is already running.
  #[error("task already started")]
  AlreadyStarted,

  /// The task has been closed and cannot be started.
  #[error("task is closed")]
  Closed,

  /// One or more stages failed to close, or a panicked pump lost its stages.
  /// Each failure was reported to the handler.
  #[error("{failed} stage(s) failed to close")]
  Teardown {
    /// Number of failed stage closes.
    failed: usize,
  },
}
