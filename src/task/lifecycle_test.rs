//! Tests for `Task`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::{ErrorAction, Task, TaskConfig, TaskState};
use crate::error::{BoxError, StreamError, TaskError};
use crate::pipe::AckStats;
use crate::processor::{Action, Processor};
use crate::testing::{BatchCommit, Collect, Recorder, SourceCall, VecSource, eventually};
use crate::topology::{StreamBuilder, Topology};
use crate::types::Message;

fn fast() -> TaskConfig {
  TaskConfig {
    commit_interval_ms: 0,
    idle_backoff_ms: 1,
  }
}

fn linear(values: Vec<i64>, log: &Arc<Mutex<Vec<String>>>) -> (Topology, Arc<Mutex<Vec<SourceCall>>>) {
  let builder = StreamBuilder::new();
  let source = VecSource::new(values);
  let calls = source.calls();
  builder
    .source("src", source)
    .process("first", Recorder::new("first", log))
    .process("second", Recorder::new("second", log));
  (builder.build().unwrap(), calls)
}

#[tokio::test]
async fn lifecycle_states() {
  let log = Arc::new(Mutex::new(Vec::new()));
  let (tp, _) = linear(vec![], &log);
  let mut task = Task::with_config(tp, fast());
  assert_eq!(task.state(), TaskState::Idle);

  task.start(&CancellationToken::new()).unwrap();
  assert_eq!(task.state(), TaskState::Running);

  task.close().await.unwrap();
  assert_eq!(task.state(), TaskState::Closed);
  assert_eq!(task.state().to_string(), "closed");
}

#[tokio::test]
async fn close_tears_down_deepest_first_exactly_once() {
  let log = Arc::new(Mutex::new(Vec::new()));
  let (tp, calls) = linear(vec![1, 2], &log);
  let mut task = Task::with_config(tp, fast());
  task.start(&CancellationToken::new()).unwrap();

  task.close().await.unwrap();
  task.close().await.unwrap();

  assert_eq!(*log.lock().unwrap(), vec!["close:second", "close:first"]);
  let closes = calls
    .lock()
    .unwrap()
    .iter()
    .filter(|c| **c == SourceCall::Close)
    .count();
  assert_eq!(closes, 1);
}

#[tokio::test]
async fn close_while_idle_is_a_noop() {
  let log = Arc::new(Mutex::new(Vec::new()));
  let (tp, calls) = linear(vec![], &log);
  let mut task = Task::new(tp);
  task.close().await.unwrap();
  assert_eq!(task.state(), TaskState::Idle);
  assert!(log.lock().unwrap().is_empty());
  assert!(calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn control_surface_misuse_is_rejected() {
  let log = Arc::new(Mutex::new(Vec::new()));
  let (tp, _) = linear(vec![], &log);
  let mut task = Task::with_config(tp, fast());
  let ctx = CancellationToken::new();
  task.start(&ctx).unwrap();

  assert_eq!(
    task.on_error(|_| ErrorAction::Continue),
    Err(TaskError::HandlerAfterStart)
  );
  assert_eq!(task.start(&ctx), Err(TaskError::AlreadyStarted));

  task.close().await.unwrap();
  assert_eq!(task.start(&ctx), Err(TaskError::Closed));
}

#[tokio::test]
async fn failed_stage_close_is_reported_and_summarized() {
  let log = Arc::new(Mutex::new(Vec::new()));
  let builder = StreamBuilder::new();
  builder
    .source("src", VecSource::new([]))
    .process("leaky", Recorder::new("leaky", &log).failing());
  let mut task = Task::with_config(builder.build().unwrap(), fast());
  let errors = Arc::new(Mutex::new(Vec::new()));
  let seen = Arc::clone(&errors);
  task
    .on_error(move |e: &StreamError| {
      seen.lock().unwrap().push(e.stage().unwrap_or_default().to_string());
      ErrorAction::Continue
    })
    .unwrap();
  task.start(&CancellationToken::new()).unwrap();

  assert_eq!(task.close().await, Err(TaskError::Teardown { failed: 1 }));
  assert_eq!(*errors.lock().unwrap(), vec!["leaky"]);
  assert_eq!(task.state(), TaskState::Closed);
}

/// Panics on the first message it sees.
struct Explode {
  reached: Arc<AtomicBool>,
}

#[async_trait]
impl Processor for Explode {
  async fn process(&mut self, _msg: Message) -> Result<Action, BoxError> {
    self.reached.store(true, Ordering::SeqCst);
    panic!("stage blew up");
  }
}

#[tokio::test]
async fn panicked_pump_counts_as_teardown_failure() {
  let log = Arc::new(Mutex::new(Vec::new()));
  let reached = Arc::new(AtomicBool::new(false));
  let builder = StreamBuilder::new();
  let source = VecSource::new([1]);
  let calls = source.calls();
  builder
    .source("src", source)
    .process("rec", Recorder::new("rec", &log))
    .process(
      "explode",
      Explode {
        reached: Arc::clone(&reached),
      },
    );
  let mut task = Task::with_config(builder.build().unwrap(), fast());
  let errors = Arc::new(Mutex::new(Vec::new()));
  let seen = Arc::clone(&errors);
  task
    .on_error(move |e: &StreamError| {
      seen.lock().unwrap().push((e.is_process_failure(), e.stage().map(str::to_string)));
      ErrorAction::Continue
    })
    .unwrap();
  task.start(&CancellationToken::new()).unwrap();
  eventually(|| reached.load(Ordering::SeqCst)).await;

  assert_eq!(task.close().await, Err(TaskError::Teardown { failed: 1 }));
  assert_eq!(*errors.lock().unwrap(), vec![(true, Some("src".to_string()))]);
  assert!(log.lock().unwrap().is_empty());
  assert_eq!(*calls.lock().unwrap(), vec![SourceCall::Close]);
}

#[tokio::test]
async fn parent_cancellation_stops_pumps() {
  let log = Arc::new(Mutex::new(Vec::new()));
  let (tp, _) = linear(vec![], &log);
  let mut task = Task::with_config(tp, fast());
  let ctx = CancellationToken::new();
  task.start(&ctx).unwrap();

  ctx.cancel();
  task.stopped().await;
  task.close().await.unwrap();
  assert_eq!(log.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn shutdown_verdict_resolves_stopped() {
  let builder = StreamBuilder::new();
  let mut source = VecSource::new([]);
  source.fail_consume = true;
  builder.source("src", source).print("print");
  let mut task = Task::with_config(builder.build().unwrap(), fast());
  task.on_error(|_| ErrorAction::Shutdown).unwrap();
  task.start(&CancellationToken::new()).unwrap();

  task.stopped().await;
  task.close().await.unwrap();
}

#[tokio::test]
async fn acknowledgements_track_marks_and_commits() {
  let builder = StreamBuilder::new();
  builder
    .source("src", VecSource::new([1, 2, 3]))
    .process("commit", BatchCommit::new(2));
  let mut task = Task::with_config(builder.build().unwrap(), fast());
  assert_eq!(task.acknowledgements("src"), None);
  task.start(&CancellationToken::new()).unwrap();

  eventually(|| task.acknowledgements("src").is_some_and(|a| a.marked + a.committed == 3)).await;
  assert_eq!(
    task.acknowledgements("src"),
    Some(AckStats {
      marked: 2,
      committed: 1,
      pending: 1
    })
  );
  let last = task.last_committed("src").unwrap();
  assert_eq!(last.downcast_ref::<u64>(), Some(&1));
  assert_eq!(task.acknowledgements("nope"), None);
  task.close().await.unwrap();
}

#[tokio::test]
async fn sources_run_independently() {
  let builder = StreamBuilder::new();
  let (left, left_seen) = Collect::new();
  let (right, right_seen) = Collect::new();
  builder.source("left", VecSource::new([1, 2])).process("l", left);
  builder.source("right", VecSource::new([3])).process("r", right);
  let mut task = Task::with_config(builder.build().unwrap(), fast());
  task.start(&CancellationToken::new()).unwrap();

  eventually(|| left_seen.lock().unwrap().len() == 2 && right_seen.lock().unwrap().len() == 1).await;
  task.close().await.unwrap();
  assert_eq!(*left_seen.lock().unwrap(), vec![1, 2]);
  assert_eq!(*right_seen.lock().unwrap(), vec![3]);
}
