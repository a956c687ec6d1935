//! Test doubles shared by the unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::BoxError;
use crate::pipe::Pipe;
use crate::processor::{Action, Processor};
use crate::source::Source;
use crate::types::{Message, Token, Value};

/// What a [VecSource] was told, in call order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SourceCall {
  Mark(u64),
  Commit(u64),
  Close,
}

/// Emits the given integers with their index as a `u64` token, then reports nothing available.
pub(crate) struct VecSource {
  pending: VecDeque<i64>,
  next_offset: u64,
  pub(crate) calls: Arc<Mutex<Vec<SourceCall>>>,
  pub(crate) fail_consume: bool,
  pub(crate) fail_commit: bool,
}

impl VecSource {
  pub(crate) fn new(values: impl IntoIterator<Item = i64>) -> Self {
    Self {
      pending: values.into_iter().collect(),
      next_offset: 0,
      calls: Arc::new(Mutex::new(Vec::new())),
      fail_consume: false,
      fail_commit: false,
    }
  }

  pub(crate) fn calls(&self) -> Arc<Mutex<Vec<SourceCall>>> {
    Arc::clone(&self.calls)
  }
}

#[async_trait]
impl Source for VecSource {
  async fn consume(&mut self) -> Result<Option<Message>, BoxError> {
    if self.fail_consume {
      return Err("supply unavailable".into());
    }
    Ok(self.pending.pop_front().map(|n| {
      let offset = self.next_offset;
      self.next_offset += 1;
      Message::from_value(Value::new(n)).with_token(Token::new(offset))
    }))
  }

  async fn mark(&mut self, token: &Token) -> Result<(), BoxError> {
    self.calls.lock().unwrap().push(SourceCall::Mark(*token.get::<u64>()?));
    Ok(())
  }

  async fn commit(&mut self, token: &Token) -> Result<(), BoxError> {
    if self.fail_commit {
      return Err("broker rejected commit".into());
    }
    self
      .calls
      .lock()
      .unwrap()
      .push(SourceCall::Commit(*token.get::<u64>()?));
    Ok(())
  }

  async fn close(&mut self) -> Result<(), BoxError> {
    self.calls.lock().unwrap().push(SourceCall::Close);
    Ok(())
  }
}

/// Terminal processor that records every integer it receives.
pub(crate) struct Collect {
  pub(crate) seen: Arc<Mutex<Vec<i64>>>,
}

impl Collect {
  pub(crate) fn new() -> (Self, Arc<Mutex<Vec<i64>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    (
      Self {
        seen: Arc::clone(&seen),
      },
      seen,
    )
  }
}

#[async_trait]
impl Processor for Collect {
  async fn process(&mut self, msg: Message) -> Result<Action, BoxError> {
    self.seen.lock().unwrap().push(*msg.value.get::<i64>()?);
    Ok(Action::Drop)
  }
}

/// The canonical batching consumer: Commit every `batch`-th message, Mark the rest.
pub(crate) struct BatchCommit {
  batch: usize,
  count: usize,
  pipe: Option<Pipe>,
  pub(crate) hooks: Arc<AtomicUsize>,
}

impl BatchCommit {
  pub(crate) fn new(batch: usize) -> Self {
    Self {
      batch,
      count: 0,
      pipe: None,
      hooks: Arc::new(AtomicUsize::new(0)),
    }
  }
}

#[async_trait]
impl Processor for BatchCommit {
  fn with_pipe(&mut self, pipe: Pipe) {
    self.pipe = Some(pipe);
  }

  async fn process(&mut self, msg: Message) -> Result<Action, BoxError> {
    let pipe = self.pipe.as_ref().ok_or("pipe not wired")?;
    self.count += 1;
    if self.count >= self.batch {
      self.count = 0;
      pipe.commit(&msg).await?;
    } else {
      pipe.mark(&msg).await?;
    }
    Ok(Action::Drop)
  }

  async fn commit(&mut self) -> Result<(), BoxError> {
    self.hooks.fetch_add(1, Ordering::SeqCst);
    Ok(())
  }
}

/// Pass-through that logs `close:<name>` when closed, optionally failing.
pub(crate) struct Recorder {
  name: String,
  log: Arc<Mutex<Vec<String>>>,
  fail_close: bool,
}

impl Recorder {
  pub(crate) fn new(name: &str, log: &Arc<Mutex<Vec<String>>>) -> Self {
    Self {
      name: name.to_string(),
      log: Arc::clone(log),
      fail_close: false,
    }
  }

  pub(crate) fn failing(mut self) -> Self {
    self.fail_close = true;
    self
  }
}

#[async_trait]
impl Processor for Recorder {
  async fn process(&mut self, msg: Message) -> Result<Action, BoxError> {
    Ok(Action::Emit(msg))
  }

  async fn close(&mut self) -> Result<(), BoxError> {
    self.log.lock().unwrap().push(format!("close:{}", self.name));
    if self.fail_close {
      return Err("resource leak".into());
    }
    Ok(())
  }
}

/// Polls `cond` until it holds, failing the test after two seconds.
pub(crate) async fn eventually(cond: impl Fn() -> bool) {
  let deadline = tokio::time::Instant::now() + std::time::Duration::from_secs(2);
  while !cond() {
    assert!(
      tokio::time::Instant::now() < deadline,
      "condition not met in time"
    );
    tokio::time::sleep(std::time::Duration::from_millis(1)).await;
  }
}
