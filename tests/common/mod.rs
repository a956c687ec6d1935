//! Sources and processors shared by the integration tests. Public API only.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use streamweave_topology::{
  Action, BoxError, Message, Pipe, Processor, Source, TaskConfig, Token, Value,
};

/// Acknowledgement received by a [ScriptedSource], with the offset it carried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ack {
  Mark(u64),
  Commit(u64),
}

/// Emits a fixed list of integers tagged with their offset, then idles.
pub struct ScriptedSource {
  pending: VecDeque<i64>,
  offset: u64,
  acks: Arc<Mutex<Vec<Ack>>>,
  closed: Arc<Mutex<usize>>,
}

impl ScriptedSource {
  pub fn new(values: impl IntoIterator<Item = i64>) -> Self {
    Self {
      pending: values.into_iter().collect(),
      offset: 0,
      acks: Arc::new(Mutex::new(Vec::new())),
      closed: Arc::new(Mutex::new(0)),
    }
  }

  pub fn acks(&self) -> Arc<Mutex<Vec<Ack>>> {
    Arc::clone(&self.acks)
  }

  pub fn closed(&self) -> Arc<Mutex<usize>> {
    Arc::clone(&self.closed)
  }
}

#[async_trait]
impl Source for ScriptedSource {
  async fn consume(&mut self) -> Result<Option<Message>, BoxError> {
    Ok(self.pending.pop_front().map(|n| {
      self.offset += 1;
      Message::from_value(Value::new(n)).with_token(Token::new(self.offset))
    }))
  }

  async fn mark(&mut self, token: &Token) -> Result<(), BoxError> {
    self.acks.lock().unwrap().push(Ack::Mark(*token.get::<u64>()?));
    Ok(())
  }

  async fn commit(&mut self, token: &Token) -> Result<(), BoxError> {
    self.acks.lock().unwrap().push(Ack::Commit(*token.get::<u64>()?));
    Ok(())
  }

  async fn close(&mut self) -> Result<(), BoxError> {
    *self.closed.lock().unwrap() += 1;
    Ok(())
  }
}

/// Records each integer, then commits every `batch`-th message and marks the rest.
pub struct Committing {
  batch: usize,
  count: usize,
  pipe: Option<Pipe>,
  seen: Arc<Mutex<Vec<i64>>>,
}

impl Committing {
  pub fn new(batch: usize) -> (Self, Arc<Mutex<Vec<i64>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    (
      Self {
        batch,
        count: 0,
        pipe: None,
        seen: Arc::clone(&seen),
      },
      seen,
    )
  }
}

#[async_trait]
impl Processor for Committing {
  fn with_pipe(&mut self, pipe: Pipe) {
    self.pipe = Some(pipe);
  }

  async fn process(&mut self, msg: Message) -> Result<Action, BoxError> {
    self.seen.lock().unwrap().push(*msg.value.get::<i64>()?);
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
}

pub fn fast_config() -> TaskConfig {
  TaskConfig {
    commit_interval_ms: 0,
    idle_backoff_ms: 1,
  }
}

/// Polls `cond` until it holds, panicking after two seconds.
pub async fn wait_until(cond: impl Fn() -> bool) {
  let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
  while !cond() {
    assert!(
      tokio::time::Instant::now() < deadline,
      "condition not met in time"
    );
    tokio::time::sleep(Duration::from_millis(1)).await;
  }
}
