//! One message in, one message out.

use async_trait::async_trait;

use crate::error::BoxError;
use crate::processor::{Action, Processor};
use crate::types::Message;

type MapFn = dyn Fn(Message) -> Result<Message, BoxError> + Send + Sync;

/// Transforms every message with a function.
pub struct MapFunc {
  f: Box<MapFn>,
}

impl MapFunc {
  pub fn new<F>(f: F) -> Self
  where
    F: Fn(Message) -> Result<Message, BoxError> + Send + Sync + 'static,
  {
    Self { f: Box::new(f) }
  }
}

#[async_trait]
impl Processor for MapFunc {
  async fn process(&mut self, msg: Message) -> Result<Action, BoxError> {
    (self.f)(msg).map(Action::Emit)
  }
}
