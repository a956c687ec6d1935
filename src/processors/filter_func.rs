//! Forwards messages that pass a predicate.

use async_trait::async_trait;

use crate::branch::Predicate;
use crate::error::BoxError;
use crate::processor::{Action, Processor};
use crate::types::Message;

/// Drops every message for which the predicate is false.
pub struct FilterFunc {
  predicate: Predicate,
}

impl FilterFunc {
  pub fn new(predicate: Predicate) -> Self {
    Self { predicate }
  }
}

#[async_trait]
impl Processor for FilterFunc {
  async fn process(&mut self, msg: Message) -> Result<Action, BoxError> {
    if self.predicate.test(&msg)? {
      Ok(Action::Emit(msg))
    } else {
      Ok(Action::Drop)
    }
  }
}
