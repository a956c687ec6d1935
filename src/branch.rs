//! First-match branch routing.

use std::fmt;

use tracing::instrument;

use crate::error::{BoxError, StreamError};
use crate::types::Message;

type PredicateFn = dyn Fn(&Message) -> Result<bool, BoxError> + Send + Sync;

/// One branch slot's condition. Sees the message read-only.
pub struct Predicate(Box<PredicateFn>);

impl Predicate {
  pub fn new<F>(f: F) -> Self
  where
    F: Fn(&Message) -> Result<bool, BoxError> + Send + Sync + 'static,
  {
    Self(Box::new(f))
  }

  /// Predicate that matches every message; use as the last slot for a default branch.
  pub fn always() -> Self {
    Self::new(|_| Ok(true))
  }

  pub fn test(&self, msg: &Message) -> Result<bool, BoxError> {
    (self.0)(msg)
  }
}

impl fmt::Debug for Predicate {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str("Predicate")
  }
}

/// Returns the index of the first predicate matching `msg`, or `None` to discard it.
///
/// A failing predicate aborts routing for the message: later predicates are
/// not evaluated and the message goes nowhere.
#[instrument(level = "trace", skip(predicates, msg))]
pub(crate) fn route(
  stage: &str,
  predicates: &[Predicate],
  msg: &Message,
) -> Result<Option<usize>, StreamError> {
  for (slot, predicate) in predicates.iter().enumerate() {
    let matched = predicate.test(msg).map_err(|error| StreamError::Route {
      stage: stage.to_string(),
      error,
    })?;
    if matched {
      return Ok(Some(slot));
    }
  }
  Ok(None)
}
