//! The record flowing through a topology.

use super::{Token, Value};

/// One record: an opaque key, a replaceable value and the source's commit token.
///
/// Stages may replace `value`; `key` and `token` are read-only. The engine
/// re-attaches the original token to any message a processor emits.
#[derive(Debug, Clone)]
pub struct Message {
  key: Option<Value>,
  pub value: Value,
  token: Option<Token>,
}

impl Message {
  pub fn new(key: Option<Value>, value: Value) -> Self {
    Self {
      key,
      value,
      token: None,
    }
  }

  /// Message with no key.
  pub fn from_value(value: Value) -> Self {
    Self::new(None, value)
  }

  /// Attaches the commit token. Called by sources when producing a message.
  pub fn with_token(mut self, token: Token) -> Self {
    self.token = Some(token);
    self
  }

  pub fn key(&self) -> Option<&Value> {
    self.key.as_ref()
  }

  pub fn token(&self) -> Option<&Token> {
    self.token.as_ref()
  }

  /// Replaces the value, keeping key and token.
  pub fn with_value(mut self, value: Value) -> Self {
    self.value = value;
    self
  }

  pub(crate) fn set_token(&mut self, token: Option<Token>) {
    self.token = token;
  }
}
