//! Side-effecting pass-through that writes each message to a sink.

use std::io::{self, Write};

use async_trait::async_trait;

use crate::error::BoxError;
use crate::processor::{Action, Processor};
use crate::types::Message;

/// Writes `name: key=… value=…` for every message, then forwards it unchanged.
pub struct Print {
  name: String,
  out: Box<dyn Write + Send>,
}

impl Print {
  /// Prints to stdout.
  pub fn new(name: impl Into<String>) -> Self {
    Self::to_writer(name, io::stdout())
  }

  pub fn to_writer(name: impl Into<String>, out: impl Write + Send + 'static) -> Self {
    Self {
      name: name.into(),
      out: Box::new(out),
    }
  }
}

#[async_trait]
impl Processor for Print {
  async fn process(&mut self, msg: Message) -> Result<Action, BoxError> {
    match msg.key() {
      Some(key) => writeln!(self.out, "{}: key={:?} value={:?}", self.name, key, msg.value)?,
      None => writeln!(self.out, "{}: value={:?}", self.name, msg.value)?,
    }
    Ok(Action::Emit(msg))
  }

  async fn commit(&mut self) -> Result<(), BoxError> {
    self.out.flush()?;
    Ok(())
  }

  async fn close(&mut self) -> Result<(), BoxError> {
    self.out.flush()?;
    Ok(())
  }
}
