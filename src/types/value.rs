//! Opaque runtime-typed values and commit tokens.

use std::any::{Any, type_name};
use std::fmt;
use std::sync::Arc;

use crate::error::StreamError;

/// Object-safe view of a value: downcastable and printable.
trait Datum: Any + fmt::Debug + Send + Sync {
  fn as_any(&self) -> &dyn Any;
}

impl<T: Any + fmt::Debug + Send + Sync> Datum for T {
  fn as_any(&self) -> &dyn Any {
    self
  }
}

/// Opaque, cheaply clonable value carried by a [crate::Message].
#[derive(Clone)]
pub struct Value(Arc<dyn Datum>);

impl Value {
  pub fn new<T: Any + fmt::Debug + Send + Sync>(value: T) -> Self {
    Self(Arc::new(value))
  }

  /// Returns a reference to the inner value if it is a `T`.
  pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
    let datum: &dyn Datum = &*self.0;
    datum.as_any().downcast_ref::<T>()
  }

  /// Returns the inner value as `T`, or [StreamError::TypeMismatch].
  pub fn get<T: Any>(&self) -> Result<&T, StreamError> {
    self.downcast_ref::<T>().ok_or(StreamError::TypeMismatch {
      expected: type_name::<T>(),
    })
  }

  pub fn is<T: Any>(&self) -> bool {
    self.downcast_ref::<T>().is_some()
  }
}

impl fmt::Debug for Value {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let datum: &dyn Datum = &*self.0;
    fmt::Debug::fmt(datum, f)
  }
}

/// Opaque replay position handed out by a source and handed back to it on Mark/Commit.
#[derive(Clone)]
pub struct Token(Value);

impl Token {
  pub fn new<T: Any + fmt::Debug + Send + Sync>(position: T) -> Self {
    Self(Value::new(position))
  }

  pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
    self.0.downcast_ref::<T>()
  }

  pub fn get<T: Any>(&self) -> Result<&T, StreamError> {
    self.0.get::<T>()
  }
}

impl fmt::Debug for Token {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_tuple("Token").field(&self.0).finish()
  }
}
