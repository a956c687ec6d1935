//! Data flowing through a topology: opaque values, commit tokens and messages.
//!
//! Values are runtime-typed (`Arc` of any `Debug + Send + Sync` type); stages
//! read them back with [Value::get], which fails with a typed error instead of
//! panicking on a mismatched cast.

mod message;
mod value;

pub use message::Message;
pub use value::{Token, Value};
