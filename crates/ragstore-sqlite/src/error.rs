//! Engine error type for `ragstore-sqlite`.
//!
//! These never reach callers directly: they are boxed as the source of the
//! [`ragstore_core::Error`] variant naming the failed operation.

use std::fmt::Display;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("date/time parse error: {0}")]
  DateParse(#[from] chrono::ParseError),

  #[error("schema version out of range: {0}")]
  Version(i64),
}

impl From<rusqlite::Error> for Error {
  fn from(e: rusqlite::Error) -> Self { Self::Database(e.into()) }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Map an engine failure to [`ragstore_core::Error::WriteFailed`].
pub(crate) fn write_failed<E: Into<Error>>(
  op: &'static str,
  target: &impl Display,
) -> impl FnOnce(E) -> ragstore_core::Error {
  let target = target.to_string();
  move |e| ragstore_core::Error::write(op, target, e.into())
}

/// Map an engine failure to [`ragstore_core::Error::QueryFailed`].
pub(crate) fn query_failed<E: Into<Error>>(
  op: &'static str,
  target: &impl Display,
) -> impl FnOnce(E) -> ragstore_core::Error {
  let target = target.to_string();
  move |e| ragstore_core::Error::query(op, target, e.into())
}
