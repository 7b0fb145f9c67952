//! Engine error type for `ragstore-rqlite`.
//!
//! Never carries the connection string: requests are sent to a base URL
//! without user info and credentials travel only in the auth header.

use std::fmt::Display;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("http error: {0}")]
  Http(#[from] reqwest::Error),

  #[error("rqlite responded {status}: {body}")]
  Status { status: u16, body: String },

  #[error("statement {index} failed: {message}")]
  Statement { index: usize, message: String },

  #[error("rqlite error: {0}")]
  Server(String),

  #[error("unexpected response: {0}")]
  Decode(String),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("date/time parse error: {0}")]
  DateParse(#[from] chrono::ParseError),

  #[error("invalid endpoint: {0}")]
  Url(#[from] url::ParseError),
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
