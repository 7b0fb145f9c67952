//! Error taxonomy shared by every ragstore backend.
//!
//! Backend-specific engine errors are boxed into the `source` of the variant
//! describing which operation failed, so callers match on a single enum.

use thiserror::Error;

use crate::document::DocumentId;

/// A boxed engine error carried as the `source` of a core variant.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum Error {
  #[error("invalid connection string: {0}")]
  InvalidConnectionString(String),

  #[error("failed to open store {target}: {source}")]
  Open {
    target: String,
    #[source]
    source: BoxError,
  },

  /// The store stays at the last version applied before `version`.
  #[error("migration {version} failed: {source}")]
  MigrationFailed {
    version: u32,
    #[source]
    source:  BoxError,
  },

  #[error("{op} failed for {target}: {source}")]
  WriteFailed {
    op:     &'static str,
    target: String,
    #[source]
    source: BoxError,
  },

  #[error("upsert of {0} resolved to no row id")]
  UpsertFailed(DocumentId),

  #[error("{op} failed for {target}: {source}")]
  QueryFailed {
    op:     &'static str,
    target: String,
    #[source]
    source: BoxError,
  },

  #[error("embedding has {actual} dimensions, expected {expected}")]
  DimensionMismatch { expected: usize, actual: usize },

  /// NaN or infinity at `position`; such a vector has no distance to anything.
  #[error("embedding component {position} is not a finite number")]
  NonFiniteEmbedding { position: usize },

  #[error("limit must be a positive integer")]
  InvalidLimit,

  #[error("operation cancelled")]
  Cancelled,
}

impl Error {
  pub fn write(op: &'static str, target: impl ToString, source: impl Into<BoxError>) -> Self {
    Self::WriteFailed { op, target: target.to_string(), source: source.into() }
  }

  pub fn query(op: &'static str, target: impl ToString, source: impl Into<BoxError>) -> Self {
    Self::QueryFailed { op, target: target.to_string(), source: source.into() }
  }

  pub fn migration(version: u32, source: impl Into<BoxError>) -> Self {
    Self::MigrationFailed { version, source: source.into() }
  }

  /// Whether the error came from the caller's cancellation signal.
  pub fn is_cancelled(&self) -> bool { matches!(self, Self::Cancelled) }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
