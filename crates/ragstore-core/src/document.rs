//! Document identity and the values persisted for it.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Tenant-scoped identity of a document.
///
/// Two documents are the same entity iff both fields are equal. The natural
/// key stored in the canonical table is the [`Display`](fmt::Display) form,
/// `partition:url`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentId {
  /// Tenant namespace; every read and write is scoped to exactly one.
  pub partition: String,
  /// Locator unique within the partition. Need not be a real URL.
  pub url:       String,
}

impl DocumentId {
  pub fn new(partition: impl Into<String>, url: impl Into<String>) -> Self {
    Self { partition: partition.into(), url: url.into() }
  }

  /// The natural key, `partition:url`.
  pub fn natural_key(&self) -> String { self.to_string() }
}

impl fmt::Display for DocumentId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}:{}", self.partition, self.url)
  }
}

/// The canonical record of a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
  #[serde(flatten)]
  pub id:              DocumentId,
  pub title:           String,
  pub text:            String,
  pub summary:         String,
  /// Written on first insert only; later upserts leave it untouched.
  pub created_at:      DateTime<Utc>,
  pub last_updated_at: DateTime<Utc>,
}

impl Document {
  /// A document stamped with the current time for both timestamps.
  pub fn new(
    id: DocumentId,
    title: impl Into<String>,
    text: impl Into<String>,
    summary: impl Into<String>,
  ) -> Self {
    let now = Utc::now();
    Self {
      id,
      title: title.into(),
      text: text.into(),
      summary: summary.into(),
      created_at: now,
      last_updated_at: now,
    }
  }
}

/// One positioned slice of a document's text and its embedding.
///
/// Chunks are addressed by their index in the slice passed to
/// [`DocumentStore::put`](crate::store::DocumentStore::put).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
  pub text:      String,
  pub embedding: Vec<f32>,
}

impl Chunk {
  pub fn new(text: impl Into<String>, embedding: Vec<f32>) -> Self {
    Self { text: text.into(), embedding }
  }
}

/// Engine-assigned surrogate id joining the three projections of a document.
///
/// Stable across upserts of the same [`DocumentId`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RowId(pub i64);

impl RowId {
  pub fn get(self) -> i64 { self.0 }
}

impl fmt::Display for RowId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { self.0.fmt(f) }
}
