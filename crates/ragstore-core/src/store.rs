//! The `DocumentStore` trait and its query and result types.
//!
//! Implemented by storage backends (`ragstore-sqlite`, `ragstore-rqlite`).
//! Callers (an HTTP layer, an importer) depend on this abstraction and hand
//! it chunk texts and embeddings they computed themselves.

use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::{
  Error, Result,
  cancel::Cancel,
  document::{Chunk, Document, DocumentId, RowId},
};

// ─── Query types ─────────────────────────────────────────────────────────────

/// Parameters for [`DocumentStore::nearest`].
#[derive(Debug, Clone, PartialEq)]
pub struct NearestQuery {
  pub partition: String,
  pub embedding: Vec<f32>,
  /// Maximum number of chunks returned. Must be positive.
  pub limit:     usize,
}

/// Parameters for [`DocumentStore::search`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextQuery {
  pub partition: String,
  /// An FTS5 match expression.
  pub query:     String,
  pub limit:     usize,
}

/// Reject a zero limit before any round trip is made.
pub fn check_limit(limit: usize) -> Result<()> {
  if limit == 0 { Err(Error::InvalidLimit) } else { Ok(()) }
}

// ─── Result types ────────────────────────────────────────────────────────────

/// A chunk returned by [`DocumentStore::nearest`], joined to its document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NearestMatch {
  pub row_id:    RowId,
  pub partition: String,
  pub idx:       usize,
  pub text:      String,
  pub embedding: Vec<f32>,
  pub distance:  f64,
  pub url:       String,
  pub title:     String,
  pub summary:   String,
}

/// A document returned by [`DocumentStore::search`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextMatch {
  pub row_id:  RowId,
  pub url:     String,
  pub title:   String,
  pub summary: String,
  /// bm25 rank; lower is better.
  pub rank:    f64,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// A partition-scoped document store keeping three projections in step.
///
/// There is no in-process locking: consistency between concurrent writers is
/// the engine's job, and every backend sends the chunk and full-text writes of
/// a `put` as a single all-or-nothing batch.
///
/// All methods return `Send` futures so the trait can be used from
/// multi-threaded runtimes.
pub trait DocumentStore: Send + Sync {
  /// Upsert `document` and replace its chunks and full-text row.
  ///
  /// Returns the document's surrogate id, identical across upserts of the
  /// same [`DocumentId`]. Chunk rows beyond `chunks.len()` left over from a
  /// longer earlier version are removed.
  fn put<'a>(
    &'a self,
    cancel: &'a Cancel,
    document: &'a Document,
    chunks: &'a [Chunk],
  ) -> impl Future<Output = Result<RowId>> + Send + 'a;

  /// Remove every projection of `id`. Deleting an absent document succeeds.
  fn delete<'a>(
    &'a self,
    cancel: &'a Cancel,
    id: &'a DocumentId,
  ) -> impl Future<Output = Result<()>> + Send + 'a;

  /// Fetch a document with its current text. `None` if it does not exist in
  /// `id.partition`.
  fn get<'a>(
    &'a self,
    cancel: &'a Cancel,
    id: &'a DocumentId,
  ) -> impl Future<Output = Result<Option<Document>>> + Send + 'a;

  /// The `limit` chunks of `query.partition` closest to `query.embedding`,
  /// nearest first. Exact ties are broken by ascending row id, then index.
  fn nearest<'a>(
    &'a self,
    cancel: &'a Cancel,
    query: &'a NearestQuery,
  ) -> impl Future<Output = Result<Vec<NearestMatch>>> + Send + 'a;

  /// Full-text search over the documents of `query.partition`, best first.
  fn search<'a>(
    &'a self,
    cancel: &'a Cancel,
    query: &'a TextQuery,
  ) -> impl Future<Output = Result<Vec<TextMatch>>> + Send + 'a;
}
