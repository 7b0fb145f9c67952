//! SQL shared by the SQLite-family backends.
//!
//! Every statement uses positional `?` parameters; the comment above each
//! lists their order.

use crate::distance::DistanceMetric;

// ─── put ─────────────────────────────────────────────────────────────────────

/// id, partition, url, title, summary, created_at, last_updated_at.
///
/// The update arm only fires when the existing row carries the same
/// partition and url, so a natural-key collision between two different
/// `(partition, url)` pairs never rewrites another tenant's row.
pub const UPSERT_DOCUMENT: &str = "INSERT INTO document
     (id, partition, url, title, summary, created_at, last_updated_at)
   VALUES (?, ?, ?, ?, ?, ?, ?)
   ON CONFLICT(id) DO UPDATE SET
     title           = excluded.title,
     summary         = excluded.summary,
     last_updated_at = excluded.last_updated_at
   WHERE document.partition = excluded.partition
     AND document.url       = excluded.url";

/// partition, url.
pub const SELECT_ROW_ID: &str = "SELECT row_id FROM document WHERE partition = ? AND url = ?";

/// document_rowid, partition, idx, text, embedding.
pub const UPSERT_CHUNK: &str = "INSERT INTO document_chunk
     (document_rowid, partition, idx, text, embedding)
   VALUES (?, ?, ?, ?, ?)
   ON CONFLICT(document_rowid, idx) DO UPDATE SET
     partition = excluded.partition,
     text      = excluded.text,
     embedding = excluded.embedding";

/// document_rowid, chunk count.
pub const TRIM_CHUNKS: &str = "DELETE FROM document_chunk WHERE document_rowid = ? AND idx >= ?";

/// rowid.
pub const DELETE_FTS_ROW: &str = "DELETE FROM document_fts WHERE rowid = ?";

/// rowid, partition, url, title, text, summary.
pub const INSERT_FTS_ROW: &str = "INSERT INTO document_fts
     (rowid, partition, url, title, text, summary)
   VALUES (?, ?, ?, ?, ?, ?)";

// ─── delete ──────────────────────────────────────────────────────────────────

/// Chunks, then full-text row, then the canonical row; each takes
/// partition, url.
pub const DELETE_DOCUMENT: [&str; 3] = [
  "DELETE FROM document_chunk WHERE document_rowid IN
     (SELECT row_id FROM document WHERE partition = ? AND url = ?)",
  "DELETE FROM document_fts WHERE rowid IN
     (SELECT row_id FROM document WHERE partition = ? AND url = ?)",
  "DELETE FROM document WHERE partition = ? AND url = ?",
];

// ─── reads ───────────────────────────────────────────────────────────────────

/// partition, url.
pub const GET_DOCUMENT: &str = "SELECT d.partition, d.url, d.title, f.text, d.summary,
          d.created_at, d.last_updated_at
   FROM document d
   JOIN document_fts f ON f.rowid = d.row_id
   WHERE d.partition = ? AND d.url = ?";

/// Query embedding, partition, limit.
///
/// Flat scan of the partition's chunks scored by the metric's scalar
/// function; exact ties fall back to row id then chunk index.
pub fn nearest(metric: DistanceMetric) -> String {
  format!(
    "SELECT c.document_rowid, c.partition, c.idx, c.text, c.embedding,
            {distance}(c.embedding, ?) AS distance,
            d.url, d.title, d.summary
     FROM document_chunk c
     JOIN document d ON d.row_id = c.document_rowid
     WHERE c.partition = ? AND d.partition = c.partition
     ORDER BY distance ASC, c.document_rowid ASC, c.idx ASC
     LIMIT ?",
    distance = metric.sql_function(),
  )
}

/// Match expression, partition, limit.
pub const SEARCH: &str = "SELECT rowid, url, title, summary, bm25(document_fts) AS score
   FROM document_fts
   WHERE document_fts MATCH ? AND partition = ?
   ORDER BY score ASC, rowid ASC
   LIMIT ?";
