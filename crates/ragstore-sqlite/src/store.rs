//! [`SqliteStore`]: the embedded SQLite implementation of [`DocumentStore`].

use std::path::Path;

use rusqlite::OptionalExtension as _;

use ragstore_core::{
  Cancel, Chunk, Document, DocumentId, DocumentStore, Migrator, NearestMatch, NearestQuery, RowId,
  StoreOptions, TextMatch, TextQuery,
  codec::{encode_dt, encode_embedding},
  sql,
  store::check_limit,
};

use crate::{
  SqliteConfig,
  encode::{RawDocument, RawNearest, text_match_from_row},
  error::{query_failed, write_failed},
  functions,
};

type StoreResult<T> = ragstore_core::Result<T>;

/// Connection-level settings applied before migrations run.
const PRAGMAS: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;
";

// ─── Store ───────────────────────────────────────────────────────────────────

/// A document store backed by a single SQLite database.
///
/// Cloning is cheap; the inner connection is reference-counted. All calls
/// are serialised on the connection's thread, and each write batch runs in
/// its own transaction.
#[derive(Clone)]
pub struct SqliteStore {
  pub(crate) conn: tokio_rusqlite::Connection,
  options:         StoreOptions,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and apply pending migrations.
  pub async fn open(path: impl AsRef<Path>, options: StoreOptions) -> StoreResult<Self> {
    let target = path.as_ref().display().to_string();
    let conn = tokio_rusqlite::Connection::open(path)
      .await
      .map_err(|e| ragstore_core::Error::Open { target, source: e.into() })?;
    Self::init(conn, options).await
  }

  /// Open a private in-memory store.
  pub async fn open_in_memory(options: StoreOptions) -> StoreResult<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory()
      .await
      .map_err(|e| ragstore_core::Error::Open { target: ":memory:".into(), source: e.into() })?;
    Self::init(conn, options).await
  }

  pub async fn from_config(config: &SqliteConfig) -> StoreResult<Self> {
    Self::open(&config.path, config.options()).await
  }

  async fn init(conn: tokio_rusqlite::Connection, options: StoreOptions) -> StoreResult<Self> {
    conn
      .call(|conn| {
        conn.execute_batch(PRAGMAS)?;
        functions::register(conn)?;
        Ok(())
      })
      .await
      .map_err(|e| ragstore_core::Error::Open { target: "sqlite".into(), source: e.into() })?;

    let store = Self { conn, options };
    store.migrate().await?;
    Ok(store)
  }

  /// Apply any embedded migrations the database has not seen yet.
  ///
  /// Returns the resulting schema version.
  pub async fn migrate(&self) -> StoreResult<u32> { Migrator::default().run(self).await }

  pub fn options(&self) -> StoreOptions { self.options }

  /// Upsert the canonical row on its natural key and resolve its row id.
  async fn upsert_row_id(&self, document: &Document) -> StoreResult<RowId> {
    let natural_key = document.id.natural_key();
    let partition = document.id.partition.clone();
    let url = document.id.url.clone();
    let title = document.title.clone();
    let summary = document.summary.clone();
    let created_at = encode_dt(document.created_at);
    let last_updated_at = encode_dt(document.last_updated_at);

    let row_id: Option<i64> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute(
          sql::UPSERT_DOCUMENT,
          rusqlite::params![
            natural_key,
            partition,
            url,
            title,
            summary,
            created_at,
            last_updated_at,
          ],
        )?;
        let row_id = tx
          .query_row(sql::SELECT_ROW_ID, rusqlite::params![partition, url], |row| row.get(0))
          .optional()?;
        tx.commit()?;
        Ok(row_id)
      })
      .await
      .map_err(write_failed("upsert document", &document.id))?;

    match row_id {
      Some(id) if id != 0 => Ok(RowId(id)),
      _ => Err(ragstore_core::Error::UpsertFailed(document.id.clone())),
    }
  }

  /// Replace a document's chunks and full-text row in one transaction. Chunks
  /// past the new count are trimmed.
  async fn replace_projections(
    &self,
    row_id: RowId,
    document: &Document,
    chunks: Vec<(String, String)>,
  ) -> StoreResult<()> {
    let id = row_id.get();
    let partition = document.id.partition.clone();
    let url = document.id.url.clone();
    let title = document.title.clone();
    let text = document.text.clone();
    let summary = document.summary.clone();

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        {
          let mut upsert = tx.prepare_cached(sql::UPSERT_CHUNK)?;
          for (idx, (chunk_text, embedding)) in chunks.iter().enumerate() {
            upsert.execute(rusqlite::params![id, partition, idx as i64, chunk_text, embedding])?;
          }
        }
        tx.execute(sql::TRIM_CHUNKS, rusqlite::params![id, chunks.len() as i64])?;
        tx.execute(sql::DELETE_FTS_ROW, rusqlite::params![id])?;
        tx.execute(
          sql::INSERT_FTS_ROW,
          rusqlite::params![id, partition, url, title, text, summary],
        )?;
        tx.commit()?;
        Ok(())
      })
      .await
      .map_err(write_failed("write chunks", &document.id))
  }
}

// ─── DocumentStore impl ──────────────────────────────────────────────────────

impl DocumentStore for SqliteStore {
  #[tracing::instrument(skip_all, fields(id = %document.id, chunks = chunks.len()))]
  async fn put(&self, cancel: &Cancel, document: &Document, chunks: &[Chunk]) -> StoreResult<RowId> {
    for chunk in chunks {
      self.options.check_embedding(&chunk.embedding)?;
    }
    let encoded = chunks
      .iter()
      .map(|c| encode_embedding(&c.embedding).map(|e| (c.text.clone(), e)))
      .collect::<serde_json::Result<Vec<_>>>()
      .map_err(write_failed("encode chunks", &document.id))?;

    cancel.check()?;
    let row_id = self.upsert_row_id(document).await?;

    // The canonical row alone is harmless to leave behind.
    cancel.check()?;
    self.replace_projections(row_id, document, encoded).await?;

    tracing::debug!(%row_id, "document stored");
    Ok(row_id)
  }

  #[tracing::instrument(skip_all, fields(%id))]
  async fn delete(&self, cancel: &Cancel, id: &DocumentId) -> StoreResult<()> {
    cancel.check()?;

    let partition = id.partition.clone();
    let url = id.url.clone();

    let removed: usize = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let mut removed = 0;
        for statement in sql::DELETE_DOCUMENT {
          removed += tx.execute(statement, rusqlite::params![partition, url])?;
        }
        tx.commit()?;
        Ok(removed)
      })
      .await
      .map_err(write_failed("delete document", id))?;

    tracing::debug!(removed, "document deleted");
    Ok(())
  }

  #[tracing::instrument(skip_all, fields(%id))]
  async fn get(&self, cancel: &Cancel, id: &DocumentId) -> StoreResult<Option<Document>> {
    let partition = id.partition.clone();
    let url = id.url.clone();

    let raw: Option<RawDocument> = cancel
      .run(self.conn.call(move |conn| {
        Ok(
          conn
            .query_row(sql::GET_DOCUMENT, rusqlite::params![partition, url], RawDocument::from_row)
            .optional()?,
        )
      }))
      .await?
      .map_err(query_failed("get document", id))?;

    raw
      .map(RawDocument::into_document)
      .transpose()
      .map_err(query_failed("decode document", id))
  }

  #[tracing::instrument(skip_all, fields(partition = %query.partition, limit = query.limit))]
  async fn nearest(&self, cancel: &Cancel, query: &NearestQuery) -> StoreResult<Vec<NearestMatch>> {
    check_limit(query.limit)?;
    self.options.check_embedding(&query.embedding)?;

    let target = format!("partition={}", query.partition);
    let embedding =
      encode_embedding(&query.embedding).map_err(query_failed("encode query", &target))?;
    let partition = query.partition.clone();
    let limit = i64::try_from(query.limit).unwrap_or(i64::MAX);
    let statement = sql::nearest(self.options.metric);

    let raws: Vec<RawNearest> = cancel
      .run(self.conn.call(move |conn| {
        let mut stmt = conn.prepare_cached(&statement)?;
        let rows = stmt
          .query_map(rusqlite::params![embedding, partition, limit], RawNearest::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      }))
      .await?
      .map_err(query_failed("nearest", &target))?;

    let matches = raws
      .into_iter()
      .map(RawNearest::into_match)
      .collect::<crate::Result<Vec<_>>>()
      .map_err(query_failed("decode chunk", &target))?;

    tracing::debug!(found = matches.len(), "nearest chunks");
    Ok(matches)
  }

  #[tracing::instrument(skip_all, fields(partition = %query.partition, limit = query.limit))]
  async fn search(&self, cancel: &Cancel, query: &TextQuery) -> StoreResult<Vec<TextMatch>> {
    check_limit(query.limit)?;

    let target = format!("partition={}", query.partition);
    let expression = query.query.clone();
    let partition = query.partition.clone();
    let limit = i64::try_from(query.limit).unwrap_or(i64::MAX);

    cancel
      .run(self.conn.call(move |conn| {
        let mut stmt = conn.prepare_cached(sql::SEARCH)?;
        let rows = stmt
          .query_map(rusqlite::params![expression, partition, limit], text_match_from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      }))
      .await?
      .map_err(query_failed("search", &target))
  }
}
