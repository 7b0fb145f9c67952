//! [`RqliteStore`]: the rqlite implementation of [`DocumentStore`].

use ragstore_core::{
  Cancel, Chunk, Document, DocumentId, DocumentStore, NearestMatch, NearestQuery, RowId,
  StoreOptions, TextMatch, TextQuery,
  codec::{encode_dt, encode_embedding},
  sql,
  store::check_limit,
};

use crate::{
  ClientOptions, ReadConsistency, RqliteClient, RqliteConfig, RqliteMigrationTarget, RqliteUrl,
  Statement, encode,
  error::{query_failed, write_failed},
};

type StoreResult<T> = ragstore_core::Result<T>;

/// A document store on an rqlite cluster.
///
/// Cloning is cheap. `put` makes two round trips: the natural-key upsert
/// (followed by a row id lookup), then one transactional batch carrying every
/// chunk and full-text write, so readers never see chunks and text from two
/// different `put`s.
#[derive(Debug, Clone)]
pub struct RqliteStore {
  client:  RqliteClient,
  options: StoreOptions,
}

impl RqliteStore {
  pub fn connect(
    url: &RqliteUrl,
    options: StoreOptions,
    client_options: ClientOptions,
  ) -> StoreResult<Self> {
    let client = RqliteClient::new(url, client_options)
      .map_err(|e| ragstore_core::Error::Open { target: url.redacted(), source: e.into() })?;
    tracing::debug!(endpoint = %client.endpoint(), "rqlite store configured");
    Ok(Self { client, options })
  }

  /// Connect as configured and apply pending migrations first.
  pub async fn from_config(config: &RqliteConfig) -> StoreResult<Self> {
    let url = RqliteUrl::parse(&config.url)?;
    let client_options = config.client_options();
    RqliteMigrationTarget::migrate(&url, client_options.timeout).await?;
    Self::connect(&url, config.options(), client_options)
  }

  pub fn options(&self) -> StoreOptions { self.options }

  /// Upsert the canonical row on its natural key, then look its row id up
  /// by partition and url.
  async fn upsert_row_id(&self, document: &Document) -> StoreResult<RowId> {
    let upsert = Statement::new(sql::UPSERT_DOCUMENT)
      .arg(document.id.natural_key())
      .arg(document.id.partition.as_str())
      .arg(document.id.url.as_str())
      .arg(document.title.as_str())
      .arg(document.summary.as_str())
      .arg(encode_dt(document.created_at))
      .arg(encode_dt(document.last_updated_at));

    self
      .client
      .execute(&[upsert], false)
      .await
      .map_err(write_failed("upsert document", &document.id))?;

    // The row must be visible to the lookup, so never read below `weak`.
    let level = self.client.read_consistency().max(ReadConsistency::Weak);
    let lookup = Statement::new(sql::SELECT_ROW_ID)
      .arg(document.id.partition.as_str())
      .arg(document.id.url.as_str());
    let result = self
      .client
      .query_at(lookup, level)
      .await
      .map_err(write_failed("resolve row id", &document.id))?;

    let row_id = result
      .rows()
      .next()
      .map(|row| row.int(0))
      .transpose()
      .map_err(write_failed("resolve row id", &document.id))?;

    match row_id {
      Some(id) if id != 0 => Ok(RowId(id)),
      _ => Err(ragstore_core::Error::UpsertFailed(document.id.clone())),
    }
  }
}

/// Chunk upserts, the trim of leftover chunks and the full-text swap, sent
/// together as one transaction.
fn projection_batch(
  row_id: RowId,
  document: &Document,
  embeddings: Vec<String>,
  chunks: &[Chunk],
) -> Vec<Statement> {
  let id = row_id.get();
  let partition = document.id.partition.as_str();

  let mut statements: Vec<Statement> = chunks
    .iter()
    .zip(embeddings)
    .enumerate()
    .map(|(idx, (chunk, embedding))| {
      Statement::new(sql::UPSERT_CHUNK)
        .arg(id)
        .arg(partition)
        .arg(idx)
        .arg(chunk.text.as_str())
        .arg(embedding)
    })
    .collect();

  statements.push(Statement::new(sql::TRIM_CHUNKS).arg(id).arg(chunks.len()));
  statements.push(Statement::new(sql::DELETE_FTS_ROW).arg(id));
  statements.push(
    Statement::new(sql::INSERT_FTS_ROW)
      .arg(id)
      .arg(partition)
      .arg(document.id.url.as_str())
      .arg(document.title.as_str())
      .arg(document.text.as_str())
      .arg(document.summary.as_str()),
  );
  statements
}

impl DocumentStore for RqliteStore {
  #[tracing::instrument(skip_all, fields(id = %document.id, chunks = chunks.len()))]
  async fn put(&self, cancel: &Cancel, document: &Document, chunks: &[Chunk]) -> StoreResult<RowId> {
    for chunk in chunks {
      self.options.check_embedding(&chunk.embedding)?;
    }
    let embeddings = chunks
      .iter()
      .map(|c| encode_embedding(&c.embedding))
      .collect::<serde_json::Result<Vec<_>>>()
      .map_err(write_failed("encode chunks", &document.id))?;

    cancel.check()?;
    let row_id = self.upsert_row_id(document).await?;

    // The canonical row alone is harmless to leave behind.
    cancel.check()?;
    let batch = projection_batch(row_id, document, embeddings, chunks);
    self
      .client
      .execute(&batch, true)
      .await
      .map_err(write_failed("write chunks", &document.id))?;

    tracing::debug!(%row_id, "document stored");
    Ok(row_id)
  }

  #[tracing::instrument(skip_all, fields(%id))]
  async fn delete(&self, cancel: &Cancel, id: &DocumentId) -> StoreResult<()> {
    cancel.check()?;

    let statements: Vec<Statement> = sql::DELETE_DOCUMENT
      .iter()
      .map(|s| Statement::new(*s).arg(id.partition.as_str()).arg(id.url.as_str()))
      .collect();

    let results = self
      .client
      .execute(&statements, true)
      .await
      .map_err(write_failed("delete document", id))?;

    let removed: i64 = results.iter().filter_map(|r| r.rows_affected).sum();
    tracing::debug!(removed, "document deleted");
    Ok(())
  }

  #[tracing::instrument(skip_all, fields(%id))]
  async fn get(&self, cancel: &Cancel, id: &DocumentId) -> StoreResult<Option<Document>> {
    let statement = Statement::new(sql::GET_DOCUMENT)
      .arg(id.partition.as_str())
      .arg(id.url.as_str());

    let result = cancel
      .run(self.client.query(statement))
      .await?
      .map_err(query_failed("get document", id))?;

    let document = result
      .rows()
      .next()
      .map(encode::document)
      .transpose()
      .map_err(query_failed("decode document", id))?;
    Ok(document)
  }

  #[tracing::instrument(skip_all, fields(partition = %query.partition, limit = query.limit))]
  async fn nearest(&self, cancel: &Cancel, query: &NearestQuery) -> StoreResult<Vec<NearestMatch>> {
    check_limit(query.limit)?;
    self.options.check_embedding(&query.embedding)?;

    let target = format!("partition={}", query.partition);
    let embedding =
      encode_embedding(&query.embedding).map_err(query_failed("encode query", &target))?;
    let statement = Statement::new(sql::nearest(self.options.metric))
      .arg(embedding)
      .arg(query.partition.as_str())
      .arg(query.limit);

    let result = cancel
      .run(self.client.query(statement))
      .await?
      .map_err(query_failed("nearest", &target))?;

    let matches = result
      .rows()
      .map(encode::nearest_match)
      .collect::<crate::Result<Vec<_>>>()
      .map_err(query_failed("decode chunk", &target))?;

    tracing::debug!(found = matches.len(), "nearest chunks");
    Ok(matches)
  }

  #[tracing::instrument(skip_all, fields(partition = %query.partition, limit = query.limit))]
  async fn search(&self, cancel: &Cancel, query: &TextQuery) -> StoreResult<Vec<TextMatch>> {
    check_limit(query.limit)?;

    let target = format!("partition={}", query.partition);
    let statement = Statement::new(sql::SEARCH)
      .arg(query.query.as_str())
      .arg(query.partition.as_str())
      .arg(query.limit);

    let result = cancel
      .run(self.client.query(statement))
      .await?
      .map_err(query_failed("search", &target))?;

    let matches = result
      .rows()
      .map(encode::text_match)
      .collect::<crate::Result<Vec<_>>>()
      .map_err(query_failed("decode match", &target))?;
    Ok(matches)
  }
}
