//! Request-shape and decoding tests for `RqliteStore` against a mock rqlite
//! HTTP API.

use std::time::Duration;

use chrono::{TimeZone, Utc};
use ragstore_core::{
  Cancel, Chunk, Document, DocumentId, DocumentStore, Error, NearestQuery, RowId, StoreOptions,
  TextQuery, sql,
};
use serde_json::{Value, json};
use wiremock::{
  Mock, MockServer, Request, Respond, ResponseTemplate,
  matchers::{basic_auth, method, path, query_param},
};

use crate::{ClientOptions, ReadConsistency, RqliteMigrationTarget, RqliteStore, RqliteUrl};

const DIMS: usize = 2;

/// Answers `/db/execute` with one successful result per statement sent.
struct ExecuteOk;

impl Respond for ExecuteOk {
  fn respond(&self, request: &Request) -> ResponseTemplate {
    let statements: Vec<Value> = request.body_json().unwrap_or_default();
    let results: Vec<Value> = statements
      .iter()
      .map(|_| json!({ "last_insert_id": 7, "rows_affected": 1 }))
      .collect();
    ResponseTemplate::new(200).set_body_json(json!({ "results": results }))
  }
}

fn rows(columns: &[&str], values: Value) -> ResponseTemplate {
  ResponseTemplate::new(200)
    .set_body_json(json!({ "results": [{ "columns": columns, "values": values }] }))
}

async fn mock_execute(server: &MockServer) {
  Mock::given(method("POST"))
    .and(path("/db/execute"))
    .respond_with(ExecuteOk)
    .mount(server)
    .await;
}

async fn mock_query(server: &MockServer, response: ResponseTemplate) {
  Mock::given(method("POST"))
    .and(path("/db/query"))
    .respond_with(response)
    .mount(server)
    .await;
}

fn store_with(server: &MockServer, client_options: ClientOptions) -> RqliteStore {
  let url = RqliteUrl::parse(&server.uri()).expect("mock url");
  RqliteStore::connect(&url, StoreOptions::new(DIMS), client_options).expect("store")
}

fn store(server: &MockServer) -> RqliteStore { store_with(server, ClientOptions::default()) }

fn doc() -> Document {
  let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
  Document {
    id:              DocumentId::new("p", "https://example.com/a"),
    title:           "Alpha".into(),
    text:            "Alpha body.".into(),
    summary:         "About alpha.".into(),
    created_at:      at,
    last_updated_at: at,
  }
}

fn chunks() -> Vec<Chunk> {
  vec![Chunk::new("one", vec![1.0, 0.0]), Chunk::new("two", vec![0.0, 1.0])]
}

async fn requests(server: &MockServer) -> Vec<Request> {
  server.received_requests().await.expect("request recording")
}

fn body(request: &Request) -> Vec<Vec<Value>> { request.body_json().expect("statement array") }

// ─── put ─────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn put_upserts_then_writes_one_transaction() {
  let server = MockServer::start().await;
  mock_execute(&server).await;
  mock_query(&server, rows(&["row_id"], json!([[7]]))).await;

  let row_id = store(&server)
    .put(&Cancel::never(), &doc(), &chunks())
    .await
    .unwrap();
  assert_eq!(row_id, RowId(7));

  let reqs = requests(&server).await;
  assert_eq!(reqs.len(), 3);

  // Canonical upsert, outside any transaction.
  assert_eq!(reqs[0].url.path(), "/db/execute");
  assert_eq!(reqs[0].url.query(), None);
  let upsert = body(&reqs[0]);
  assert_eq!(upsert.len(), 1);
  assert_eq!(upsert[0][0], json!(sql::UPSERT_DOCUMENT));
  assert_eq!(upsert[0][1], json!("p:https://example.com/a"));
  assert_eq!(upsert[0][6], json!("2024-01-01T00:00:00Z"));

  // Row id lookup never reads below weak.
  assert_eq!(reqs[1].url.path(), "/db/query");
  assert_eq!(reqs[1].url.query(), Some("level=weak"));
  assert_eq!(json!(body(&reqs[1])[0]), json!([sql::SELECT_ROW_ID, "p", "https://example.com/a"]));

  // Chunks, trim and full-text row in a single transaction.
  assert_eq!(reqs[2].url.query(), Some("transaction"));
  let batch = body(&reqs[2]);
  assert_eq!(batch.len(), 5);
  assert_eq!(json!(batch[0]), json!([sql::UPSERT_CHUNK, 7, "p", 0, "one", "[1.0,0.0]"]));
  assert_eq!(json!(batch[1]), json!([sql::UPSERT_CHUNK, 7, "p", 1, "two", "[0.0,1.0]"]));
  assert_eq!(json!(batch[2]), json!([sql::TRIM_CHUNKS, 7, 2]));
  assert_eq!(json!(batch[3]), json!([sql::DELETE_FTS_ROW, 7]));
  assert_eq!(
    json!(batch[4]),
    json!([sql::INSERT_FTS_ROW, 7, "p", "https://example.com/a", "Alpha", "Alpha body.", "About alpha."])
  );
}

#[tokio::test]
async fn put_with_no_chunks_still_trims_and_indexes() {
  let server = MockServer::start().await;
  mock_execute(&server).await;
  mock_query(&server, rows(&["row_id"], json!([[3]]))).await;

  store(&server).put(&Cancel::never(), &doc(), &[]).await.unwrap();

  let batch = body(&requests(&server).await[2]);
  assert_eq!(batch.len(), 3);
  assert_eq!(json!(batch[0]), json!([sql::TRIM_CHUNKS, 3, 0]));
}

#[tokio::test]
async fn put_without_resolved_row_is_upsert_failed() {
  let server = MockServer::start().await;
  mock_execute(&server).await;
  mock_query(&server, rows(&["row_id"], json!([]))).await;

  let err = store(&server)
    .put(&Cancel::never(), &doc(), &chunks())
    .await
    .unwrap_err();
  assert!(matches!(err, Error::UpsertFailed(ref id) if *id == doc().id), "{err}");
  // No chunk batch after a failed upsert.
  assert_eq!(requests(&server).await.len(), 2);
}

#[tokio::test]
async fn failed_batch_statement_is_write_failed() {
  let server = MockServer::start().await;
  mock_query(&server, rows(&["row_id"], json!([[7]]))).await;
  Mock::given(method("POST"))
    .and(path("/db/execute"))
    .and(query_param("transaction", ""))
    .respond_with(
      ResponseTemplate::new(200)
        .set_body_json(json!({ "results": [{ "error": "no such table: document_chunk" }] })),
    )
    .mount(&server)
    .await;
  mock_execute(&server).await;

  let err = store(&server)
    .put(&Cancel::never(), &doc(), &chunks())
    .await
    .unwrap_err();
  match err {
    Error::WriteFailed { op, source, .. } => {
      assert_eq!(op, "write chunks");
      let engine = source.downcast_ref::<crate::Error>().expect("engine error");
      assert!(matches!(engine, crate::Error::Statement { index: 0, .. }), "{engine}");
    }
    other => panic!("expected WriteFailed, got {other:?}"),
  }
}

#[tokio::test]
async fn put_checks_dimensions_before_any_request() {
  let server = MockServer::start().await;
  mock_execute(&server).await;

  let err = store(&server)
    .put(&Cancel::never(), &doc(), &[Chunk::new("bad", vec![1.0, 2.0, 3.0])])
    .await
    .unwrap_err();
  assert!(matches!(err, Error::DimensionMismatch { expected: 2, actual: 3 }));
  assert!(requests(&server).await.is_empty());
}

#[tokio::test]
async fn put_rejects_non_finite_components_before_any_request() {
  let server = MockServer::start().await;
  mock_execute(&server).await;

  let err = store(&server)
    .put(&Cancel::never(), &doc(), &[Chunk::new("bad", vec![0.5, f32::NAN])])
    .await
    .unwrap_err();
  assert!(matches!(err, Error::NonFiniteEmbedding { position: 1 }), "{err}");
  assert!(requests(&server).await.is_empty());
}

#[tokio::test]
async fn cancelled_put_sends_nothing() {
  let server = MockServer::start().await;
  mock_execute(&server).await;
  let (handle, cancel) = Cancel::pair();
  handle.cancel();

  let err = store(&server).put(&cancel, &doc(), &chunks()).await.unwrap_err();
  assert!(err.is_cancelled());
  assert!(requests(&server).await.is_empty());
}

// ─── delete ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn delete_is_one_transaction() {
  let server = MockServer::start().await;
  mock_execute(&server).await;

  store(&server).delete(&Cancel::never(), &doc().id).await.unwrap();

  let reqs = requests(&server).await;
  assert_eq!(reqs.len(), 1);
  assert_eq!(reqs[0].url.query(), Some("transaction"));
  let batch = body(&reqs[0]);
  let expected: Vec<Vec<Value>> = sql::DELETE_DOCUMENT
    .iter()
    .map(|s| vec![json!(s), json!("p"), json!("https://example.com/a")])
    .collect();
  assert_eq!(batch, expected);
}

#[tokio::test]
async fn delete_of_missing_document_succeeds() {
  let server = MockServer::start().await;
  Mock::given(method("POST"))
    .and(path("/db/execute"))
    .and(query_param("transaction", ""))
    .respond_with(ResponseTemplate::new(200).set_body_json(json!({
      "results": [{ "rows_affected": 0 }, { "rows_affected": 0 }, { "rows_affected": 0 }]
    })))
    .mount(&server)
    .await;

  let missing = DocumentId::new("p", "https://example.com/never-stored");
  store(&server).delete(&Cancel::never(), &missing).await.unwrap();
  // A retry is just as quiet.
  store(&server).delete(&Cancel::never(), &missing).await.unwrap();
  assert_eq!(requests(&server).await.len(), 2);
}

// ─── reads ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn get_decodes_joined_row() {
  let server = MockServer::start().await;
  mock_query(
    &server,
    rows(
      &["partition", "url", "title", "text", "summary", "created_at", "last_updated_at"],
      json!([[
        "p",
        "https://example.com/a",
        "Alpha",
        "Alpha body.",
        "About alpha.",
        "2024-01-01T00:00:00Z",
        "2024-01-01T01:00:00.5Z"
      ]]),
    ),
  )
  .await;

  let got = store(&server)
    .get(&Cancel::never(), &doc().id)
    .await
    .unwrap()
    .expect("document");
  assert_eq!(got.id, doc().id);
  assert_eq!(got.text, "Alpha body.");
  assert_eq!(got.created_at, doc().created_at);
  assert_eq!(
    got.last_updated_at,
    Utc.with_ymd_and_hms(2024, 1, 1, 1, 0, 0).unwrap() + chrono::Duration::milliseconds(500)
  );
}

#[tokio::test]
async fn get_missing_is_none() {
  let server = MockServer::start().await;
  // rqlite omits `values` when nothing matched.
  mock_query(
    &server,
    ResponseTemplate::new(200).set_body_json(json!({ "results": [{ "columns": ["partition"] }] })),
  )
  .await;

  let got = store(&server).get(&Cancel::never(), &doc().id).await.unwrap();
  assert!(got.is_none());
}

#[tokio::test]
async fn get_is_scoped_to_the_requested_partition() {
  let server = MockServer::start().await;
  mock_query(&server, rows(&["partition"], json!([]))).await;

  let other = DocumentId::new("q", "https://example.com/a");
  assert!(store(&server).get(&Cancel::never(), &other).await.unwrap().is_none());

  let sent = body(&requests(&server).await[0]);
  assert_eq!(json!(sent[0]), json!([sql::GET_DOCUMENT, "q", "https://example.com/a"]));
}

#[tokio::test]
async fn nearest_sends_metric_sql_at_configured_level() {
  let server = MockServer::start().await;
  Mock::given(method("POST"))
    .and(path("/db/query"))
    .and(query_param("level", "strong"))
    .respond_with(rows(
      &["document_rowid", "partition", "idx", "text", "embedding", "distance", "url", "title", "summary"],
      json!([
        [4, "p", 0, "near", "[1.0,0.0]", 0.0, "https://example.com/b", "Beta", "About beta."],
        [7, "p", 1, "far", "[0.0,1.0]", 1.0, "https://example.com/a", "Alpha", "About alpha."]
      ]),
    ))
    .mount(&server)
    .await;

  let store = store_with(&server, ClientOptions {
    read_consistency: ReadConsistency::Strong,
    ..ClientOptions::default()
  });
  let query = NearestQuery { partition: "p".into(), embedding: vec![1.0, 0.0], limit: 5 };
  let matches = store.nearest(&Cancel::never(), &query).await.unwrap();

  assert_eq!(matches.len(), 2);
  assert_eq!(matches[0].row_id, RowId(4));
  assert_eq!(matches[0].embedding, vec![1.0, 0.0]);
  assert_eq!(matches[0].title, "Beta");
  assert_eq!(matches[1].idx, 1);
  assert_eq!(matches[1].distance, 1.0);

  let sent = body(&requests(&server).await[0]);
  let sql = sent[0][0].as_str().unwrap();
  assert!(sql.contains("vec_distance_cosine"), "{sql}");
  assert_eq!(&sent[0][1..], &[json!("[1.0,0.0]"), json!("p"), json!(5)]);
}

#[tokio::test]
async fn nearest_rejects_bad_queries_locally() {
  let server = MockServer::start().await;
  let store = store(&server);

  let wrong = NearestQuery { partition: "p".into(), embedding: vec![1.0], limit: 5 };
  let err = store.nearest(&Cancel::never(), &wrong).await.unwrap_err();
  assert!(matches!(err, Error::DimensionMismatch { expected: 2, actual: 1 }));

  let zero = NearestQuery { partition: "p".into(), embedding: vec![1.0, 0.0], limit: 0 };
  let err = store.nearest(&Cancel::never(), &zero).await.unwrap_err();
  assert!(matches!(err, Error::InvalidLimit));

  assert!(requests(&server).await.is_empty());
}

#[tokio::test]
async fn search_sends_match_partition_and_limit() {
  let server = MockServer::start().await;
  Mock::given(method("POST"))
    .and(path("/db/query"))
    .and(query_param("level", "weak"))
    .respond_with(rows(
      &["rowid", "url", "title", "summary", "score"],
      json!([
        [7, "https://example.com/a", "Alpha", "About alpha.", -2.5],
        [4, "https://example.com/b", "Beta", "About beta.", -1]
      ]),
    ))
    .mount(&server)
    .await;

  let query = TextQuery { partition: "p".into(), query: "alpha OR beta".into(), limit: 10 };
  let matches = store(&server).search(&Cancel::never(), &query).await.unwrap();

  assert_eq!(matches.len(), 2);
  assert_eq!(matches[0].row_id, RowId(7));
  assert_eq!(matches[0].title, "Alpha");
  assert_eq!(matches[0].rank, -2.5);
  assert_eq!(matches[1].url, "https://example.com/b");
  assert_eq!(matches[1].rank, -1.0);

  let sent = body(&requests(&server).await[0]);
  assert_eq!(json!(sent[0]), json!([sql::SEARCH, "alpha OR beta", "p", 10]));
}

#[tokio::test]
async fn search_rejects_zero_limit_locally() {
  let server = MockServer::start().await;
  let query = TextQuery { partition: "p".into(), query: "alpha".into(), limit: 0 };
  let err = store(&server).search(&Cancel::never(), &query).await.unwrap_err();
  assert!(matches!(err, Error::InvalidLimit));
  assert!(requests(&server).await.is_empty());
}

#[tokio::test]
async fn search_statement_error_is_query_failed() {
  let server = MockServer::start().await;
  mock_query(
    &server,
    ResponseTemplate::new(200)
      .set_body_json(json!({ "results": [{ "error": "fts5: syntax error near \"(\"" }] })),
  )
  .await;

  let query = TextQuery { partition: "p".into(), query: "(".into(), limit: 3 };
  let err = store(&server).search(&Cancel::never(), &query).await.unwrap_err();
  assert!(matches!(err, Error::QueryFailed { op: "search", .. }), "{err}");
}

#[tokio::test]
async fn http_status_is_query_failed_without_credentials() {
  let server = MockServer::start().await;
  mock_query(&server, ResponseTemplate::new(401).set_body_string("unauthorized")).await;

  let url = RqliteUrl::parse(&format!("http://admin:secret@{}", server.address())).unwrap();
  let store = RqliteStore::connect(&url, StoreOptions::new(DIMS), ClientOptions::default()).unwrap();
  let err = store.get(&Cancel::never(), &doc().id).await.unwrap_err();

  match &err {
    Error::QueryFailed { op, source, .. } => {
      assert_eq!(*op, "get document");
      let engine = source.downcast_ref::<crate::Error>().expect("engine error");
      assert!(matches!(engine, crate::Error::Status { status: 401, .. }), "{engine}");
    }
    other => panic!("expected QueryFailed, got {other:?}"),
  }
  assert!(!format!("{err} {err:?}").contains("secret"));
}

#[tokio::test]
async fn credentials_travel_as_basic_auth() {
  let server = MockServer::start().await;
  Mock::given(method("POST"))
    .and(path("/db/query"))
    .and(basic_auth("admin", "p@ss"))
    .respond_with(rows(&["partition"], json!([])))
    .mount(&server)
    .await;

  let url = RqliteUrl::parse(&format!("http://admin:p%40ss@{}", server.address())).unwrap();
  let store = RqliteStore::connect(&url, StoreOptions::new(DIMS), ClientOptions::default()).unwrap();
  assert!(store.get(&Cancel::never(), &doc().id).await.unwrap().is_none());

  let reqs = requests(&server).await;
  assert_eq!(reqs[0].url.username(), "");
}

// ─── migrations ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn migrate_applies_each_pending_version_atomically() {
  let server = MockServer::start().await;
  mock_execute(&server).await;
  mock_query(&server, rows(&["version"], json!([[0]]))).await;

  let url = RqliteUrl::parse(&server.uri()).unwrap();
  let version = RqliteMigrationTarget::migrate(&url, Duration::from_secs(5)).await.unwrap();
  assert_eq!(version, 2);

  let reqs = requests(&server).await;
  // The version read is always strongly consistent.
  assert!(
    reqs
      .iter()
      .filter(|r| r.url.path() == "/db/query")
      .all(|r| r.url.query() == Some("level=strong"))
  );

  let applied: Vec<Vec<Vec<Value>>> = reqs
    .iter()
    .filter(|r| r.url.query() == Some("transaction"))
    .map(body)
    .collect();
  assert_eq!(applied.len(), 2);
  for (version, batch) in (1..).zip(&applied) {
    let marker = batch.last().unwrap();
    assert_eq!(marker[0], json!(ragstore_core::migrate::RECORD_VERSION_SQL));
    assert_eq!(marker[1], json!(version));
  }
  assert!(applied[1].iter().any(|s| s[0].as_str().unwrap().contains("fts5")));
}

#[tokio::test]
async fn migrate_is_a_no_op_when_current() {
  let server = MockServer::start().await;
  mock_execute(&server).await;
  mock_query(&server, rows(&["version"], json!([[2]]))).await;

  let url = RqliteUrl::parse(&server.uri()).unwrap();
  let version = RqliteMigrationTarget::migrate(&url, Duration::from_secs(5)).await.unwrap();
  assert_eq!(version, 2);

  let reqs = requests(&server).await;
  assert!(reqs.iter().all(|r| r.url.query() != Some("transaction")));
}

#[tokio::test]
async fn failed_migration_reports_its_version() {
  let server = MockServer::start().await;
  mock_query(&server, rows(&["version"], json!([[1]]))).await;
  Mock::given(method("POST"))
    .and(path("/db/execute"))
    .and(query_param("transaction", ""))
    .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "error": "no such module: fts5" })))
    .mount(&server)
    .await;
  mock_execute(&server).await;

  let url = RqliteUrl::parse(&server.uri()).unwrap();
  let err = RqliteMigrationTarget::migrate(&url, Duration::from_secs(5)).await.unwrap_err();
  assert!(matches!(err, Error::MigrationFailed { version: 2, .. }), "{err}");
}
