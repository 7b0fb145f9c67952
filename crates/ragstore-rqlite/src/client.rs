//! Minimal client for rqlite's HTTP data API.
//!
//! Writes go to `POST /db/execute`, reads to `POST /db/query`; both take a
//! JSON array of parameterised statements of the form `[sql, arg, ...]`.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use crate::{Error, Result, RqliteUrl};

// ─── Options ─────────────────────────────────────────────────────────────────

/// Read consistency requested from the cluster, sent as `level`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadConsistency {
  /// Any node answers from its local copy; may be stale.
  None,
  /// The leader answers from its local copy.
  #[default]
  Weak,
  /// The read goes through the Raft log.
  Strong,
}

impl ReadConsistency {
  fn as_str(self) -> &'static str {
    match self {
      Self::None => "none",
      Self::Weak => "weak",
      Self::Strong => "strong",
    }
  }
}

#[derive(Debug, Clone, Copy)]
pub struct ClientOptions {
  pub timeout:          Duration,
  pub read_consistency: ReadConsistency,
}

impl Default for ClientOptions {
  fn default() -> Self {
    Self { timeout: Duration::from_secs(30), read_consistency: ReadConsistency::default() }
  }
}

// ─── Wire types ──────────────────────────────────────────────────────────────

/// One parameterised statement: the SQL followed by its positional args.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Statement(Vec<Value>);

impl Statement {
  pub fn new(sql: impl Into<String>) -> Self { Self(vec![Value::String(sql.into())]) }

  pub fn arg(mut self, value: impl Into<Value>) -> Self {
    self.0.push(value.into());
    self
  }
}

#[derive(Debug, Deserialize)]
struct Response<T> {
  #[serde(default = "Vec::new")]
  results: Vec<T>,
  #[serde(default)]
  error:   Option<String>,
}

/// Outcome of one statement sent to `/db/execute`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExecuteResult {
  #[serde(default)]
  pub last_insert_id: Option<i64>,
  #[serde(default)]
  pub rows_affected:  Option<i64>,
  #[serde(default)]
  pub error:          Option<String>,
}

/// Rows returned for one statement sent to `/db/query`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QueryResult {
  #[serde(default)]
  pub columns: Vec<String>,
  #[serde(default)]
  pub values:  Vec<Vec<Value>>,
  #[serde(default)]
  pub error:   Option<String>,
}

impl QueryResult {
  pub fn rows(&self) -> impl Iterator<Item = Row<'_>> { self.values.iter().map(|v| Row(v.as_slice())) }
}

/// One row of a [`QueryResult`], accessed by column position.
#[derive(Debug, Clone, Copy)]
pub struct Row<'a>(&'a [Value]);

impl Row<'_> {
  fn value(&self, idx: usize) -> Result<&Value> {
    self.0.get(idx).ok_or_else(|| Error::Decode(format!("missing column {idx}")))
  }

  pub fn text(&self, idx: usize) -> Result<String> {
    match self.value(idx)? {
      Value::String(s) => Ok(s.clone()),
      other => Err(Error::Decode(format!("column {idx}: expected text, got {other}"))),
    }
  }

  pub fn int(&self, idx: usize) -> Result<i64> {
    self
      .value(idx)?
      .as_i64()
      .ok_or_else(|| Error::Decode(format!("column {idx}: expected integer")))
  }

  pub fn float(&self, idx: usize) -> Result<f64> {
    self
      .value(idx)?
      .as_f64()
      .ok_or_else(|| Error::Decode(format!("column {idx}: expected number")))
  }
}

// ─── Client ──────────────────────────────────────────────────────────────────

/// HTTP client for one rqlite cluster.
///
/// Cheap to clone: the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct RqliteClient {
  http:        Client,
  endpoint:    Url,
  credentials: Option<(String, Option<String>)>,
  level:       ReadConsistency,
}

impl std::fmt::Debug for RqliteClient {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("RqliteClient")
      .field("endpoint", &self.endpoint.as_str())
      .field("level", &self.level)
      .finish_non_exhaustive()
  }
}

impl RqliteClient {
  pub fn new(url: &RqliteUrl, options: ClientOptions) -> Result<Self> {
    Self::with_endpoint(url.endpoint()?, url.credentials(), options)
  }

  /// A client for `endpoint`, which must carry no user info.
  pub(crate) fn with_endpoint(
    endpoint: Url,
    credentials: Option<(String, Option<String>)>,
    options: ClientOptions,
  ) -> Result<Self> {
    let http = Client::builder().timeout(options.timeout).build()?;
    Ok(Self { http, endpoint, credentials, level: options.read_consistency })
  }

  pub fn endpoint(&self) -> &Url { &self.endpoint }

  pub fn read_consistency(&self) -> ReadConsistency { self.level }

  fn auth(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
    match &self.credentials {
      Some((user, password)) => req.basic_auth(user, password.as_deref()),
      None => req,
    }
  }

  fn url(&self, path: &str, query: &str) -> Result<Url> {
    let mut url = self.endpoint.join(path)?;
    url.set_query(Some(query));
    Ok(url)
  }

  /// Send write statements. With `transaction`, the cluster applies all or
  /// none of them.
  pub async fn execute(&self, statements: &[Statement], transaction: bool) -> Result<Vec<ExecuteResult>> {
    let url = if transaction {
      self.url("db/execute", "transaction")?
    } else {
      self.endpoint.join("db/execute")?
    };
    let response: Response<ExecuteResult> = self.post(url, statements).await?;

    if response.results.len() != statements.len() {
      // A failed transaction stops at the first error.
      if let Some((index, message)) = first_error(&response.results, |r| r.error.as_deref()) {
        return Err(Error::Statement { index, message });
      }
      return Err(Error::Decode(format!(
        "sent {} statements, got {} results",
        statements.len(),
        response.results.len()
      )));
    }
    if let Some((index, message)) = first_error(&response.results, |r| r.error.as_deref()) {
      return Err(Error::Statement { index, message });
    }
    Ok(response.results)
  }

  /// Run one read statement at the configured consistency level.
  pub async fn query(&self, statement: Statement) -> Result<QueryResult> {
    self.query_at(statement, self.level).await
  }

  /// Run one read statement at `level`.
  pub async fn query_at(&self, statement: Statement, level: ReadConsistency) -> Result<QueryResult> {
    let url = self.url("db/query", &format!("level={}", level.as_str()))?;
    let response: Response<QueryResult> = self.post(url, &[statement]).await?;
    let result = response
      .results
      .into_iter()
      .next()
      .ok_or_else(|| Error::Decode("query returned no result".into()))?;
    if let Some(message) = result.error {
      return Err(Error::Statement { index: 0, message });
    }
    Ok(result)
  }

  async fn post<T: serde::de::DeserializeOwned>(
    &self,
    url: Url,
    statements: &[Statement],
  ) -> Result<Response<T>> {
    let resp = self.auth(self.http.post(url)).json(statements).send().await?;

    let status = resp.status();
    if !status.is_success() {
      let body = resp.text().await.unwrap_or_default();
      return Err(Error::Status { status: status.as_u16(), body });
    }

    let response: Response<T> = resp.json().await?;
    if let Some(message) = response.error {
      return Err(Error::Server(message));
    }
    Ok(response)
  }
}

fn first_error<T>(results: &[T], error: impl Fn(&T) -> Option<&str>) -> Option<(usize, String)> {
  results
    .iter()
    .enumerate()
    .find_map(|(i, r)| error(r).map(|m| (i, m.to_owned())))
}
