//! Column encodings shared by every backend.
//!
//! Embeddings are stored as compact JSON arrays of floats, the text form the
//! sqlite-vec scalar functions accept. Timestamps are RFC 3339 strings.

use chrono::{DateTime, SecondsFormat, Utc};

pub fn encode_embedding(embedding: &[f32]) -> serde_json::Result<String> {
  serde_json::to_string(embedding)
}

pub fn decode_embedding(s: &str) -> serde_json::Result<Vec<f32>> { serde_json::from_str(s) }

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339_opts(SecondsFormat::AutoSi, true) }

pub fn decode_dt(s: &str) -> chrono::ParseResult<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s).map(|dt| dt.with_timezone(&Utc))
}
