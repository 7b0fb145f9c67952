//! Vector distance scalar functions registered on every connection.
//!
//! Named and typed like their sqlite-vec counterparts, so the SQL in
//! [`ragstore_core::sql`] runs unchanged here and on an rqlite cluster with
//! sqlite-vec loaded.

use rusqlite::{
  Connection,
  functions::{Context, FunctionFlags},
};

use ragstore_core::{DistanceMetric, codec::decode_embedding};

pub fn register(conn: &Connection) -> rusqlite::Result<()> {
  for metric in [DistanceMetric::Cosine, DistanceMetric::L2] {
    conn.create_scalar_function(
      metric.sql_function(),
      2,
      FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
      move |ctx| {
        let a = vector_arg(ctx, 0)?;
        let b = vector_arg(ctx, 1)?;
        metric
          .distance(&a, &b)
          .map_err(|e| rusqlite::Error::UserFunctionError(Box::new(e)))
      },
    )?;
  }
  Ok(())
}

/// Decode a JSON float array argument.
fn vector_arg(ctx: &Context<'_>, idx: usize) -> rusqlite::Result<Vec<f32>> {
  let text = ctx
    .get_raw(idx)
    .as_str()
    .map_err(|e| rusqlite::Error::UserFunctionError(Box::new(e)))?;
  decode_embedding(text).map_err(|e| rusqlite::Error::UserFunctionError(Box::new(e)))
}
