//! Decoding rqlite result rows into domain values.
//!
//! Column positions follow the statements in [`ragstore_core::sql`].

use ragstore_core::{
  Document, DocumentId, NearestMatch, RowId, TextMatch,
  codec::{decode_dt, decode_embedding},
};

use crate::{Result, client::Row};

/// A row of [`ragstore_core::sql::GET_DOCUMENT`].
pub fn document(row: Row<'_>) -> Result<Document> {
  Ok(Document {
    id:              DocumentId::new(row.text(0)?, row.text(1)?),
    title:           row.text(2)?,
    text:            row.text(3)?,
    summary:         row.text(4)?,
    created_at:      decode_dt(&row.text(5)?)?,
    last_updated_at: decode_dt(&row.text(6)?)?,
  })
}

/// A row of [`ragstore_core::sql::nearest`].
pub fn nearest_match(row: Row<'_>) -> Result<NearestMatch> {
  Ok(NearestMatch {
    row_id:    RowId(row.int(0)?),
    partition: row.text(1)?,
    idx:       row.int(2)? as usize,
    text:      row.text(3)?,
    embedding: decode_embedding(&row.text(4)?)?,
    distance:  row.float(5)?,
    url:       row.text(6)?,
    title:     row.text(7)?,
    summary:   row.text(8)?,
  })
}

/// A row of [`ragstore_core::sql::SEARCH`].
pub fn text_match(row: Row<'_>) -> Result<TextMatch> {
  Ok(TextMatch {
    row_id:  RowId(row.int(0)?),
    url:     row.text(1)?,
    title:   row.text(2)?,
    summary: row.text(3)?,
    rank:    row.float(4)?,
  })
}
