//! Raw row types read straight out of SQLite and their decoding into
//! domain values.

use ragstore_core::{
  Document, DocumentId, NearestMatch, RowId, TextMatch,
  codec::{decode_dt, decode_embedding},
};

use crate::Result;

/// Columns of [`ragstore_core::sql::GET_DOCUMENT`].
pub struct RawDocument {
  pub partition:       String,
  pub url:             String,
  pub title:           String,
  pub text:            String,
  pub summary:         String,
  pub created_at:      String,
  pub last_updated_at: String,
}

impl RawDocument {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      partition:       row.get(0)?,
      url:             row.get(1)?,
      title:           row.get(2)?,
      text:            row.get(3)?,
      summary:         row.get(4)?,
      created_at:      row.get(5)?,
      last_updated_at: row.get(6)?,
    })
  }

  pub fn into_document(self) -> Result<Document> {
    Ok(Document {
      id:              DocumentId::new(self.partition, self.url),
      title:           self.title,
      text:            self.text,
      summary:         self.summary,
      created_at:      decode_dt(&self.created_at)?,
      last_updated_at: decode_dt(&self.last_updated_at)?,
    })
  }
}

/// Columns of [`ragstore_core::sql::nearest`].
pub struct RawNearest {
  pub row_id:    i64,
  pub partition: String,
  pub idx:       i64,
  pub text:      String,
  pub embedding: String,
  pub distance:  f64,
  pub url:       String,
  pub title:     String,
  pub summary:   String,
}

impl RawNearest {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      row_id:    row.get(0)?,
      partition: row.get(1)?,
      idx:       row.get(2)?,
      text:      row.get(3)?,
      embedding: row.get(4)?,
      distance:  row.get(5)?,
      url:       row.get(6)?,
      title:     row.get(7)?,
      summary:   row.get(8)?,
    })
  }

  pub fn into_match(self) -> Result<NearestMatch> {
    Ok(NearestMatch {
      row_id:    RowId(self.row_id),
      partition: self.partition,
      idx:       self.idx as usize,
      text:      self.text,
      embedding: decode_embedding(&self.embedding)?,
      distance:  self.distance,
      url:       self.url,
      title:     self.title,
      summary:   self.summary,
    })
  }
}

/// Columns of [`ragstore_core::sql::SEARCH`].
pub fn text_match_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<TextMatch> {
  Ok(TextMatch {
    row_id:  RowId(row.get(0)?),
    url:     row.get(1)?,
    title:   row.get(2)?,
    summary: row.get(3)?,
    rank:    row.get(4)?,
  })
}
