//! Core types and trait definitions for the ragstore document store.
//!
//! A document is persisted as three projections sharing one surrogate row id:
//! the canonical `document` row, its ordered `document_chunk` embedding rows,
//! and a `document_fts` full-text row. Storage backends implement
//! [`DocumentStore`]; this crate carries no database or HTTP dependency.

// Native `async fn` in traits; the trait spells out `Send` futures itself.
#![allow(async_fn_in_trait)]

pub mod cancel;
pub mod codec;
pub mod distance;
pub mod document;
pub mod error;
pub mod migrate;
pub mod sql;
pub mod store;

pub use cancel::{Cancel, CancelHandle};
pub use distance::{DistanceMetric, StoreOptions};
pub use document::{Chunk, Document, DocumentId, RowId};
pub use error::{BoxError, Error, Result};
pub use migrate::{Migration, MigrationTarget, Migrator};
pub use store::{DocumentStore, NearestMatch, NearestQuery, TextMatch, TextQuery};
