//! Embedded SQLite backend for the ragstore document store.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. Vector search is a flat scan scored by
//! SQL scalar functions registered on the connection.

mod config;
mod encode;
mod functions;
mod migrate;
mod store;

pub mod error;

pub use config::SqliteConfig;
pub use error::{Error, Result};
pub use store::SqliteStore;
