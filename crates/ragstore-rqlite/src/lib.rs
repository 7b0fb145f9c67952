//! rqlite backend for the ragstore document store.
//!
//! Talks to an rqlite cluster over its HTTP API. Every multi-statement write
//! is sent as one `/db/execute?transaction` request, which the cluster
//! applies atomically through Raft. Vector search relies on the sqlite-vec
//! scalar functions being loaded into the cluster's SQLite.

mod client;
mod config;
mod connection;
mod encode;
mod migrate;
mod store;

pub mod error;

pub use client::{ClientOptions, ReadConsistency, RqliteClient, Statement};
pub use config::RqliteConfig;
pub use connection::{DEFAULT_PORT, RqliteUrl};
pub use error::{Error, Result};
pub use migrate::RqliteMigrationTarget;
pub use store::RqliteStore;

#[cfg(test)]
mod tests;
