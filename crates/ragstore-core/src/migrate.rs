//! Versioned schema migrations and the protocol that applies them.
//!
//! The schema version is persisted state: a `schema_migrations` table holds
//! one row per applied script, and the current version is the highest row.
//! [`Migrator::run`] applies every embedded script above that version, in
//! ascending order, each atomically together with its marker row. Running
//! it against an up-to-date store is a no-op.

use std::future::Future;

use crate::{BoxError, Error, Result};

/// One versioned schema-change script.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Migration {
  pub version: u32,
  pub name:    &'static str,
  pub sql:     &'static str,
}

impl Migration {
  /// The script split into individual statements.
  ///
  /// Whole-line `--` comments are dropped and statements end at `;`. Scripts
  /// must not contain `;` inside literals or trigger bodies.
  pub fn statements(&self) -> Vec<String> {
    let without_comments: String = self
      .sql
      .lines()
      .filter(|line| !line.trim_start().starts_with("--"))
      .collect::<Vec<_>>()
      .join("\n");

    without_comments
      .split(';')
      .map(str::trim)
      .filter(|s| !s.is_empty())
      .map(str::to_owned)
      .collect()
  }
}

/// The scripts embedded in this crate, ascending by version.
pub const MIGRATIONS: &[Migration] = &[
  Migration {
    version: 1,
    name:    "documents",
    sql:     include_str!("migrations/0001_documents.sql"),
  },
  Migration {
    version: 2,
    name:    "document_fts",
    sql:     include_str!("migrations/0002_document_fts.sql"),
  },
];

/// DDL for the version marker table; created before the version is read.
pub const SCHEMA_MIGRATIONS_DDL: &str = "CREATE TABLE IF NOT EXISTS schema_migrations (
    version    INTEGER PRIMARY KEY,
    name       TEXT NOT NULL,
    applied_at TEXT NOT NULL
)";

/// Reads the highest applied version, 0 for a fresh store.
pub const CURRENT_VERSION_SQL: &str = "SELECT COALESCE(MAX(version), 0) FROM schema_migrations";

/// Records a successfully applied migration.
pub const RECORD_VERSION_SQL: &str =
  "INSERT INTO schema_migrations (version, name, applied_at) VALUES (?, ?, ?)";

/// An engine the [`Migrator`] can apply scripts to.
pub trait MigrationTarget: Send + Sync {
  /// Highest applied version, creating the marker table if needed.
  fn current_version(&self) -> impl Future<Output = Result<u32, BoxError>> + Send + '_;

  /// Apply every statement of `migration` and record its version, all or
  /// nothing.
  fn apply<'a>(
    &'a self,
    migration: &'a Migration,
  ) -> impl Future<Output = Result<(), BoxError>> + Send + 'a;
}

/// Applies pending migrations at-most-once per version.
#[derive(Debug, Clone)]
pub struct Migrator {
  migrations: Vec<Migration>,
}

impl Default for Migrator {
  fn default() -> Self { Self::new(MIGRATIONS) }
}

impl Migrator {
  /// A migrator over `migrations`, in any order.
  pub fn new(migrations: &[Migration]) -> Self {
    let mut migrations = migrations.to_vec();
    migrations.sort_by_key(|m| m.version);
    migrations.dedup_by_key(|m| m.version);
    Self { migrations }
  }

  /// Version a fully migrated store reports.
  pub fn latest_version(&self) -> u32 {
    self.migrations.last().map_or(0, |m| m.version)
  }

  /// Apply every migration newer than the target's version.
  ///
  /// Returns the version the target is at afterwards. On failure the target
  /// is left at the last version that applied cleanly.
  pub async fn run<T: MigrationTarget>(&self, target: &T) -> Result<u32> {
    let mut current = target
      .current_version()
      .await
      .map_err(|e| Error::query("read schema version", "schema_migrations", e))?;

    let pending: Vec<&Migration> =
      self.migrations.iter().filter(|m| m.version > current).collect();

    if pending.is_empty() {
      tracing::debug!(version = current, "schema is up to date");
      return Ok(current);
    }

    for migration in pending {
      tracing::info!(
        from = current,
        to = migration.version,
        name = migration.name,
        "applying migration"
      );
      target
        .apply(migration)
        .await
        .map_err(|e| Error::migration(migration.version, e))?;
      current = migration.version;
    }

    tracing::info!(version = current, "schema migrated");
    Ok(current)
  }
}
