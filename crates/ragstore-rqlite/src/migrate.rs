//! [`MigrationTarget`] for an rqlite cluster, addressed by the migration
//! form of the connection string (`rqlite://...`).
//!
//! Each migration is one transactional `/db/execute` request holding the
//! script's statements followed by its `schema_migrations` row.

use std::time::Duration;

use chrono::Utc;
use ragstore_core::{
  BoxError, Migration, MigrationTarget, Migrator,
  codec::encode_dt,
  migrate::{CURRENT_VERSION_SQL, RECORD_VERSION_SQL, SCHEMA_MIGRATIONS_DDL},
};

use crate::{
  ClientOptions, Error, ReadConsistency, RqliteClient, RqliteUrl, Statement,
  connection::MigrateTarget,
};

#[derive(Debug, Clone)]
pub struct RqliteMigrationTarget {
  client: RqliteClient,
}

impl RqliteMigrationTarget {
  /// Connect using a migration-target string as produced by
  /// [`RqliteUrl::migrate_database_url`].
  pub fn connect(migrate_url: &str, timeout: Duration) -> ragstore_core::Result<Self> {
    let target = MigrateTarget::parse(migrate_url)?;
    let options = ClientOptions { timeout, read_consistency: ReadConsistency::Strong };
    let client = RqliteClient::with_endpoint(target.endpoint, target.credentials, options)
      .map_err(|e| ragstore_core::Error::Open { target: "rqlite".into(), source: e.into() })?;
    Ok(Self { client })
  }

  /// Bring the cluster behind `url` up to the latest embedded schema.
  pub async fn migrate(url: &RqliteUrl, timeout: Duration) -> ragstore_core::Result<u32> {
    tracing::info!(target_url = %url, "migrating database schema");
    let target = Self::connect(&url.migrate_database_url(), timeout)?;
    Migrator::default().run(&target).await
  }
}

impl MigrationTarget for RqliteMigrationTarget {
  async fn current_version(&self) -> Result<u32, BoxError> {
    self.client.execute(&[Statement::new(SCHEMA_MIGRATIONS_DDL)], false).await?;
    let result = self
      .client
      .query_at(Statement::new(CURRENT_VERSION_SQL), ReadConsistency::Strong)
      .await?;
    let version = match result.rows().next() {
      Some(row) => row.int(0)?,
      None => 0,
    };
    u32::try_from(version)
      .map_err(|_| Error::Decode(format!("schema version out of range: {version}")).into())
  }

  async fn apply(&self, migration: &Migration) -> Result<(), BoxError> {
    let mut statements: Vec<Statement> =
      migration.statements().into_iter().map(Statement::new).collect();
    statements.push(
      Statement::new(RECORD_VERSION_SQL)
        .arg(migration.version)
        .arg(migration.name)
        .arg(encode_dt(Utc::now())),
    );
    self.client.execute(&statements, true).await?;
    Ok(())
  }
}
