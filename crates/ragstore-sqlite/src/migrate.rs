//! [`MigrationTarget`] for the embedded store: each migration runs in one
//! SQLite transaction together with its `schema_migrations` row.

use chrono::Utc;
use ragstore_core::{
  BoxError, Migration, MigrationTarget,
  codec::encode_dt,
  migrate::{CURRENT_VERSION_SQL, RECORD_VERSION_SQL, SCHEMA_MIGRATIONS_DDL},
};

use crate::{Error, SqliteStore};

impl MigrationTarget for SqliteStore {
  async fn current_version(&self) -> Result<u32, BoxError> {
    let version: i64 = self
      .conn
      .call(|conn| {
        conn.execute(SCHEMA_MIGRATIONS_DDL, [])?;
        Ok(conn.query_row(CURRENT_VERSION_SQL, [], |row| row.get(0))?)
      })
      .await
      .map_err(Error::from)?;

    u32::try_from(version).map_err(|_| Error::Version(version).into())
  }

  async fn apply(&self, migration: &Migration) -> Result<(), BoxError> {
    let statements = migration.statements();
    let version = migration.version;
    let name = migration.name;
    let applied_at = encode_dt(Utc::now());

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        for statement in &statements {
          tx.execute_batch(statement)?;
        }
        tx.execute(RECORD_VERSION_SQL, rusqlite::params![version, name, applied_at])?;
        tx.commit()?;
        Ok(())
      })
      .await
      .map_err(Error::from)?;

    Ok(())
  }
}
