use std::path::Path;

use anyhow::{Context as _, bail};
use ragstore_rqlite::RqliteConfig;
use ragstore_sqlite::SqliteConfig;
use serde::Deserialize;

/// Shape of the configuration file. Exactly one backend section is set.
#[derive(Debug, Default, Deserialize)]
pub struct Settings {
  #[serde(default)]
  pub sqlite: Option<SqliteConfig>,
  #[serde(default)]
  pub rqlite: Option<RqliteConfig>,
}

#[derive(Debug)]
pub enum StoreSettings {
  Sqlite(SqliteConfig),
  Rqlite(RqliteConfig),
}

/// `RAGSTORE_SQLITE__PATH`, `RAGSTORE_RQLITE__URL`, ...
pub fn environment() -> config::Environment {
  config::Environment::with_prefix("RAGSTORE")
    .prefix_separator("_")
    .separator("__")
}

impl Settings {
  pub fn load(path: &Path, env: config::Environment) -> anyhow::Result<Self> {
    config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(env)
      .build()
      .context("failed to read config file")?
      .try_deserialize()
      .context("failed to deserialise settings")
  }

  pub fn store(self) -> anyhow::Result<StoreSettings> {
    match (self.sqlite, self.rqlite) {
      (Some(sqlite), None) => Ok(StoreSettings::Sqlite(sqlite)),
      (None, Some(rqlite)) => Ok(StoreSettings::Rqlite(rqlite)),
      (None, None) => bail!("no store configured: set [sqlite] or [rqlite]"),
      (Some(_), Some(_)) => bail!("both [sqlite] and [rqlite] are configured"),
    }
  }
}
