use std::path::PathBuf;

use ragstore_core::{DistanceMetric, StoreOptions};
use serde::Deserialize;

/// Settings for an embedded store, as read from a config file.
#[derive(Debug, Clone, Deserialize)]
pub struct SqliteConfig {
  /// Database file; `:memory:` opens a private in-memory database.
  pub path:       PathBuf,
  pub dimensions: usize,
  #[serde(default)]
  pub metric:     DistanceMetric,
}

impl SqliteConfig {
  pub fn options(&self) -> StoreOptions {
    StoreOptions::new(self.dimensions).with_metric(self.metric)
  }
}
