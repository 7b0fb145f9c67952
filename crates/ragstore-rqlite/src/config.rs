use std::{fmt, time::Duration};

use ragstore_core::{DistanceMetric, StoreOptions};
use serde::Deserialize;

use crate::{ClientOptions, ReadConsistency, RqliteUrl};

fn default_timeout_secs() -> u64 { 30 }

/// Settings for a networked store, as read from a config file.
#[derive(Clone, Deserialize)]
pub struct RqliteConfig {
  /// `http[s]://[user:pass@]host[:port]`.
  pub url:              String,
  pub dimensions:       usize,
  #[serde(default)]
  pub metric:           DistanceMetric,
  #[serde(default)]
  pub read_consistency: ReadConsistency,
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs:     u64,
}

impl RqliteConfig {
  pub fn options(&self) -> StoreOptions {
    StoreOptions::new(self.dimensions).with_metric(self.metric)
  }

  pub fn client_options(&self) -> ClientOptions {
    ClientOptions {
      timeout:          Duration::from_secs(self.timeout_secs),
      read_consistency: self.read_consistency,
    }
  }
}

impl fmt::Debug for RqliteConfig {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let url = RqliteUrl::parse(&self.url)
      .map(|u| u.redacted())
      .unwrap_or_else(|_| "<invalid>".into());
    f.debug_struct("RqliteConfig")
      .field("url", &url)
      .field("dimensions", &self.dimensions)
      .field("metric", &self.metric)
      .field("read_consistency", &self.read_consistency)
      .field("timeout_secs", &self.timeout_secs)
      .finish()
  }
}
