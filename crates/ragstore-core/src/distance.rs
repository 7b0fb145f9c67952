//! Vector distance metrics and per-store embedding options.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// The metric `nearest` orders by. It must match the one the embedding model
/// was trained for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
  /// `1 - cos(a, b)`; zero-norm vectors are at distance `1.0` from everything.
  #[default]
  Cosine,
  /// Euclidean distance.
  L2,
}

impl DistanceMetric {
  /// Name of the SQL scalar function computing this metric over two encoded
  /// embeddings. Matches the sqlite-vec function names.
  pub fn sql_function(self) -> &'static str {
    match self {
      Self::Cosine => "vec_distance_cosine",
      Self::L2 => "vec_distance_L2",
    }
  }

  /// Distance between two equal-length vectors.
  pub fn distance(self, a: &[f32], b: &[f32]) -> Result<f64> {
    if a.len() != b.len() {
      return Err(Error::DimensionMismatch { expected: a.len(), actual: b.len() });
    }
    Ok(match self {
      Self::Cosine => cosine_distance(a, b),
      Self::L2 => l2_distance(a, b),
    })
  }
}

impl fmt::Display for DistanceMetric {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      Self::Cosine => "cosine",
      Self::L2 => "l2",
    })
  }
}

fn cosine_distance(a: &[f32], b: &[f32]) -> f64 {
  let mut dot = 0.0f64;
  let mut norm_a = 0.0f64;
  let mut norm_b = 0.0f64;
  for (&x, &y) in a.iter().zip(b) {
    let (x, y) = (f64::from(x), f64::from(y));
    dot += x * y;
    norm_a += x * x;
    norm_b += y * y;
  }
  let denom = norm_a.sqrt() * norm_b.sqrt();
  if denom <= f64::EPSILON {
    return 1.0;
  }
  1.0 - dot / denom
}

fn l2_distance(a: &[f32], b: &[f32]) -> f64 {
  a.iter()
    .zip(b)
    .map(|(&x, &y)| {
      let d = f64::from(x) - f64::from(y);
      d * d
    })
    .sum::<f64>()
    .sqrt()
}

/// Embedding shape fixed for the lifetime of a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreOptions {
  /// Length every stored and queried embedding must have.
  pub dimensions: usize,
  #[serde(default)]
  pub metric:     DistanceMetric,
}

impl StoreOptions {
  pub fn new(dimensions: usize) -> Self {
    Self { dimensions, metric: DistanceMetric::default() }
  }

  pub fn with_metric(mut self, metric: DistanceMetric) -> Self {
    self.metric = metric;
    self
  }

  /// Fail fast on an embedding of the wrong length.
  pub fn check_dimensions(&self, embedding: &[f32]) -> Result<()> {
    if embedding.len() != self.dimensions {
      return Err(Error::DimensionMismatch {
        expected: self.dimensions,
        actual:   embedding.len(),
      });
    }
    Ok(())
  }

  /// [`Self::check_dimensions`], and every component must be finite.
  pub fn check_embedding(&self, embedding: &[f32]) -> Result<()> {
    self.check_dimensions(embedding)?;
    match embedding.iter().position(|x| !x.is_finite()) {
      Some(position) => Err(Error::NonFiniteEmbedding { position }),
      None => Ok(()),
    }
  }
}
