//! Dense semantic vectors.
//!
//! The embedding oracle is an external collaborator behind [`Embedder`].
//! This module owns the matrix representation and cosine scoring only.

pub mod hashing;
pub mod http;

pub use hashing::HashingEmbedder;
pub use http::HttpEmbedder;

use crate::error::EmbedError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Core trait for embedding providers.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed each text into a fixed-length vector, one per input, in order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError>;

    /// Stable identifier of the model. Part of every embedding cache key.
    fn model_id(&self) -> &str;
}

#[async_trait]
impl<E: Embedder + ?Sized> Embedder for std::sync::Arc<E> {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        (**self).embed(texts).await
    }

    fn model_id(&self) -> &str {
        (**self).model_id()
    }
}

/// One embedding row per chunk, in chunk order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingMatrix {
    rows: Vec<Vec<f32>>,
}

impl EmbeddingMatrix {
    /// Wrap provider output, checking that every row has the same width.
    pub fn from_rows(rows: Vec<Vec<f32>>) -> Result<Self, EmbedError> {
        if let Some(first) = rows.first() {
            let width = first.len();
            if let Some(bad) = rows.iter().find(|r| r.len() != width) {
                return Err(EmbedError::DimensionMismatch {
                    expected: width,
                    got: bad.len(),
                });
            }
        }
        Ok(Self { rows })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Row width, or `None` for an empty matrix.
    pub fn dimension(&self) -> Option<usize> {
        self.rows.first().map(Vec::len)
    }

    pub fn rows(&self) -> &[Vec<f32>] {
        &self.rows
    }

    /// Cosine similarity of `query` against every row, in chunk order.
    pub fn similarities(&self, query: &[f32]) -> Vec<f64> {
        self.rows.iter().map(|row| cosine_similarity(query, row)).collect()
    }
}

/// Cosine similarity in f64. Zero for mismatched lengths or zero vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (&x, &y) in a.iter().zip(b.iter()) {
        let x64 = f64::from(x);
        let y64 = f64::from(y);
        dot += x64 * y64;
        norm_a += x64 * x64;
        norm_b += y64 * y64;
    }
    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom <= f64::EPSILON {
        return 0.0;
    }
    let sim = dot / denom;
    if sim.is_finite() {
        sim
    } else {
        0.0
    }
}

/// Check that a provider answered with one vector per input.
pub(crate) fn expect_count(expected: usize, vectors: &[Vec<f32>]) -> Result<(), EmbedError> {
    if vectors.len() != expected {
        return Err(EmbedError::CountMismatch {
            expected,
            got: vectors.len(),
        });
    }
    Ok(())
}
