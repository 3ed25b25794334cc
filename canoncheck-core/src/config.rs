//! Run configuration.

use crate::chunker::{DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE};
use crate::error::PipelineError;
use crate::verifier::MAX_EVIDENCE;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default number of passages retrieved per claim.
pub const DEFAULT_K: usize = 5;

/// Default weight of the semantic score in fusion.
pub const DEFAULT_ALPHA: f64 = 0.65;

/// Default number of claims evaluated at once.
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Cache directory used when `CANONCHECK_CACHE_DIR` is unset.
pub const DEFAULT_CACHE_DIR: &str = ".cache";

/// Parameters of one analysis run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Words per chunk.
    pub chunk_size: usize,

    /// Words shared by consecutive chunks.
    pub chunk_overlap: usize,

    /// Passages retrieved per claim.
    pub k: usize,

    /// Semantic weight in `[0, 1]`; lexical gets `1 - alpha`.
    pub alpha: f64,

    /// Passages shown to the verifier per claim.
    pub max_evidence: usize,

    /// Claims evaluated concurrently.
    pub concurrency: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            k: DEFAULT_K,
            alpha: DEFAULT_ALPHA,
            max_evidence: MAX_EVIDENCE,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

impl AnalysisConfig {
    /// The tuned preset: k = 5, alpha = 0.65.
    pub fn best() -> Self {
        Self::default().with_k(5).with_alpha(0.65)
    }

    pub fn with_chunking(mut self, size: usize, overlap: usize) -> Self {
        self.chunk_size = size;
        self.chunk_overlap = overlap;
        self
    }

    pub fn with_k(mut self, k: usize) -> Self {
        self.k = k;
        self
    }

    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    pub fn with_max_evidence(mut self, max: usize) -> Self {
        self.max_evidence = max;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Reject settings no run could use.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.chunk_size == 0 {
            return Err(PipelineError::Config("chunk size must be at least 1".into()));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(PipelineError::Config(format!(
                "overlap ({}) must be smaller than chunk size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        if self.k == 0 {
            return Err(PipelineError::Config("k must be at least 1".into()));
        }
        if !(0.0..=1.0).contains(&self.alpha) {
            return Err(PipelineError::Config(format!(
                "alpha must lie in [0, 1], got {}",
                self.alpha
            )));
        }
        if self.max_evidence == 0 || self.max_evidence > MAX_EVIDENCE {
            return Err(PipelineError::Config(format!(
                "max evidence must be between 1 and {MAX_EVIDENCE}"
            )));
        }
        if self.concurrency == 0 {
            return Err(PipelineError::Config("concurrency must be at least 1".into()));
        }
        Ok(())
    }
}

/// Cache location from `CANONCHECK_CACHE_DIR`, defaulting to `.cache`.
pub fn cache_dir_from_env() -> PathBuf {
    std::env::var("CANONCHECK_CACHE_DIR")
        .ok()
        .filter(|d| !d.trim().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CACHE_DIR))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = AnalysisConfig::default();
        assert_eq!(config.chunk_size, 700);
        assert_eq!(config.chunk_overlap, 120);
        assert!(config.validate().is_ok());
        assert_eq!(AnalysisConfig::best(), config);
    }

    #[test]
    fn test_builder() {
        let config = AnalysisConfig::default()
            .with_chunking(50, 10)
            .with_k(3)
            .with_alpha(0.6)
            .with_concurrency(1);
        assert_eq!(config.chunk_size, 50);
        assert_eq!(config.k, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_failures() {
        let base = AnalysisConfig::default();
        assert!(base.clone().with_chunking(0, 0).validate().is_err());
        assert!(base.clone().with_chunking(10, 10).validate().is_err());
        assert!(base.clone().with_k(0).validate().is_err());
        assert!(base.clone().with_alpha(1.01).validate().is_err());
        assert!(base.clone().with_alpha(f64::NAN).validate().is_err());
        assert!(base.clone().with_max_evidence(6).validate().is_err());
        assert!(base.with_concurrency(0).validate().is_err());
    }
}
