//! Error types shared across the engine.
//!
//! Uses thiserror for ergonomic error definition. Per-claim failures never
//! show up here: they are folded into UNKNOWN verdicts by the verifier.

use std::time::Duration;

/// Invalid chunking parameters.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChunkError {
    #[error("chunk size must be at least 1")]
    ZeroSize,

    #[error("overlap ({overlap}) must be smaller than chunk size ({size})")]
    OverlapTooLarge { size: usize, overlap: usize },
}

/// Failures from an embedding oracle.
#[derive(Debug, thiserror::Error)]
pub enum EmbedError {
    #[error("embedding request failed: {0}")]
    Request(String),

    #[error("embedding provider returned {got} vectors for {expected} inputs")]
    CountMismatch { expected: usize, got: usize },

    #[error("embedding dimensions disagree: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("embedding provider misconfigured: {0}")]
    Config(String),
}

/// Failures from a reasoning oracle.
///
/// These are values, not panics: every caller in this crate reduces them to
/// an UNKNOWN verdict or a fallback.
#[derive(Debug, Clone, thiserror::Error)]
pub enum OracleError {
    #[error("rate limited (retry after {retry_after:?})")]
    RateLimited { retry_after: Option<Duration> },

    #[error("oracle unreachable: {0}")]
    Unavailable(String),

    #[error("gave up after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: Box<OracleError> },
}

impl OracleError {
    /// Whether a retry decorator should try again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, OracleError::RateLimited { .. })
    }
}

impl From<claude::Error> for OracleError {
    fn from(err: claude::Error) -> Self {
        match err {
            claude::Error::RateLimited { retry_after } => OracleError::RateLimited { retry_after },
            other => OracleError::Unavailable(other.to_string()),
        }
    }
}

/// Failures while building an evidence index.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("embedding chunks failed: {0}")]
    Embed(#[from] EmbedError),

    #[error("embedding matrix has {rows} rows for {chunks} chunks")]
    RowMismatch { rows: usize, chunks: usize },
}

/// Retrieval-time failures for a single query.
#[derive(Debug, thiserror::Error)]
pub enum RetrieveError {
    #[error("k must be at least 1")]
    ZeroK,

    #[error("alpha must lie in [0, 1], got {0}")]
    AlphaOutOfRange(f64),

    #[error("embedding claim failed: {0}")]
    Embed(#[from] EmbedError),
}

/// Aggregation precondition failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AggregateError {
    #[error("cannot aggregate an empty verdict list")]
    NoVerdicts,
}

/// Persisted cache failures. Callers treat all of these as cache misses.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("cached entry is inconsistent: {0}")]
    Inconsistent(String),
}

/// Run-level failures of the pipeline.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("chunking failed: {0}")]
    Chunk(#[from] ChunkError),

    #[error("index build failed: {0}")]
    Index(#[from] IndexError),

    #[error("aggregation failed: {0}")]
    Aggregate(#[from] AggregateError),
}
