//! Narrative consistency checking.
//!
//! Given a long story and a short backstory, this crate:
//! - chunks the story into overlapping word windows
//! - indexes the chunks twice (dense embeddings and TF-IDF), cached by content
//! - retrieves evidence per claim by fusing both similarities
//! - asks a reasoning oracle for a SUPPORT / CONTRADICT / UNKNOWN verdict
//! - folds the verdicts into one CONSISTENT / INCONSISTENT decision
//!
//! # Quick Start
//!
//! ```ignore
//! use canoncheck_core::{AnalysisConfig, ClaudeOracle, HashingEmbedder, OracleClaimExtractor, Pipeline, Retrying};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let oracle = Arc::new(Retrying::new(ClaudeOracle::from_env()?));
//!     let pipeline = Pipeline::new(
//!         HashingEmbedder::default(),
//!         Arc::clone(&oracle),
//!         OracleClaimExtractor::new(oracle),
//!         AnalysisConfig::best(),
//!     )?;
//!
//!     let analysis = pipeline.analyze(&story, &backstory).await?;
//!     println!("{analysis}");
//!     Ok(())
//! }
//! ```

pub mod aggregate;
pub mod chunker;
pub mod claims;
pub mod config;
pub mod embedding;
pub mod error;
pub mod index;
pub mod lexical;
pub mod oracle;
pub mod pipeline;
pub mod report;
pub mod retriever;
pub mod testing;
pub mod types;
pub mod verifier;

// Primary public API
pub use aggregate::{confidence, decide, Tally};
pub use chunker::chunk;
pub use claims::{ClaimExtractor, OracleClaimExtractor, SentenceExtractor};
pub use config::AnalysisConfig;
pub use embedding::{Embedder, HashingEmbedder, HttpEmbedder};
pub use error::{
    AggregateError, CacheError, ChunkError, EmbedError, IndexError, OracleError, PipelineError,
    RetrieveError,
};
pub use index::{EvidenceIndex, IndexCache};
pub use oracle::{Cached, ClaudeOracle, JsonLinesStore, MemoryStore, Oracle, Retrying};
pub use pipeline::{Pipeline, PreparedStory};
pub use report::{Analysis, BackstoryInput, BatchRecord, ClaimRow};
pub use retriever::HybridRetriever;
pub use types::{Chunk, Claim, Decision, Label, Prediction, Verdict};
pub use verifier::ClaimVerifier;
