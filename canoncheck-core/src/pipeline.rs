//! Pipeline Orchestrator.
//!
//! chunk story -> build (or reuse) the evidence index -> for each claim:
//! retrieve, verify -> aggregate. Per-claim failures become UNKNOWN rows;
//! only configuration, chunking and index construction can fail a run.

use crate::aggregate::{decide, Tally};
use crate::chunker::chunk;
use crate::claims::ClaimExtractor;
use crate::config::AnalysisConfig;
use crate::embedding::Embedder;
use crate::error::PipelineError;
use crate::index::IndexCache;
use crate::oracle::Oracle;
use crate::report::{Analysis, BackstoryInput, BatchRecord, ClaimRow};
use crate::retriever::HybridRetriever;
use crate::types::{Claim, Verdict};
use crate::verifier::ClaimVerifier;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tracing::Instrument;

/// Reason of the synthetic verdict used when a backstory yields no claims.
pub const NO_CLAIMS_REASON: &str = "No claims could be evaluated.";

/// A story prepared for retrieval.
pub struct PreparedStory<E> {
    retriever: HybridRetriever<E>,
}

impl<E: Embedder> PreparedStory<E> {
    pub fn retriever(&self) -> &HybridRetriever<E> {
        &self.retriever
    }

    pub fn chunk_count(&self) -> usize {
        self.retriever.index().len()
    }
}

/// Wires the engine's stages together.
pub struct Pipeline<E, O, X> {
    embedder: Arc<E>,
    verifier: ClaimVerifier<O>,
    extractor: X,
    cache: Arc<IndexCache>,
    config: AnalysisConfig,
}

impl<E, O, X> Pipeline<E, O, X>
where
    E: Embedder,
    O: Oracle,
    X: ClaimExtractor,
{
    /// Build a pipeline with a fresh in-memory index cache.
    pub fn new(
        embedder: E,
        oracle: O,
        extractor: X,
        config: AnalysisConfig,
    ) -> Result<Self, PipelineError> {
        config.validate()?;
        Ok(Self {
            embedder: Arc::new(embedder),
            verifier: ClaimVerifier::new(oracle).with_max_evidence(config.max_evidence),
            extractor,
            cache: Arc::new(IndexCache::in_memory()),
            config,
        })
    }

    /// Share an index cache, e.g. one persisted to disk.
    pub fn with_cache(mut self, cache: Arc<IndexCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn verifier(&self) -> &ClaimVerifier<O> {
        &self.verifier
    }

    /// Chunk the story and build or fetch its evidence index.
    pub async fn prepare_story(&self, story: &str) -> Result<PreparedStory<E>, PipelineError> {
        let chunks = chunk(story, self.config.chunk_size, self.config.chunk_overlap)?;
        tracing::debug!(chunks = chunks.len(), "story chunked");
        let index = self.cache.get_or_build(chunks, &*self.embedder).await?;
        Ok(PreparedStory {
            retriever: HybridRetriever::new(index, Arc::clone(&self.embedder)),
        })
    }

    /// Extract claims from the backstory and check them against the story.
    pub async fn analyze(&self, story: &str, backstory: &str) -> Result<Analysis, PipelineError> {
        let prepared = self.prepare_story(story).await?;
        self.analyze_prepared(&prepared, backstory).await
    }

    /// Check already-extracted claims against the story.
    pub async fn analyze_claims(
        &self,
        story: &str,
        claims: &[Claim],
    ) -> Result<Analysis, PipelineError> {
        let prepared = self.prepare_story(story).await?;
        self.evaluate(&prepared, claims).await
    }

    /// Extract claims and evaluate them against a prepared story.
    pub async fn analyze_prepared(
        &self,
        prepared: &PreparedStory<E>,
        backstory: &str,
    ) -> Result<Analysis, PipelineError> {
        let claims = self.extractor.extract(backstory).await;
        self.evaluate(prepared, &claims).await
    }

    /// Check many backstories against one story, sharing its index.
    pub async fn analyze_batch(
        &self,
        story: &str,
        inputs: &[BackstoryInput],
    ) -> Result<Vec<BatchRecord>, PipelineError> {
        let prepared = self.prepare_story(story).await?;
        let mut records = Vec::with_capacity(inputs.len());
        for input in inputs {
            let analysis = self
                .analyze_prepared(&prepared, &input.backstory)
                .instrument(tracing::info_span!("backstory", id = %input.id))
                .await?;
            records.push(BatchRecord::new(input.id.clone(), &analysis));
        }
        Ok(records)
    }

    /// Retrieve, verify and aggregate. Rows come back in claim order.
    pub async fn evaluate(
        &self,
        prepared: &PreparedStory<E>,
        claims: &[Claim],
    ) -> Result<Analysis, PipelineError> {
        let span = tracing::info_span!(
            "analyze",
            chunks = prepared.chunk_count(),
            claims = claims.len()
        );
        async {
            tracing::info!("evaluating claims");
            let rows: Vec<ClaimRow> = stream::iter(claims.iter().enumerate().map(|(i, claim)| {
                self.evaluate_claim(prepared.retriever(), claim)
                    .instrument(tracing::debug_span!("claim", index = i))
            }))
            .buffered(self.config.concurrency)
            .collect()
            .await;

            let verdicts: Vec<Verdict> = if rows.is_empty() {
                tracing::warn!("no claims to evaluate");
                vec![Verdict::unknown(NO_CLAIMS_REASON)]
            } else {
                rows.iter().map(ClaimRow::verdict).collect()
            };

            let tally = Tally::from_verdicts(&verdicts);
            let decision = decide(&verdicts)?;
            tracing::info!(
                prediction = %decision.prediction,
                confidence = decision.confidence,
                %tally,
                "analysis complete"
            );

            Ok::<_, PipelineError>(Analysis {
                decision,
                rows,
                tally,
                chunk_count: prepared.chunk_count(),
            })
        }
        .instrument(span)
        .await
    }

    async fn evaluate_claim(&self, retriever: &HybridRetriever<E>, claim: &Claim) -> ClaimRow {
        let evidence = match retriever
            .retrieve(&claim.text, self.config.k, self.config.alpha)
            .await
        {
            Ok(evidence) => evidence,
            Err(e) => {
                tracing::warn!(claim = %claim.text, error = %e, "retrieval failed");
                return ClaimRow::new(claim, Verdict::unknown(format!("retrieval failed: {e}")), 0);
            }
        };

        let verdict = self.verifier.verify(&claim.text, &evidence).await;
        let shown = evidence.len().min(self.config.max_evidence);
        ClaimRow::new(claim, verdict, shown)
    }
}
