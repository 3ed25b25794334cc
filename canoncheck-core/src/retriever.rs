//! Hybrid lexical + semantic retrieval over one [`EvidenceIndex`].

use crate::embedding::Embedder;
use crate::error::RetrieveError;
use crate::index::EvidenceIndex;
use serde::Serialize;
use std::sync::Arc;

/// Score vectors flatter than this are left as-is by [`min_max_normalize`].
pub const NORMALIZE_EPSILON: f64 = 1e-9;

/// One ranked chunk with its component scores.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredChunk {
    pub index: usize,
    pub text: String,
    pub semantic: f64,
    pub lexical: f64,
    pub fused: f64,
}

/// Ranks chunks of a shared index against claims.
///
/// Read-only: many retrievers (or many concurrent calls on one) can share
/// the same index without locking.
pub struct HybridRetriever<E> {
    index: Arc<EvidenceIndex>,
    embedder: Arc<E>,
}

impl<E> Clone for HybridRetriever<E> {
    fn clone(&self) -> Self {
        Self {
            index: Arc::clone(&self.index),
            embedder: Arc::clone(&self.embedder),
        }
    }
}

impl<E: Embedder> HybridRetriever<E> {
    pub fn new(index: Arc<EvidenceIndex>, embedder: Arc<E>) -> Self {
        Self { index, embedder }
    }

    pub fn index(&self) -> &Arc<EvidenceIndex> {
        &self.index
    }

    /// Texts of the `k` best chunks for `claim`, most relevant first.
    pub async fn retrieve(
        &self,
        claim: &str,
        k: usize,
        alpha: f64,
    ) -> Result<Vec<String>, RetrieveError> {
        Ok(self
            .rank(claim, k, alpha)
            .await?
            .into_iter()
            .map(|hit| hit.text)
            .collect())
    }

    /// Like [`retrieve`](Self::retrieve) but keeps the scores.
    pub async fn rank(
        &self,
        claim: &str,
        k: usize,
        alpha: f64,
    ) -> Result<Vec<ScoredChunk>, RetrieveError> {
        validate(k, alpha)?;
        if self.index.is_empty() {
            return Ok(Vec::new());
        }

        let query = self.embedder.embed(&[claim.to_string()]).await?;
        let semantic = match query.first() {
            Some(vector) => self.index.embeddings().similarities(vector),
            None => vec![0.0; self.index.len()],
        };
        let lexical = self.index.lexical().similarities(claim);

        let fused = fuse_scores(&semantic, &lexical, alpha);
        let hits = top_k(&fused, k)
            .into_iter()
            .map(|i| ScoredChunk {
                index: self.index.chunks()[i].index,
                text: self.index.chunks()[i].text.clone(),
                semantic: semantic[i],
                lexical: lexical[i],
                fused: fused[i],
            })
            .collect::<Vec<_>>();

        tracing::debug!(
            claim,
            k,
            alpha,
            best = hits.first().map(|h| h.fused),
            "ranked evidence"
        );
        Ok(hits)
    }
}

fn validate(k: usize, alpha: f64) -> Result<(), RetrieveError> {
    if k == 0 {
        return Err(RetrieveError::ZeroK);
    }
    if !(0.0..=1.0).contains(&alpha) {
        return Err(RetrieveError::AlphaOutOfRange(alpha));
    }
    Ok(())
}

/// Rescale to `[0, 1]`. A (near-)constant vector is returned unchanged.
pub fn min_max_normalize(scores: &[f64]) -> Vec<f64> {
    let min = scores.iter().copied().fold(f64::INFINITY, f64::min);
    let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let range = max - min;
    if range.is_nan() || range < NORMALIZE_EPSILON {
        return scores.to_vec();
    }
    scores.iter().map(|s| (s - min) / range).collect()
}

/// `alpha * norm(semantic) + (1 - alpha) * norm(lexical)`, element-wise.
pub fn fuse_scores(semantic: &[f64], lexical: &[f64], alpha: f64) -> Vec<f64> {
    let semantic = min_max_normalize(semantic);
    let lexical = min_max_normalize(lexical);
    semantic
        .iter()
        .zip(lexical.iter())
        .map(|(s, l)| alpha * s + (1.0 - alpha) * l)
        .collect()
}

/// Positions of the `k` highest scores, descending; equal scores keep position order.
/// Non-finite scores rank last.
pub fn top_k(scores: &[f64], k: usize) -> Vec<usize> {
    // +0.0 folds -0.0 into 0.0 so `total_cmp` treats them as a tie.
    let key = |i: usize| {
        let s = scores[i];
        if s.is_finite() {
            s + 0.0
        } else {
            f64::NEG_INFINITY
        }
    };
    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| key(b).total_cmp(&key(a)).then(a.cmp(&b)));
    order.truncate(k);
    order
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunker::chunk;
    use crate::embedding::HashingEmbedder;
    use crate::index::IndexCache;

    async fn retriever(text: &str, size: usize, overlap: usize) -> HybridRetriever<HashingEmbedder> {
        let embedder = Arc::new(HashingEmbedder::default());
        let chunks = chunk(text, size, overlap).unwrap();
        let index = IndexCache::in_memory()
            .get_or_build(chunks, &*embedder)
            .await
            .unwrap();
        HybridRetriever::new(index, embedder)
    }

    const STORY: &str = "Alice lived in Paris in 1990. \
        The harbour froze every winter. \
        Alice worked as a teacher at the village school. \
        Ships came from Lisbon in spring.";

    #[test]
    fn test_min_max_normalize() {
        assert_eq!(min_max_normalize(&[1.0, 3.0, 2.0]), vec![0.0, 1.0, 0.5]);
    }

    #[test]
    fn test_min_max_normalize_constant_is_untouched() {
        assert_eq!(min_max_normalize(&[0.4, 0.4]), vec![0.4, 0.4]);
        assert!(min_max_normalize(&[]).is_empty());
    }

    #[test]
    fn test_top_k_breaks_ties_by_position() {
        assert_eq!(top_k(&[0.5, 0.9, 0.5, 0.9], 3), vec![1, 3, 0]);
        assert_eq!(top_k(&[0.1], 5), vec![0]);
    }

    #[test]
    fn test_top_k_ranks_non_finite_scores_last() {
        let scores: Vec<f64> = (0..64)
            .map(|i| if i % 3 == 0 { f64::NAN } else { i as f64 / 64.0 })
            .collect();
        let order = top_k(&scores, 64);
        assert_eq!(order.len(), 64);
        assert_eq!(order[0], 62);
        assert!(order[..42].iter().all(|&i| i % 3 != 0));
        assert!(order[42..].iter().all(|&i| i % 3 == 0));

        assert_eq!(top_k(&[f64::INFINITY, 0.2, f64::NAN, 0.5], 2), vec![3, 1]);
        assert_eq!(top_k(&[-0.0, 0.0], 2), vec![0, 1]);
    }

    #[test]
    fn test_fusion_is_monotone() {
        let semantic = [0.9, 0.2, 0.5];
        let lexical = [0.8, 0.1, 0.3];
        for alpha in [0.1, 0.35, 0.65, 0.9] {
            let fused = fuse_scores(&semantic, &lexical, alpha);
            assert!(fused[0] > fused[2]);
            assert!(fused[2] > fused[1]);
        }
    }

    #[test]
    fn test_alpha_extremes_select_one_signal() {
        let semantic = [0.0, 1.0];
        let lexical = [1.0, 0.0];
        assert_eq!(fuse_scores(&semantic, &lexical, 1.0), vec![0.0, 1.0]);
        assert_eq!(fuse_scores(&semantic, &lexical, 0.0), vec![1.0, 0.0]);
    }

    #[tokio::test]
    async fn test_retrieve_prefers_matching_passage() {
        let r = retriever(STORY, 8, 0).await;
        let hits = r.retrieve("Alice worked as a teacher", 1, 0.65).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert!(hits[0].contains("teacher"));
    }

    #[tokio::test]
    async fn test_retrieve_is_deterministic() {
        let r = retriever(STORY, 6, 2).await;
        let a = r.rank("ships from Lisbon", 3, 0.6).await.unwrap();
        let b = r.rank("ships from Lisbon", 3, 0.6).await.unwrap();
        assert_eq!(a, b);
        assert!(a.len() <= 3);
    }

    #[tokio::test]
    async fn test_large_k_returns_every_chunk() {
        let r = retriever(STORY, 6, 2).await;
        let total = r.index().len();
        let hits = r.retrieve("winter", total + 10, 0.65).await.unwrap();
        assert_eq!(hits.len(), total);
    }

    /// Answers every text with a vector holding an infinite component.
    struct OverflowingEmbedder;

    #[async_trait::async_trait]
    impl Embedder for OverflowingEmbedder {
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, crate::error::EmbedError> {
            Ok(texts.iter().map(|_| vec![f32::INFINITY, 1.0]).collect())
        }

        fn model_id(&self) -> &str {
            "overflowing"
        }
    }

    #[tokio::test]
    async fn test_overflowing_embeddings_fall_back_to_lexical() {
        let embedder = Arc::new(OverflowingEmbedder);
        let chunks = chunk(STORY, 8, 0).unwrap();
        let index = IndexCache::in_memory()
            .get_or_build(chunks, &*embedder)
            .await
            .unwrap();
        let r = HybridRetriever::new(index, embedder);

        let ranked = r.rank("Ships came from Lisbon", 2, 0.65).await.unwrap();
        assert_eq!(ranked.len(), 2);
        assert!(ranked.iter().all(|c| c.semantic == 0.0 && c.fused.is_finite()));
        assert!(ranked[0].text.contains("Lisbon"));
    }

    #[tokio::test]
    async fn test_empty_index_returns_nothing() {
        let r = retriever("", 6, 2).await;
        assert!(r.retrieve("anything", 3, 0.5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_parameters_are_rejected() {
        let r = retriever(STORY, 6, 2).await;
        assert!(matches!(
            r.retrieve("x", 0, 0.5).await,
            Err(RetrieveError::ZeroK)
        ));
        assert!(matches!(
            r.retrieve("x", 1, 1.5).await,
            Err(RetrieveError::AlphaOutOfRange(_))
        ));
    }
}
