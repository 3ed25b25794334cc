//! Evidence Index: the two parallel representations of one chunk set.
//!
//! An [`EvidenceIndex`] is immutable once built and is shared read-only by
//! every claim of a run. Construction and caching live in [`cache`].

pub mod cache;

pub use cache::IndexCache;

use crate::embedding::EmbeddingMatrix;
use crate::error::IndexError;
use crate::lexical::LexicalIndex;
use crate::types::Chunk;
use sha2::{Digest, Sha256};

/// Dense and sparse views of the same chunks, row order = chunk order.
#[derive(Debug, Clone)]
pub struct EvidenceIndex {
    key: String,
    chunks: Vec<Chunk>,
    embeddings: EmbeddingMatrix,
    lexical: LexicalIndex,
}

impl EvidenceIndex {
    /// Assemble an index, enforcing one embedding row per chunk.
    pub fn new(
        key: String,
        chunks: Vec<Chunk>,
        embeddings: EmbeddingMatrix,
        lexical: LexicalIndex,
    ) -> Result<Self, IndexError> {
        if embeddings.len() != chunks.len() {
            return Err(IndexError::RowMismatch {
                rows: embeddings.len(),
                chunks: chunks.len(),
            });
        }
        if lexical.rows().len() != chunks.len() {
            return Err(IndexError::RowMismatch {
                rows: lexical.rows().len(),
                chunks: chunks.len(),
            });
        }
        Ok(Self {
            key,
            chunks,
            embeddings,
            lexical,
        })
    }

    /// Content key of the chunk set this index was built from.
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn embeddings(&self) -> &EmbeddingMatrix {
        &self.embeddings
    }

    pub fn lexical(&self) -> &LexicalIndex {
        &self.lexical
    }
}

/// Hex SHA-256 over the chunk texts, each length-prefixed so that
/// `["ab", "c"]` and `["a", "bc"]` hash differently.
pub fn content_key(chunks: &[Chunk]) -> String {
    let mut hasher = Sha256::new();
    hasher.update((chunks.len() as u64).to_le_bytes());
    for chunk in chunks {
        hasher.update((chunk.text.len() as u64).to_le_bytes());
        hasher.update(chunk.text.as_bytes());
    }
    hex::encode(hasher.finalize())
}

/// Key for embeddings of a chunk set under a given model.
pub fn embedding_key(content_key: &str, model_id: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(model_id.as_bytes());
    hasher.update([0u8]);
    hasher.update(content_key.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunks(texts: &[&str]) -> Vec<Chunk> {
        texts
            .iter()
            .enumerate()
            .map(|(index, t)| Chunk {
                index,
                text: t.to_string(),
            })
            .collect()
    }

    #[test]
    fn test_content_key_is_stable_and_boundary_sensitive() {
        let a = content_key(&chunks(&["ab", "c"]));
        let b = content_key(&chunks(&["a", "bc"]));
        assert_ne!(a, b);
        assert_eq!(a, content_key(&chunks(&["ab", "c"])));
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_embedding_key_depends_on_model() {
        let key = content_key(&chunks(&["x"]));
        assert_ne!(embedding_key(&key, "m1"), embedding_key(&key, "m2"));
    }

    #[test]
    fn test_new_rejects_row_mismatch() {
        let c = chunks(&["one two", "three four"]);
        let lexical = LexicalIndex::fit(&c);
        let embeddings = EmbeddingMatrix::from_rows(vec![vec![1.0]]).unwrap();
        let err = EvidenceIndex::new(content_key(&c), c, embeddings, lexical).unwrap_err();
        assert!(matches!(err, IndexError::RowMismatch { rows: 1, chunks: 2 }));
    }
}
