//! Content-addressed caching of evidence indexes.
//!
//! Two layers:
//! - in-process: one `OnceCell` per key, so concurrent requests for the same
//!   chunk set wait on a single build instead of racing;
//! - on disk (optional): JSON blobs per key. Anything unreadable is a miss.

use super::{content_key, embedding_key, EvidenceIndex};
use crate::embedding::{Embedder, EmbeddingMatrix};
use crate::error::{CacheError, IndexError};
use crate::lexical::LexicalIndex;
use crate::types::Chunk;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::sync::{Mutex, OnceCell};

/// Current blob format version.
const BLOB_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct Blob<T> {
    version: u32,
    key: String,
    rows: usize,
    value: T,
}

type Slot = Arc<OnceCell<Arc<EvidenceIndex>>>;

/// Process-wide index cache with an optional persistence directory.
#[derive(Debug, Default)]
pub struct IndexCache {
    dir: Option<PathBuf>,
    slots: Mutex<HashMap<String, Slot>>,
}

impl IndexCache {
    /// Memory-only cache.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Cache that also persists blobs under `dir`.
    pub fn with_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: Some(dir.into()),
            slots: Mutex::new(HashMap::new()),
        }
    }

    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    /// Return the index for `chunks`, building it at most once per key.
    ///
    /// A failed build leaves the slot empty so a later call can retry.
    pub async fn get_or_build<E>(
        &self,
        chunks: Vec<Chunk>,
        embedder: &E,
    ) -> Result<Arc<EvidenceIndex>, IndexError>
    where
        E: Embedder + ?Sized,
    {
        let content = content_key(&chunks);
        let slot_key = embedding_key(&content, embedder.model_id());

        let slot = {
            let mut slots = self.slots.lock().await;
            slots
                .entry(slot_key)
                .or_insert_with(|| Arc::new(OnceCell::new()))
                .clone()
        };

        if let Some(index) = slot.get() {
            tracing::debug!(key = %content, "evidence index cache hit (memory)");
            return Ok(Arc::clone(index));
        }

        let index = slot
            .get_or_try_init(|| async move {
                self.build(content, chunks, embedder).await.map(Arc::new)
            })
            .await?;
        Ok(Arc::clone(index))
    }

    async fn build<E>(
        &self,
        content: String,
        chunks: Vec<Chunk>,
        embedder: &E,
    ) -> Result<EvidenceIndex, IndexError>
    where
        E: Embedder + ?Sized,
    {
        let lexical = self.lexical_for(&content, &chunks).await;
        let embeddings = self.embeddings_for(&content, &chunks, embedder).await?;
        EvidenceIndex::new(content, chunks, embeddings, lexical)
    }

    async fn lexical_for(&self, content: &str, chunks: &[Chunk]) -> LexicalIndex {
        let path = self.blob_path(content, "lex");
        if let Some(path) = &path {
            match read_blob::<LexicalIndex>(path, content, chunks.len()).await {
                Ok(Some(lexical)) => {
                    tracing::debug!(key = %content, "lexical index cache hit (disk)");
                    return lexical;
                }
                Ok(None) => {}
                Err(e) => tracing::warn!(path = %path.display(), error = %e, "discarding unreadable lexical cache"),
            }
        }

        let lexical = LexicalIndex::fit(chunks);
        tracing::debug!(
            key = %content,
            terms = lexical.vocabulary_len(),
            "fitted lexical index"
        );
        if let Some(path) = &path {
            if let Err(e) = write_blob(path, content, chunks.len(), &lexical).await {
                tracing::warn!(path = %path.display(), error = %e, "failed to persist lexical index");
            }
        }
        lexical
    }

    async fn embeddings_for<E>(
        &self,
        content: &str,
        chunks: &[Chunk],
        embedder: &E,
    ) -> Result<EmbeddingMatrix, IndexError>
    where
        E: Embedder + ?Sized,
    {
        let key = embedding_key(content, embedder.model_id());
        let path = self.blob_path(&key, "emb");
        if let Some(path) = &path {
            match read_blob::<EmbeddingMatrix>(path, &key, chunks.len()).await {
                Ok(Some(matrix)) => {
                    tracing::debug!(key = %key, "embedding cache hit (disk)");
                    return Ok(matrix);
                }
                Ok(None) => {}
                Err(e) => tracing::warn!(path = %path.display(), error = %e, "discarding unreadable embedding cache"),
            }
        }

        let matrix = if chunks.is_empty() {
            EmbeddingMatrix::default()
        } else {
            let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
            let rows = embedder.embed(&texts).await?;
            if rows.len() != chunks.len() {
                return Err(IndexError::RowMismatch {
                    rows: rows.len(),
                    chunks: chunks.len(),
                });
            }
            EmbeddingMatrix::from_rows(rows)?
        };
        tracing::debug!(key = %key, rows = matrix.len(), model = embedder.model_id(), "embedded chunks");

        if let Some(path) = &path {
            if let Err(e) = write_blob(path, &key, chunks.len(), &matrix).await {
                tracing::warn!(path = %path.display(), error = %e, "failed to persist embeddings");
            }
        }
        Ok(matrix)
    }

    fn blob_path(&self, key: &str, kind: &str) -> Option<PathBuf> {
        self.dir.as_ref().map(|d| d.join(format!("{key}.{kind}.json")))
    }
}

/// `Ok(None)` when the file is absent; `Err` when it exists but is unusable.
async fn read_blob<T: DeserializeOwned>(
    path: &Path,
    key: &str,
    rows: usize,
) -> Result<Option<T>, CacheError> {
    let content = match fs::read_to_string(path).await {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let blob: Blob<T> = serde_json::from_str(&content)?;
    if blob.version != BLOB_VERSION {
        return Err(CacheError::Inconsistent(format!(
            "version {} (expected {BLOB_VERSION})",
            blob.version
        )));
    }
    if blob.key != key || blob.rows != rows {
        return Err(CacheError::Inconsistent(format!(
            "blob for {} with {} rows, wanted {key} with {rows}",
            blob.key, blob.rows
        )));
    }
    Ok(Some(blob.value))
}

/// Write via a temporary file and rename, so readers never see half a blob.
async fn write_blob<T: Serialize>(
    path: &Path,
    key: &str,
    rows: usize,
    value: &T,
) -> Result<(), CacheError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    let blob = Blob {
        version: BLOB_VERSION,
        key: key.to_string(),
        rows,
        value,
    };
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, serde_json::to_vec(&blob)?).await?;
    fs::rename(&tmp, path).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunker::chunk;
    use crate::testing::CountingEmbedder;

    fn story_chunks() -> Vec<Chunk> {
        chunk("Alice lived in Paris in 1990. She worked as a teacher.", 5, 1).unwrap()
    }

    #[tokio::test]
    async fn test_memory_hit_skips_embedding() {
        let cache = IndexCache::in_memory();
        let embedder = CountingEmbedder::new();

        let a = cache.get_or_build(story_chunks(), &embedder).await.unwrap();
        let b = cache.get_or_build(story_chunks(), &embedder).await.unwrap();

        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(embedder.calls(), 1);
        assert_eq!(a.len(), story_chunks().len());
    }

    #[tokio::test]
    async fn test_different_chunk_sets_build_separately() {
        let cache = IndexCache::in_memory();
        let embedder = CountingEmbedder::new();

        cache.get_or_build(story_chunks(), &embedder).await.unwrap();
        let other = chunk("Bob sailed to Lisbon.", 5, 1).unwrap();
        cache.get_or_build(other, &embedder).await.unwrap();

        assert_eq!(embedder.calls(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_builds_share_one_computation() {
        let cache = Arc::new(IndexCache::in_memory());
        let embedder = Arc::new(CountingEmbedder::new());

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = Arc::clone(&cache);
            let embedder = Arc::clone(&embedder);
            handles.push(tokio::spawn(async move {
                cache.get_or_build(story_chunks(), &*embedder).await.unwrap()
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(embedder.calls(), 1);
    }

    #[tokio::test]
    async fn test_disk_cache_survives_new_process_cache() {
        let dir = tempfile::tempdir().unwrap();
        let embedder = CountingEmbedder::new();

        let first = IndexCache::with_dir(dir.path());
        let built = first.get_or_build(story_chunks(), &embedder).await.unwrap();

        let second = IndexCache::with_dir(dir.path());
        let loaded = second.get_or_build(story_chunks(), &embedder).await.unwrap();

        assert_eq!(embedder.calls(), 1);
        assert_eq!(built.embeddings(), loaded.embeddings());
        assert_eq!(built.lexical(), loaded.lexical());
    }

    #[tokio::test]
    async fn test_corrupt_blob_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let embedder = CountingEmbedder::new();

        IndexCache::with_dir(dir.path())
            .get_or_build(story_chunks(), &embedder)
            .await
            .unwrap();

        for entry in std::fs::read_dir(dir.path()).unwrap() {
            std::fs::write(entry.unwrap().path(), b"{not json").unwrap();
        }

        let index = IndexCache::with_dir(dir.path())
            .get_or_build(story_chunks(), &embedder)
            .await
            .unwrap();
        assert_eq!(embedder.calls(), 2);
        assert_eq!(index.len(), story_chunks().len());
    }

    #[tokio::test]
    async fn test_empty_chunk_set_needs_no_embedding() {
        let cache = IndexCache::in_memory();
        let embedder = CountingEmbedder::new();
        let index = cache.get_or_build(Vec::new(), &embedder).await.unwrap();
        assert!(index.is_empty());
        assert_eq!(embedder.calls(), 0);
    }
}
