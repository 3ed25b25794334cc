//! Content-keyed oracle response cache.
//!
//! The backing store is injected, so tests get a fresh [`MemoryStore`] per
//! run and the CLI can persist answers across runs with [`JsonLinesStore`].

use super::Oracle;
use crate::error::{CacheError, OracleError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// Keyed string storage for oracle answers.
#[async_trait]
pub trait ResponseStore: Send + Sync {
    async fn get(&self, key: &str) -> Option<String>;
    async fn put(&self, key: &str, value: String);
}

/// Process-local store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }
}

#[async_trait]
impl ResponseStore for MemoryStore {
    async fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().await.get(key).cloned()
    }

    async fn put(&self, key: &str, value: String) {
        self.entries.lock().await.insert(key.to_string(), value);
    }
}

/// An append-only JSON Lines file of `{"key", "value"}` records.
///
/// The file is read on first access; later records win over earlier ones.
/// Each `put` appends one line, so writes stay proportional to the answer
/// size. Unparseable lines, such as a record torn by a crash, are skipped.
#[derive(Debug)]
pub struct JsonLinesStore {
    path: PathBuf,
    entries: Mutex<Option<HashMap<String, String>>>,
}

#[derive(Serialize, Deserialize)]
struct Record {
    key: String,
    value: String,
}

impl JsonLinesStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            entries: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(path: &Path) -> HashMap<String, String> {
        let content = match fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return HashMap::new(),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable response cache");
                return HashMap::new();
            }
        };

        let mut entries = HashMap::new();
        let mut skipped = 0usize;
        for line in content.lines().filter(|l| !l.trim().is_empty()) {
            match serde_json::from_str::<Record>(line) {
                Ok(record) => {
                    entries.insert(record.key, record.value);
                }
                Err(_) => skipped += 1,
            }
        }
        if skipped > 0 {
            tracing::warn!(path = %path.display(), skipped, "skipped malformed response cache lines");
        }
        entries
    }

    async fn append(&self, record: &Record) -> Result<(), CacheError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(&line).await?;
        file.flush().await?;
        Ok(())
    }
}

#[async_trait]
impl ResponseStore for JsonLinesStore {
    async fn get(&self, key: &str) -> Option<String> {
        let mut guard = self.entries.lock().await;
        if guard.is_none() {
            *guard = Some(Self::load(&self.path).await);
        }
        guard.as_ref().and_then(|m| m.get(key).cloned())
    }

    async fn put(&self, key: &str, value: String) {
        let mut guard = self.entries.lock().await;
        if guard.is_none() {
            *guard = Some(Self::load(&self.path).await);
        }
        let Some(entries) = guard.as_mut() else {
            return;
        };
        if entries.get(key) == Some(&value) {
            return;
        }

        let record = Record {
            key: key.to_string(),
            value,
        };
        if let Err(e) = self.append(&record).await {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to persist response cache");
        }
        entries.insert(record.key, record.value);
    }
}

/// Cache key for a prompt sent to a named model.
pub fn response_key(model: &str, prompt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(model.as_bytes());
    hasher.update(b"\n");
    hasher.update(prompt.as_bytes());
    hex::encode(hasher.finalize())
}

/// Answers repeated prompts from a [`ResponseStore`]. Failures are not cached.
pub struct Cached<O, S> {
    inner: O,
    store: S,
}

impl<O: Oracle, S: ResponseStore> Cached<O, S> {
    pub fn new(inner: O, store: S) -> Self {
        Self { inner, store }
    }

    pub fn inner(&self) -> &O {
        &self.inner
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}

#[async_trait]
impl<O: Oracle, S: ResponseStore> Oracle for Cached<O, S> {
    async fn complete(&self, prompt: &str) -> Result<String, OracleError> {
        let key = response_key(self.inner.name(), prompt);
        if let Some(hit) = self.store.get(&key).await {
            tracing::debug!(key = %key, "oracle response cache hit");
            return Ok(hit);
        }
        let answer = self.inner.complete(prompt).await?;
        self.store.put(&key, answer.clone()).await;
        Ok(answer)
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}
