//! Test doubles for the oracle seams.
//!
//! - `ScriptedOracle` answers from a script, either in call order or by
//!   matching a substring of the prompt (stable under concurrent callers)
//! - `FailingOracle` always fails with a chosen error
//! - `CountingEmbedder` counts embed calls so cache behaviour can be asserted

use crate::embedding::{Embedder, HashingEmbedder};
use crate::error::{EmbedError, OracleError};
use crate::oracle::Oracle;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// An oracle that returns scripted responses.
pub struct ScriptedOracle {
    /// `(needle, response)`: the first rule whose needle occurs in the prompt wins.
    rules: Vec<(String, String)>,
    /// Served in order when no rule matches.
    queue: Mutex<VecDeque<Result<String, OracleError>>>,
    prompts: Mutex<Vec<String>>,
    calls: AtomicUsize,
}

impl ScriptedOracle {
    /// Answer successive calls with `responses`, in order.
    pub fn new<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::from_results(responses.into_iter().map(|r| Ok(r.into())).collect())
    }

    /// Successive results, including failures.
    pub fn from_results(results: Vec<Result<String, OracleError>>) -> Self {
        Self {
            rules: Vec::new(),
            queue: Mutex::new(results.into()),
            prompts: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Answer any prompt containing `needle` with `response`.
    pub fn with_rule(mut self, needle: impl Into<String>, response: impl Into<String>) -> Self {
        self.rules.push((needle.into(), response.into()));
        self
    }

    /// Number of `complete` calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Every prompt received, in arrival order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Oracle for ScriptedOracle {
    async fn complete(&self, prompt: &str) -> Result<String, OracleError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }

        if let Some((_, response)) = self.rules.iter().find(|(needle, _)| prompt.contains(needle)) {
            return Ok(response.clone());
        }

        let next = self.queue.lock().ok().and_then(|mut q| q.pop_front());
        next.unwrap_or_else(|| Err(OracleError::Unavailable("script exhausted".to_string())))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// An oracle that never answers.
pub struct FailingOracle {
    error: OracleError,
    calls: AtomicUsize,
}

impl FailingOracle {
    pub fn new(error: OracleError) -> Self {
        Self {
            error,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn rate_limited() -> Self {
        Self::new(OracleError::RateLimited { retry_after: None })
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(OracleError::Unavailable(message.into()))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Oracle for FailingOracle {
    async fn complete(&self, _prompt: &str) -> Result<String, OracleError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(self.error.clone())
    }

    fn name(&self) -> &str {
        "failing"
    }
}

/// Hashing embedder that counts how often it is asked to embed.
#[derive(Debug, Default)]
pub struct CountingEmbedder {
    inner: HashingEmbedder,
    calls: AtomicUsize,
    texts: AtomicUsize,
}

impl CountingEmbedder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `embed` calls.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Total texts embedded across all calls.
    pub fn texts(&self) -> usize {
        self.texts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Embedder for CountingEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.texts.fetch_add(texts.len(), Ordering::SeqCst);
        // Lets concurrent builders overlap.
        tokio::task::yield_now().await;
        self.inner.embed(texts).await
    }

    fn model_id(&self) -> &str {
        self.inner.model_id()
    }
}
