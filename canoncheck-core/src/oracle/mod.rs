//! Reasoning oracle seam.
//!
//! An oracle turns a prompt into free text. Failures are values
//! ([`OracleError`]); retry and caching are decorators layered on top
//! ([`Retrying`], [`Cached`]) so callers only ever deal with `complete`.

pub mod anthropic;
pub mod cache;
pub mod retry;

pub use self::anthropic::ClaudeOracle;
pub use self::cache::{Cached, JsonLinesStore, MemoryStore, ResponseStore};
pub use self::retry::Retrying;

use crate::error::OracleError;
use async_trait::async_trait;

/// Prefix of the text returned by [`complete_or_marker`] when the oracle failed.
pub const ERROR_MARKER: &str = "[LLM ERROR]";

/// A generative text service.
#[async_trait]
pub trait Oracle: Send + Sync {
    /// Answer a single prompt.
    async fn complete(&self, prompt: &str) -> Result<String, OracleError>;

    /// Identifier of the underlying model, used in cache keys.
    fn name(&self) -> &str;
}

#[async_trait]
impl<O: Oracle + ?Sized> Oracle for std::sync::Arc<O> {
    async fn complete(&self, prompt: &str) -> Result<String, OracleError> {
        (**self).complete(prompt).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Call the oracle, reporting failure as text starting with [`ERROR_MARKER`].
pub async fn complete_or_marker<O: Oracle + ?Sized>(oracle: &O, prompt: &str) -> String {
    match oracle.complete(prompt).await {
        Ok(text) => text,
        Err(e) => {
            tracing::warn!(oracle = oracle.name(), error = %e, "oracle call failed");
            format!("{ERROR_MARKER} {e}")
        }
    }
}

/// Whether `text` is a failure report produced by [`complete_or_marker`].
pub fn is_error_marker(text: &str) -> bool {
    text.trim_start().starts_with(ERROR_MARKER)
}

/// The span from the first `{` to the last `}`, if there is one.
///
/// Models often wrap JSON in prose or code fences; the greedy span covers
/// both. Whether the span actually parses is the caller's concern.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}
