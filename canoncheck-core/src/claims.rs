//! Claim extraction from backstory text.

use crate::oracle::{complete_or_marker, extract_json_object, is_error_marker, Oracle};
use crate::types::Claim;
use async_trait::async_trait;
use serde::Deserialize;

/// Sentences kept by the fallback extractor.
pub const FALLBACK_SENTENCES: usize = 3;

/// Turns a backstory into an ordered list of claims. An empty list is valid.
#[async_trait]
pub trait ClaimExtractor: Send + Sync {
    async fn extract(&self, backstory: &str) -> Vec<Claim>;
}

/// Offline extractor: the first few `.`-delimited sentences.
#[derive(Debug, Clone)]
pub struct SentenceExtractor {
    limit: usize,
}

impl SentenceExtractor {
    pub fn new(limit: usize) -> Self {
        Self { limit }
    }
}

impl Default for SentenceExtractor {
    fn default() -> Self {
        Self::new(FALLBACK_SENTENCES)
    }
}

#[async_trait]
impl ClaimExtractor for SentenceExtractor {
    async fn extract(&self, backstory: &str) -> Vec<Claim> {
        first_sentences(backstory, self.limit)
    }
}

/// Non-empty, trimmed sentences split on `.`, at most `limit` of them.
pub fn first_sentences(text: &str, limit: usize) -> Vec<Claim> {
    text.split('.')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .take(limit)
        .map(Claim::new)
        .collect()
}

#[derive(Debug, Deserialize)]
struct ClaimsResponse {
    claims: Vec<String>,
}

/// Asks the reasoning oracle for atomic claims, falling back to sentences.
pub struct OracleClaimExtractor<O> {
    oracle: O,
    fallback: SentenceExtractor,
}

impl<O: Oracle> OracleClaimExtractor<O> {
    pub fn new(oracle: O) -> Self {
        Self {
            oracle,
            fallback: SentenceExtractor::default(),
        }
    }

    pub fn oracle(&self) -> &O {
        &self.oracle
    }
}

#[async_trait]
impl<O: Oracle> ClaimExtractor for OracleClaimExtractor<O> {
    async fn extract(&self, backstory: &str) -> Vec<Claim> {
        let raw = complete_or_marker(&self.oracle, &build_prompt(backstory)).await;
        match parse_claims(&raw) {
            Some(claims) => {
                tracing::debug!(count = claims.len(), "extracted claims");
                claims
            }
            None => {
                tracing::warn!("claim extraction gave no usable JSON, using leading sentences");
                self.fallback.extract(backstory).await
            }
        }
    }
}

pub fn build_prompt(backstory: &str) -> String {
    format!(
        r#"Extract atomic factual claims from this backstory.
Return ONLY JSON in this format:
{{ "claims": ["...", "..."] }}

Backstory:
"""{backstory}""""#
    )
}

/// `Some` only for a well-formed `{"claims": [...]}` answer. Blank entries are dropped.
pub fn parse_claims(raw: &str) -> Option<Vec<Claim>> {
    if is_error_marker(raw) {
        return None;
    }
    let parsed: ClaimsResponse = serde_json::from_str(extract_json_object(raw)?).ok()?;
    Some(
        parsed
            .claims
            .into_iter()
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .map(Claim::from)
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FailingOracle, ScriptedOracle};

    const BACKSTORY: &str = "Alice was born in Lyon. She moved to Paris. She taught school. She retired early.";

    #[test]
    fn test_first_sentences() {
        let claims = first_sentences(BACKSTORY, 3);
        assert_eq!(
            claims,
            vec![
                Claim::new("Alice was born in Lyon"),
                Claim::new("She moved to Paris"),
                Claim::new("She taught school"),
            ]
        );
        assert!(first_sentences(" . .. ", 3).is_empty());
    }

    #[test]
    fn test_parse_claims() {
        let claims = parse_claims("```json\n{\"claims\": [\"A\", \"  \", \"B\"]}\n```").unwrap();
        assert_eq!(claims, vec![Claim::new("A"), Claim::new("B")]);
        assert_eq!(parse_claims(r#"{"claims": []}"#), Some(vec![]));
        assert_eq!(parse_claims(r#"{"facts": ["A"]}"#), None);
        assert_eq!(parse_claims("no json"), None);
    }

    #[tokio::test]
    async fn test_oracle_extraction() {
        let extractor = OracleClaimExtractor::new(ScriptedOracle::new([
            r#"{"claims": ["Alice lived in Paris.", "Alice was a doctor."]}"#,
        ]));
        let claims = extractor.extract("whatever").await;
        assert_eq!(claims.len(), 2);
        assert!(extractor.oracle().prompts()[0].contains("\"\"\"whatever\"\"\""));
    }

    #[tokio::test]
    async fn test_empty_claim_list_is_respected() {
        let extractor = OracleClaimExtractor::new(ScriptedOracle::new([r#"{"claims": []}"#]));
        assert!(extractor.extract(BACKSTORY).await.is_empty());
    }

    #[tokio::test]
    async fn test_falls_back_to_sentences() {
        let extractor = OracleClaimExtractor::new(FailingOracle::unavailable("offline"));
        let claims = extractor.extract(BACKSTORY).await;
        assert_eq!(claims.len(), FALLBACK_SENTENCES);
        assert_eq!(claims[0].text, "Alice was born in Lyon");
    }
}
