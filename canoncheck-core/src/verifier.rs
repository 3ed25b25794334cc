//! Claim Verifier: one oracle call per claim, reduced to a [`Verdict`].
//!
//! Parsing is two-phase. First the greedy `{...}` span of the answer is
//! decoded into `{label, reason}`; if that fails or the label is not one of
//! the three known labels, keywords in the lowercased answer decide. Nothing
//! here returns an error: bad output and unreachable oracles become UNKNOWN.

use crate::oracle::{complete_or_marker, extract_json_object, is_error_marker, Oracle, ERROR_MARKER};
use crate::types::{Label, Verdict};
use serde::Deserialize;

/// Most evidence passages placed in one prompt.
pub const MAX_EVIDENCE: usize = 5;

/// Separator between evidence passages in the prompt.
pub const EVIDENCE_SEPARATOR: &str = "\n---\n";

pub const NO_EVIDENCE_REASON: &str = "no evidence found";
pub const NO_OUTPUT_REASON: &str = "oracle gave no usable output";
pub const MISSING_REASON: &str = "No explanation provided.";

#[derive(Debug, Deserialize)]
struct RawVerdict {
    label: String,
    #[serde(default)]
    reason: Option<String>,
}

/// Classifies claims against evidence through a reasoning oracle.
pub struct ClaimVerifier<O> {
    oracle: O,
    max_evidence: usize,
}

impl<O: Oracle> ClaimVerifier<O> {
    pub fn new(oracle: O) -> Self {
        Self {
            oracle,
            max_evidence: MAX_EVIDENCE,
        }
    }

    /// Lower the evidence cap. Values above [`MAX_EVIDENCE`] are clamped.
    pub fn with_max_evidence(mut self, max: usize) -> Self {
        self.max_evidence = max.clamp(1, MAX_EVIDENCE);
        self
    }

    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    /// Judge `claim` against `evidence`. Always yields a verdict.
    pub async fn verify(&self, claim: &str, evidence: &[String]) -> Verdict {
        if evidence.is_empty() {
            return Verdict::unknown(NO_EVIDENCE_REASON);
        }

        let prompt = build_prompt(claim, &evidence[..evidence.len().min(self.max_evidence)]);
        let raw = complete_or_marker(&self.oracle, &prompt).await;
        let verdict = parse_verdict(&raw);
        tracing::debug!(claim, label = %verdict.label, "claim verified");
        verdict
    }
}

/// Prompt asking for a JSON verdict, with plain-text labels as a fallback.
pub fn build_prompt(claim: &str, evidence: &[String]) -> String {
    let evidence = evidence.join(EVIDENCE_SEPARATOR);
    format!(
        r#"Claim:
{claim}

Evidence:
{evidence}

Decide:
SUPPORT / CONTRADICT / UNKNOWN

If possible return JSON:
{{
  "label": "...",
  "reason": "..."
}}
Otherwise return plain text starting with:
SUPPORT / CONTRADICT / UNKNOWN
"#
    )
}

/// Reduce raw oracle output to a verdict.
pub fn parse_verdict(raw: &str) -> Verdict {
    if raw.trim().is_empty() {
        return Verdict::unknown(NO_OUTPUT_REASON);
    }
    if is_error_marker(raw) {
        let detail = raw.trim_start().trim_start_matches(ERROR_MARKER).trim();
        return Verdict::unknown(format!("oracle unavailable: {detail}"));
    }
    if let Some(verdict) = parse_structured(raw) {
        return verdict;
    }
    detect_keywords(raw)
}

fn parse_structured(raw: &str) -> Option<Verdict> {
    let span = extract_json_object(raw)?;
    let parsed: RawVerdict = serde_json::from_str(span).ok()?;
    let label = Label::parse(&parsed.label)?;
    let reason = parsed
        .reason
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty())
        .unwrap_or_else(|| MISSING_REASON.to_string());
    Some(Verdict::new(label, reason))
}

fn detect_keywords(raw: &str) -> Verdict {
    let text = raw.to_lowercase();
    if text.contains("contradict") {
        Verdict::contradict("The story contradicts this claim.")
    } else if text.contains("support") {
        Verdict::support("The story supports this claim.")
    } else {
        Verdict::unknown("Not enough evidence in the story to verify this claim.")
    }
}
