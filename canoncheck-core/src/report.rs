//! Flat, serializable results for report consumers.

use crate::aggregate::Tally;
use crate::types::{Claim, Decision, Label, Prediction, Verdict};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One evaluated claim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimRow {
    pub claim: String,
    pub label: Label,
    pub reason: String,
    /// Passages the verifier was shown.
    pub evidence_count: usize,
}

impl ClaimRow {
    pub fn new(claim: &Claim, verdict: Verdict, evidence_count: usize) -> Self {
        Self {
            claim: claim.text.clone(),
            label: verdict.label,
            reason: verdict.reason,
            evidence_count,
        }
    }

    pub fn verdict(&self) -> Verdict {
        Verdict::new(self.label, self.reason.clone())
    }
}

/// Everything one run produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    pub decision: Decision,
    pub rows: Vec<ClaimRow>,
    pub tally: Tally,
    pub chunk_count: usize,
}

impl fmt::Display for Analysis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Prediction: {}", self.decision.prediction)?;
        writeln!(f, "Confidence: {:.2}%", self.decision.confidence)?;
        writeln!(f, "Rationale:  {}", self.decision.rationale)?;
        writeln!(f, "Chunks:     {}", self.chunk_count)?;
        for (i, row) in self.rows.iter().enumerate() {
            writeln!(
                f,
                "  {}. [{}] {} ({} passages): {}",
                i + 1,
                row.label,
                row.claim,
                row.evidence_count,
                row.reason
            )?;
        }
        Ok(())
    }
}

/// One line of batch input. `id` may be a JSON string or number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackstoryInput {
    #[serde(deserialize_with = "id_from_string_or_number")]
    pub id: String,
    pub backstory: String,
}

fn id_from_string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number id, got {other}"
        ))),
    }
}

/// One line of batch output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchRecord {
    pub id: String,
    pub prediction: Prediction,
    /// 1 for consistent, 0 otherwise.
    pub flag: u8,
    pub confidence: f64,
    pub rationale: String,
    pub claims_checked: usize,
}

impl BatchRecord {
    pub fn new(id: impl Into<String>, analysis: &Analysis) -> Self {
        Self {
            id: id.into(),
            prediction: analysis.decision.prediction,
            flag: analysis.decision.prediction.as_flag(),
            confidence: analysis.decision.confidence,
            rationale: analysis.decision.rationale.clone(),
            claims_checked: analysis.rows.len(),
        }
    }
}
