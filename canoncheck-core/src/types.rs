//! Core data model: chunks, claims, verdicts and the final decision.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A passage of the story. Chunks are produced once per story and never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Position in the story, starting at zero.
    pub index: usize,
    /// Whitespace-joined words of the passage.
    pub text: String,
}

/// An atomic factual statement taken from the backstory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claim {
    pub text: String,
}

impl Claim {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

impl From<&str> for Claim {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

impl From<String> for Claim {
    fn from(text: String) -> Self {
        Self { text }
    }
}

/// Judgment for one claim against its evidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Label {
    Support,
    Contradict,
    Unknown,
}

impl Label {
    /// All labels, in the order used for tri-count summaries.
    pub const ALL: [Label; 3] = [Label::Support, Label::Contradict, Label::Unknown];

    pub fn as_str(&self) -> &'static str {
        match self {
            Label::Support => "SUPPORT",
            Label::Contradict => "CONTRADICT",
            Label::Unknown => "UNKNOWN",
        }
    }

    /// Parse a label case-insensitively. Surrounding whitespace is ignored.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_uppercase().as_str() {
            "SUPPORT" => Some(Label::Support),
            "CONTRADICT" => Some(Label::Contradict),
            "UNKNOWN" => Some(Label::Unknown),
            _ => None,
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Label plus the oracle's (or the fallback's) explanation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub label: Label,
    pub reason: String,
}

impl Verdict {
    pub fn new(label: Label, reason: impl Into<String>) -> Self {
        Self {
            label,
            reason: reason.into(),
        }
    }

    pub fn support(reason: impl Into<String>) -> Self {
        Self::new(Label::Support, reason)
    }

    pub fn contradict(reason: impl Into<String>) -> Self {
        Self::new(Label::Contradict, reason)
    }

    pub fn unknown(reason: impl Into<String>) -> Self {
        Self::new(Label::Unknown, reason)
    }
}

/// Document-level outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Prediction {
    Consistent,
    Inconsistent,
}

impl Prediction {
    /// Submission encoding: 1 for consistent, 0 otherwise.
    pub fn as_flag(&self) -> u8 {
        match self {
            Prediction::Consistent => 1,
            Prediction::Inconsistent => 0,
        }
    }
}

impl fmt::Display for Prediction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Prediction::Consistent => f.write_str("Consistent"),
            Prediction::Inconsistent => f.write_str("Inconsistent"),
        }
    }
}

/// Terminal artifact of one analysis run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub prediction: Prediction,
    pub rationale: String,
    /// Heuristic confidence in `[10, 95]`, or exactly 20 when nothing was decided.
    pub confidence: f64,
}
