//! Aggregator: many verdicts in, one decision out.
//!
//! The rule is a majority vote biased toward contradiction: a tie, including
//! the all-UNKNOWN case, reads as "not proven" and yields INCONSISTENT.
//!
//! Confidence is an explainable heuristic, not a calibrated probability:
//!
//! ```text
//! strongest = max(support, contradict)
//! strongest == 0  => 20
//! otherwise       => clamp(100 * strongest / n
//!                          - 30 * unknown / n
//!                          - (20 if n < 3), 10, 95)
//! ```
//!
//! rounded to two decimals.

use crate::error::AggregateError;
use crate::types::{Decision, Label, Prediction, Verdict};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Confidence when no verdict took a side.
pub const NO_SIGNAL_CONFIDENCE: f64 = 20.0;
pub const MIN_CONFIDENCE: f64 = 10.0;
pub const MAX_CONFIDENCE: f64 = 95.0;

/// Weight of the UNKNOWN share in the penalty.
const UNKNOWN_WEIGHT: f64 = 0.3;
/// Applied when fewer than [`SPARSE_BELOW`] verdicts were cast.
const SPARSITY_PENALTY: f64 = 20.0;
const SPARSE_BELOW: usize = 3;

pub const TIE_REASON: &str = "No strong evidence";

/// Per-label counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tally {
    pub support: usize,
    pub contradict: usize,
    pub unknown: usize,
}

impl Tally {
    pub fn from_verdicts(verdicts: &[Verdict]) -> Self {
        let mut tally = Self::default();
        for v in verdicts {
            tally.add(v.label);
        }
        tally
    }

    pub fn add(&mut self, label: Label) {
        match label {
            Label::Support => self.support += 1,
            Label::Contradict => self.contradict += 1,
            Label::Unknown => self.unknown += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.support + self.contradict + self.unknown
    }

    pub fn strongest(&self) -> usize {
        self.support.max(self.contradict)
    }
}

impl fmt::Display for Tally {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SUPPORT:{}, CONTRADICT:{}, UNKNOWN:{}",
            self.support, self.contradict, self.unknown
        )
    }
}

/// Fold verdicts into a decision. Requires at least one verdict.
pub fn decide(verdicts: &[Verdict]) -> Result<Decision, AggregateError> {
    if verdicts.is_empty() {
        return Err(AggregateError::NoVerdicts);
    }

    let tally = Tally::from_verdicts(verdicts);
    let first_reason = |label: Label| {
        verdicts
            .iter()
            .find(|v| v.label == label)
            .map(|v| v.reason.as_str())
            .unwrap_or_default()
    };

    let (prediction, reason) = if tally.contradict > tally.support {
        (Prediction::Inconsistent, first_reason(Label::Contradict))
    } else if tally.support > tally.contradict {
        (Prediction::Consistent, first_reason(Label::Support))
    } else {
        (Prediction::Inconsistent, TIE_REASON)
    };

    Ok(Decision {
        prediction,
        rationale: format!("{reason} | {tally}"),
        confidence: confidence(&tally),
    })
}

/// Heuristic confidence for a tally; see the module docs.
pub fn confidence(tally: &Tally) -> f64 {
    let n = tally.total();
    let strongest = tally.strongest();
    if n == 0 || strongest == 0 {
        return NO_SIGNAL_CONFIDENCE;
    }

    let n_f = n as f64;
    let base = 100.0 * strongest as f64 / n_f;
    let unknown_penalty = 100.0 * tally.unknown as f64 / n_f * UNKNOWN_WEIGHT;
    let sparsity_penalty = if n < SPARSE_BELOW { SPARSITY_PENALTY } else { 0.0 };

    let raw = (base - unknown_penalty - sparsity_penalty).clamp(MIN_CONFIDENCE, MAX_CONFIDENCE);
    (raw * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Label::{Contradict as C, Support as S, Unknown as U};

    fn verdicts(labels: &[Label]) -> Vec<Verdict> {
        labels
            .iter()
            .enumerate()
            .map(|(i, &l)| Verdict::new(l, format!("{l} #{i}")))
            .collect()
    }

    #[test]
    fn test_majority_support() {
        let d = decide(&verdicts(&[S, S, C])).unwrap();
        assert_eq!(d.prediction, Prediction::Consistent);
        assert_eq!(d.rationale, "SUPPORT #0 | SUPPORT:2, CONTRADICT:1, UNKNOWN:0");
        assert_eq!(d.confidence, 66.67);
    }

    #[test]
    fn test_majority_contradict_uses_first_contradiction() {
        let d = decide(&verdicts(&[S, C, C])).unwrap();
        assert_eq!(d.prediction, Prediction::Inconsistent);
        assert!(d.rationale.starts_with("CONTRADICT #1 | "));
    }

    #[test]
    fn test_all_unknown() {
        let d = decide(&verdicts(&[U, U])).unwrap();
        assert_eq!(d.prediction, Prediction::Inconsistent);
        assert_eq!(d.confidence, NO_SIGNAL_CONFIDENCE);
        assert_eq!(d.rationale, "No strong evidence | SUPPORT:0, CONTRADICT:0, UNKNOWN:2");
    }

    #[test]
    fn test_tie_is_inconsistent() {
        let d = decide(&verdicts(&[S, C])).unwrap();
        assert_eq!(d.prediction, Prediction::Inconsistent);
        assert!(d.rationale.starts_with(TIE_REASON));
        // 50 - 0 - 20
        assert_eq!(d.confidence, 30.0);
    }

    #[test]
    fn test_empty_is_rejected() {
        assert_eq!(decide(&[]), Err(AggregateError::NoVerdicts));
    }

    #[test]
    fn test_confidence_penalties() {
        // Single support: 100 - 0 - 20
        assert_eq!(confidence(&Tally { support: 1, contradict: 0, unknown: 0 }), 80.0);
        // Unanimous and plentiful: capped
        assert_eq!(confidence(&Tally { support: 5, contradict: 0, unknown: 0 }), MAX_CONFIDENCE);
        // 1/4 decided, 3/4 unknown: 25 - 22.5 = 2.5, floored
        assert_eq!(confidence(&Tally { support: 1, contradict: 0, unknown: 3 }), MIN_CONFIDENCE);
        // 2 support, 1 unknown: 66.67 - 10
        assert_eq!(confidence(&Tally { support: 2, contradict: 0, unknown: 1 }), 56.67);
    }

    #[test]
    fn test_confidence_bounds_hold_for_small_tallies() {
        for s in 0..6 {
            for c in 0..6 {
                for u in 0..6 {
                    let tally = Tally { support: s, contradict: c, unknown: u };
                    if tally.total() == 0 {
                        continue;
                    }
                    let conf = confidence(&tally);
                    if tally.strongest() == 0 {
                        assert_eq!(conf, NO_SIGNAL_CONFIDENCE);
                    } else {
                        assert!((MIN_CONFIDENCE..=MAX_CONFIDENCE).contains(&conf), "{tally}: {conf}");
                    }
                }
            }
        }
    }
}
