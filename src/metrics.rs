//! Step metrics, response error scoring, and the error taxonomy.

use serde::{Deserialize, Serialize};

use crate::signature::{EMPTY_SIG, Pulse, Seq};

/// The reserved marker response recorded when the lane was a question.
pub const QUESTION_MARKER: &[Pulse] = &[999];

/// Fixed partial penalty scored for a question in place of a response.
pub const QUESTION_ERROR: f64 = 0.5;

/// What one observe call surfaces: predicted vs actual plus an error score
/// (0 = perfect match, higher = worse).
#[derive(Debug, Clone, PartialEq)]
pub struct StepMetrics {
    pub predicted: Seq,
    pub actual: Seq,
    pub error: f64,
}

/// Distance between two pulse sequences.
///
/// - exact match → 0
/// - the question marker → fixed 0.5
/// - otherwise 2× the length mismatch plus 0.25× the summed per-position
///   absolute difference over the overlap
pub fn response_error(pred: &[Pulse], actual: &[Pulse]) -> f64 {
    if pred == actual {
        return 0.0;
    }
    if pred == QUESTION_MARKER {
        return QUESTION_ERROR;
    }

    let mut err = (pred.len().abs_diff(actual.len()) as f64) * 2.0;
    for (p, a) in pred.iter().zip(actual.iter()) {
        err += (i64::from(*p) - i64::from(*a)).abs() as f64 * 0.25;
    }
    err
}

// ---------------------------------------------------------------------------
// Error taxonomy
// ---------------------------------------------------------------------------

/// Coarse classification of a prediction error, for diagnostics only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorCategory {
    None,
    /// Right shape (same length), wrong values.
    Metaphor,
    /// Small error close to the question-penalty range.
    NaMissed,
    /// Responded when silence was right, or stayed silent when a response was due.
    PolarityMissed,
    Other,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorCategory::None => "none",
            ErrorCategory::Metaphor => "metaphor",
            ErrorCategory::NaMissed => "na-missed",
            ErrorCategory::PolarityMissed => "polarity-missed",
            ErrorCategory::Other => "other",
        };
        f.write_str(s)
    }
}

/// Classify the error between predicted and actual signatures.
pub fn classify_error(pred_sig: &str, act_sig: &str, err: f64) -> ErrorCategory {
    if err == 0.0 {
        return ErrorCategory::None;
    }

    let pred_empty = pred_sig == EMPTY_SIG;
    let act_empty = act_sig == EMPTY_SIG;
    if pred_empty != act_empty {
        return ErrorCategory::PolarityMissed;
    }

    let len_of = |sig: &str| {
        if sig == EMPTY_SIG {
            0
        } else {
            sig.split(',').count()
        }
    };
    if len_of(pred_sig) == len_of(act_sig) {
        return ErrorCategory::Metaphor;
    }

    if err > 0.0 && err < 1.5 {
        return ErrorCategory::NaMissed;
    }

    ErrorCategory::Other
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_match_scores_zero() {
        assert_eq!(response_error(&[1, 2], &[1, 2]), 0.0);
        assert_eq!(response_error(&[], &[]), 0.0);
    }

    #[test]
    fn question_marker_scores_fixed_penalty() {
        assert_eq!(response_error(QUESTION_MARKER, &[7]), 0.5);
        assert_eq!(response_error(QUESTION_MARKER, &[]), 0.5);
    }

    #[test]
    fn length_mismatch_dominates() {
        // |2 - 0| * 2.0 = 4.0, no overlap
        assert_eq!(response_error(&[3, 3], &[]), 4.0);
        // |1 - 2| * 2.0 + |5 - 7| * 0.25 = 2.5
        assert_eq!(response_error(&[5], &[7, 1]), 2.5);
    }

    #[test]
    fn per_pulse_difference() {
        // same length: |4 - 7| * 0.25 = 0.75
        assert_eq!(response_error(&[4], &[7]), 0.75);
    }

    #[test]
    fn classify_polarity() {
        assert_eq!(
            classify_error("0", "5", 2.0),
            ErrorCategory::PolarityMissed
        );
        assert_eq!(
            classify_error("5", "0", 2.0),
            ErrorCategory::PolarityMissed
        );
    }

    #[test]
    fn classify_metaphor_same_length() {
        assert_eq!(classify_error("4", "7", 0.75), ErrorCategory::Metaphor);
    }

    #[test]
    fn classify_none_on_zero_error() {
        assert_eq!(classify_error("7", "7", 0.0), ErrorCategory::None);
    }

    #[test]
    fn classify_small_error_is_na_missed() {
        assert_eq!(classify_error("5,1", "5", 1.0), ErrorCategory::NaMissed);
    }
}
