//! Decision lanes and the per-prediction decision record.
//!
//! Every `predict` call resolves to exactly one of four lanes. "Failure" to
//! answer is data, not an error: an unknown stimulus abstains, a weakly-known
//! one asks, and a rate-limited one abstains knowingly.

use serde::{Deserialize, Serialize};

use crate::handle::HandleId;
use crate::signature::{Seq, format_act};

/// The four-way outcome of a prediction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Lane {
    /// Commit to a concrete response.
    Assert,
    /// Ask a templated clarifying question.
    Question,
    /// Something is known but gating (or cooldown) blocks both lanes above.
    AbstainKnown,
    /// Nothing at all is known about this stimulus.
    AbstainUnknown,
}

impl Lane {
    /// Lanes that did not commit to a response.
    pub fn is_silent(&self) -> bool {
        matches!(
            self,
            Lane::Question | Lane::AbstainKnown | Lane::AbstainUnknown
        )
    }
}

impl std::fmt::Display for Lane {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Lane::Assert => "ASSERT",
            Lane::Question => "QUESTION",
            Lane::AbstainKnown => "ABSTAIN_KNOWN",
            Lane::AbstainUnknown => "ABSTAIN_UNKNOWN",
        };
        f.write_str(s)
    }
}

/// Why a non-assert lane was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionReason {
    /// No candidate cleared the eligibility floor; nudged to a question.
    PreEligibleNudge,
    /// Candidates exist but none clear the strength gate.
    WeakKnowledge,
    /// Two or more strong candidates within the conflict margin.
    Conflict,
    /// The trainer forced a question for an ambiguous or uncertain sample.
    UncertaintyPreferred,
    /// The oracle's ground truth is multi-label.
    AmbiguousOracle,
    /// Forced assertion after the round's question budget ran out.
    BudgetProbe,
    /// Forced assertion during an active drift burst.
    DriftProbe,
}

/// Diagnostic metadata attached to every decision.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DecisionMeta {
    /// Handles matching the stimulus signature, before any filtering.
    pub candidate_count: usize,
    /// Candidates clearing the eligibility floor.
    pub eligible_count: usize,
    pub had_any_match: bool,
    pub was_proto_seeded_predecision: bool,
    pub on_cooldown: bool,
    /// Set when an abstain was nudged into a question.
    pub nudge: bool,
    /// Set on forced assertions (budget exhaustion or drift burst).
    pub probe: bool,
    pub reason: Option<DecisionReason>,
    /// Top-ranked candidate (chosen handle for asserts).
    pub top1: Option<HandleId>,
    pub top2: Option<HandleId>,
    /// Strength margin between the top two active candidates.
    pub margin: Option<f64>,
    pub strength: Option<f64>,
    pub eligibility: Option<f64>,
    pub truth: Option<f64>,
}

/// The output of one `predict` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub lane: Lane,
    /// Concrete response payload; present only for [`Lane::Assert`].
    pub response: Option<Seq>,
    /// Templated question text; present only for [`Lane::Question`].
    pub question: Option<String>,
    pub meta: DecisionMeta,
}

impl Decision {
    pub fn abstain_unknown(meta: DecisionMeta) -> Self {
        Self {
            lane: Lane::AbstainUnknown,
            response: None,
            question: None,
            meta,
        }
    }

    pub fn abstain_known(meta: DecisionMeta) -> Self {
        Self {
            lane: Lane::AbstainKnown,
            response: None,
            question: None,
            meta,
        }
    }

    pub fn question(text: String, meta: DecisionMeta) -> Self {
        Self {
            lane: Lane::Question,
            response: None,
            question: Some(text),
            meta,
        }
    }

    pub fn assert(response: Seq, meta: DecisionMeta) -> Self {
        Self {
            lane: Lane::Assert,
            response: Some(response),
            question: None,
            meta,
        }
    }
}

// ---------------------------------------------------------------------------
// Question templates
// ---------------------------------------------------------------------------
// Questions are templated strings over the top response signatures, never
// generated language.

/// Knowledge exists but is below the prediction gate.
pub fn weak_knowledge_question(top1_sig: &str, top2_sig: &str) -> String {
    format!(
        "I'm close — is the correct act {} or {}?",
        format_act(top1_sig),
        format_act(top2_sig)
    )
}

/// Multiple strong handles compete with a low margin.
pub fn conflict_question(top1_sig: &str, top2_sig: &str) -> String {
    format!(
        "I'm seeing both {} and {} strongly — which one matches your intent/context?",
        format_act(top1_sig),
        format_act(top2_sig)
    )
}

/// The oracle response itself is multi-label.
pub fn ambiguous_oracle_question(top1_sig: &str, top2_sig: &str) -> String {
    format!(
        "This looks ambiguous (multiple valid acts). Which should I choose: {} or {}?",
        format_act(top1_sig),
        format_act(top2_sig)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silent_lanes() {
        assert!(!Lane::Assert.is_silent());
        assert!(Lane::Question.is_silent());
        assert!(Lane::AbstainKnown.is_silent());
        assert!(Lane::AbstainUnknown.is_silent());
    }

    #[test]
    fn lane_serializes_to_wire_names() {
        assert_eq!(serde_json::to_string(&Lane::Assert).unwrap(), "\"ASSERT\"");
        assert_eq!(
            serde_json::to_string(&Lane::AbstainUnknown).unwrap(),
            "\"ABSTAIN_UNKNOWN\""
        );
    }

    #[test]
    fn templates_embed_formatted_acts() {
        let q = weak_knowledge_question("5", "0");
        assert!(q.contains("[5]"));
        assert!(q.contains("[]"));

        let q = conflict_question("5,7", "7");
        assert!(q.contains("[5 7]"));
        assert!(q.contains("[7]"));
    }
}
