//! Handle: a revocable stimulus→response hypothesis.
//!
//! Confidence is split into two unit-interval scalars:
//!
//! - `eligibility`: discoverability / relevance. Grows on any observed match
//!   (correct or not, as long as the stimulus matches), shrinks on mismatch,
//!   decays over time, and may be nudged directly by the training layer.
//! - `truth`: evidence-backed correctness. Changes ONLY inside an explicitly
//!   supervised update (`update_truth = true`); inert everywhere else.
//!
//! A handle's gating score is `strength = min(eligibility, truth)`: it cannot
//! be strong without both relevance and proven correctness. A smoother
//! truth-weighted-by-sigmoid(eligibility) combination was once floated; the
//! min form is the authoritative contract.

use serde::{Deserialize, Serialize};

use crate::signature::EMPTY_SIG;

/// Eligibility (and, when supervised, truth) gain on a matched observation.
pub const MATCH_REINFORCE: f64 = 0.08;

/// Eligibility (and, when supervised, truth) loss on a mismatched observation.
pub const MISMATCH_PENALTY: f64 = 0.12;

/// Stable, opaque identifier for a handle, assigned sequentially at creation.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct HandleId(pub u64);

impl HandleId {
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for HandleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "H{:03}", self.0)
    }
}

/// A provisional mapping from a stimulus signature to a response signature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Handle {
    pub id: HandleId,
    pub stimulus_sig: String,
    /// `"0"` is the placeholder for a proto-seeded handle whose response is
    /// not yet known.
    pub response_sig: String,
    pub eligibility: f64,
    pub truth: f64,
    pub hits: u32,
    pub misses: u32,
}

impl Handle {
    pub fn new(
        id: HandleId,
        stimulus_sig: impl Into<String>,
        response_sig: impl Into<String>,
        eligibility: f64,
        truth: f64,
    ) -> Self {
        Self {
            id,
            stimulus_sig: stimulus_sig.into(),
            response_sig: response_sig.into(),
            eligibility: eligibility.clamp(0.0, 1.0),
            truth: truth.clamp(0.0, 1.0),
            hits: 0,
            misses: 0,
        }
    }

    /// Combined gating score: `min(eligibility, truth)`.
    pub fn strength(&self) -> f64 {
        self.eligibility.min(self.truth)
    }

    /// Whether this is an unadopted proto-seeded placeholder.
    pub fn is_unadopted_proto(&self) -> bool {
        self.response_sig == EMPTY_SIG && self.hits == 0 && self.misses == 0
    }

    /// Apply one observation outcome.
    ///
    /// Eligibility always moves; truth moves only when `update_truth` is set,
    /// which callers may assert only for supervised correction events.
    pub fn update(&mut self, matched: bool, update_truth: bool) {
        if matched {
            self.hits += 1;
            self.eligibility = (self.eligibility + MATCH_REINFORCE).min(1.0);
            if update_truth {
                self.truth = (self.truth + MATCH_REINFORCE).min(1.0);
            }
        } else {
            self.misses += 1;
            self.eligibility = (self.eligibility - MISMATCH_PENALTY).max(0.0);
            if update_truth {
                self.truth = (self.truth - MISMATCH_PENALTY).max(0.0);
            }
        }
    }

    /// Add directly to eligibility, clamped. Truth is never bumped this way.
    pub fn bump_eligibility(&mut self, amount: f64) {
        if amount > 0.0 {
            self.eligibility = (self.eligibility + amount).min(1.0);
        }
    }

    /// Subtract from both scalars, floored at zero (competitive suppression).
    pub fn inhibit(&mut self, amount: f64) {
        self.eligibility = (self.eligibility - amount).max(0.0);
        self.truth = (self.truth - amount).max(0.0);
    }

    /// One decay tick: eligibility decays at `rate`, truth at half that.
    pub fn decay(&mut self, rate: f64) {
        self.eligibility *= 1.0 - rate;
        self.truth *= 1.0 - rate * 0.5;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle(eligibility: f64, truth: f64) -> Handle {
        Handle::new(HandleId(1), "1,2", "7", eligibility, truth)
    }

    #[test]
    fn strength_is_min_of_components() {
        assert_eq!(handle(0.6, 0.3).strength(), 0.3);
        assert_eq!(handle(0.2, 0.9).strength(), 0.2);
    }

    #[test]
    fn matched_update_grows_eligibility_only_without_supervision() {
        let mut h = handle(0.5, 0.5);
        h.update(true, false);
        assert!((h.eligibility - 0.58).abs() < 1e-9);
        assert_eq!(h.truth, 0.5);
        assert_eq!(h.hits, 1);
    }

    #[test]
    fn supervised_update_moves_truth() {
        let mut h = handle(0.5, 0.5);
        h.update(true, true);
        assert!((h.truth - 0.58).abs() < 1e-9);

        h.update(false, true);
        assert!((h.truth - 0.46).abs() < 1e-9);
        assert_eq!(h.misses, 1);
    }

    #[test]
    fn updates_clamp_to_unit_interval() {
        let mut h = handle(0.98, 0.98);
        h.update(true, true);
        assert_eq!(h.eligibility, 1.0);
        assert_eq!(h.truth, 1.0);

        let mut l = handle(0.05, 0.05);
        l.update(false, true);
        assert_eq!(l.eligibility, 0.0);
        assert_eq!(l.truth, 0.0);
    }

    #[test]
    fn inhibition_floors_at_zero() {
        let mut h = handle(0.28, 0.28);
        h.inhibit(0.34);
        assert_eq!(h.eligibility, 0.0);
        assert_eq!(h.truth, 0.0);
    }

    #[test]
    fn decay_halves_rate_for_truth() {
        let mut h = handle(1.0, 1.0);
        h.decay(0.1);
        assert!((h.eligibility - 0.9).abs() < 1e-9);
        assert!((h.truth - 0.95).abs() < 1e-9);
    }

    #[test]
    fn proto_placeholder_detection() {
        let h = Handle::new(HandleId(2), "3,3", EMPTY_SIG, 0.25, 0.0);
        assert!(h.is_unadopted_proto());

        let mut adopted = h.clone();
        adopted.response_sig = "7".into();
        assert!(!adopted.is_unadopted_proto());
    }

    #[test]
    fn display_pads_id() {
        assert_eq!(HandleId(3).to_string(), "H003");
        assert_eq!(HandleId(120).to_string(), "H120");
    }
}
