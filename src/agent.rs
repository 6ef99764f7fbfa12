//! The bootstrap agent: constraint-first online learner.
//!
//! The agent explores pulse sequences, predicts via the best matching handle,
//! and promotes handles when stable stimulus→response correlations appear.
//! Two entry points mutate the registry:
//!
//! - [`BootstrapAgent::predict`] picks one of four lanes per stimulus
//!   (assert / question / abstain-known / abstain-unknown) with cooldown and
//!   competitive gating.
//! - [`BootstrapAgent::observe`] applies decay, competitive reinforcement,
//!   inhibition, promotion, and proto-handle adoption for one exchange.
//!
//! Truth-update provenance is the load-bearing invariant: `observe` moves a
//! handle's truth only when the caller passes `update_truth = true`, which the
//! training layer asserts only for supervised correction events.

use std::collections::HashMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, LoomResult};
use crate::handle::HandleId;
use crate::lane::{
    Decision, DecisionMeta, DecisionReason, Lane, conflict_question, weak_knowledge_question,
};
use crate::metrics::{QUESTION_MARKER, StepMetrics, response_error};
use crate::registry::HandleRegistry;
use crate::signature::{EMPTY_SIG, Pulse, Seq, parse_signature, signature};

/// Eligibility a freshly promoted handle is born with (truth starts at 0).
pub const PROMOTED_ELIGIBILITY: f64 = 0.25;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Tunable surface of the agent. All unit-interval fields are validated at
/// construction; everything else is a free parameter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Seed for the exploration generator.
    pub seed: u64,
    /// Consistent observations of a pair before promotion creates a handle.
    pub promote_threshold: u32,
    /// Strength gate a candidate must clear to be assertable.
    pub min_strength_to_predict: f64,
    /// Error score at which the focus/obsession loop locks on.
    pub surprise_threshold: f64,
    /// How many exploration choices the focus lock biases.
    pub focus_repeats: u32,
    /// Probability a focused repeat mutates one pulse by ±1.
    pub focus_mutate_prob: f64,
    /// Per-observe eligibility decay rate (truth decays at half this rate).
    pub decay_rate: f64,
    /// Prune handles whose strength falls below this during decay (0 disables).
    pub prune_below: f64,
    /// Restrict competition to the top K candidates (0 = unrestricted).
    pub compete_topk: usize,
    /// Losers lose `winner_strength × inhibit_mult` from both scalars (0 disables).
    pub inhibit_mult: f64,
    /// Eligibility bump for a would-have-been-correct handle after silence (0 disables).
    pub silence_penalty: f64,
    /// Strength margin below which two strong candidates are a conflict.
    pub conflict_margin: f64,
    /// Eligibility floor for a handle to count as "known".
    pub eligibility_min_to_consider: f64,
    /// Truth floor used by diagnostics to separate speakable from gated handles.
    pub truth_min_to_speak: f64,
    /// Eagerly create a placeholder handle on first contact with a stimulus.
    pub seed_proto_handles: bool,
    /// Eligibility a proto-seeded handle starts with.
    pub seed_eligibility: f64,
    /// Steps to wait before re-asking a question for the same stimulus (0 disables).
    pub question_cooldown_n: u32,
    /// Extra eligibility granted on question-supervised events.
    pub question_eligibility_bump: f64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            promote_threshold: 4,
            min_strength_to_predict: 0.35,
            surprise_threshold: 1.5,
            focus_repeats: 4,
            focus_mutate_prob: 0.25,
            decay_rate: 0.0,
            prune_below: 0.0,
            compete_topk: 0,
            inhibit_mult: 0.0,
            silence_penalty: 0.0,
            conflict_margin: 0.1,
            eligibility_min_to_consider: 0.25,
            truth_min_to_speak: 0.35,
            seed_proto_handles: false,
            seed_eligibility: 0.25,
            question_cooldown_n: 0,
            question_eligibility_bump: 0.0,
        }
    }
}

impl AgentConfig {
    /// Reject out-of-range unit-interval fields at construction.
    pub fn validate(&self) -> LoomResult<()> {
        let unit_fields: [(&'static str, f64); 9] = [
            ("min_strength_to_predict", self.min_strength_to_predict),
            ("focus_mutate_prob", self.focus_mutate_prob),
            ("decay_rate", self.decay_rate),
            ("prune_below", self.prune_below),
            ("silence_penalty", self.silence_penalty),
            ("conflict_margin", self.conflict_margin),
            (
                "eligibility_min_to_consider",
                self.eligibility_min_to_consider,
            ),
            ("truth_min_to_speak", self.truth_min_to_speak),
            ("seed_eligibility", self.seed_eligibility),
        ];
        for (field, value) in unit_fields {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::OutOfRange { field, value }.into());
            }
        }
        if self.promote_threshold == 0 {
            return Err(ConfigError::PromoteThreshold {
                value: self.promote_threshold,
            }
            .into());
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Telemetry
// ---------------------------------------------------------------------------

/// Cumulative diagnostic counters, owned by the agent instance so multiple
/// agents can run independently in one process.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Telemetry {
    pub total_predict_calls: u64,
    pub sum_candidate_count: u64,
    pub total_multi_candidate_steps: u64,
    pub total_inhibitions: u64,
    pub proto_seeded: u64,
    pub silent_to_question_nudges: u64,
    pub question_repeats_blocked: u64,
}

// ---------------------------------------------------------------------------
// Agent
// ---------------------------------------------------------------------------

/// Constraint-first learner over stimulus→response handles.
pub struct BootstrapAgent {
    config: AgentConfig,
    registry: HandleRegistry,
    /// (stimulus_sig, response_sig) → consecutive observation count.
    seen_counts: HashMap<(String, String), u32>,
    focus_seq: Option<Seq>,
    focus_left: u32,
    /// Stimulus signature → step a question was last issued at.
    last_question_step: HashMap<String, u64>,
    current_step: u64,
    rng: StdRng,
    telemetry: Telemetry,
}

impl BootstrapAgent {
    pub fn new(config: AgentConfig) -> LoomResult<Self> {
        config.validate()?;
        let rng = StdRng::seed_from_u64(config.seed);
        Ok(Self {
            config,
            registry: HandleRegistry::new(),
            seen_counts: HashMap::new(),
            focus_seq: None,
            focus_left: 0,
            last_question_step: HashMap::new(),
            current_step: 0,
            rng,
            telemetry: Telemetry::default(),
        })
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn registry(&self) -> &HandleRegistry {
        &self.registry
    }

    /// Direct registry access, for seeding fixtures and diagnostics tooling.
    pub fn registry_mut(&mut self) -> &mut HandleRegistry {
        &mut self.registry
    }

    pub fn telemetry(&self) -> Telemetry {
        self.telemetry
    }

    pub fn current_step(&self) -> u64 {
        self.current_step
    }

    // -----------------------------------------------------------------------
    // Decision engine
    // -----------------------------------------------------------------------

    /// Pick a lane (and response, for asserts) for one stimulus.
    pub fn predict(&mut self, stimulus: &[Pulse]) -> Decision {
        self.current_step += 1;
        let sig = signature(stimulus);

        let mut matches = self.registry.matching(&sig);

        let mut was_proto_seeded = false;
        if matches.is_empty() && self.config.seed_proto_handles {
            // Response unknown at this point; the placeholder is adopted by
            // the first observe.
            let id = self
                .registry
                .create(&sig, EMPTY_SIG, self.config.seed_eligibility, 0.0);
            self.telemetry.proto_seeded += 1;
            tracing::debug!(handle = %id, stimulus = %sig, "proto-seeded placeholder handle");
            matches = vec![id];
            was_proto_seeded = true;
        }

        if matches.is_empty() {
            return Decision::abstain_unknown(DecisionMeta {
                candidate_count: 0,
                eligible_count: 0,
                had_any_match: false,
                ..Default::default()
            });
        }

        let on_cooldown = self.config.question_cooldown_n > 0
            && self.last_question_step.get(&sig).is_some_and(|&last| {
                self.current_step - last <= u64::from(self.config.question_cooldown_n)
            });

        let mut eligible: Vec<HandleId> = matches
            .iter()
            .copied()
            .filter(|id| {
                self.registry
                    .get(*id)
                    .is_some_and(|h| h.eligibility >= self.config.eligibility_min_to_consider)
            })
            .collect();

        let mut meta = DecisionMeta {
            candidate_count: matches.len(),
            eligible_count: eligible.len(),
            had_any_match: true,
            was_proto_seeded_predecision: was_proto_seeded,
            on_cooldown,
            ..Default::default()
        };

        if eligible.is_empty() {
            if on_cooldown {
                self.telemetry.question_repeats_blocked += 1;
                return Decision::abstain_known(meta);
            }
            // Nudge: something is registered, nothing is eligible yet — ask.
            self.telemetry.silent_to_question_nudges += 1;
            self.registry.rank(&mut matches);
            let top1 = self.registry.get(matches[0]).expect("ranked id");
            let top2_sig = matches
                .get(1)
                .and_then(|id| self.registry.get(*id))
                .map_or(EMPTY_SIG, |h| h.response_sig.as_str());
            let question = weak_knowledge_question(&top1.response_sig, top2_sig);
            meta.reason = Some(DecisionReason::PreEligibleNudge);
            meta.nudge = true;
            meta.top1 = Some(top1.id);
            self.last_question_step.insert(sig, self.current_step);
            return Decision::question(question, meta);
        }

        self.registry.rank(&mut eligible);

        let mut active: Vec<HandleId> = eligible
            .iter()
            .copied()
            .filter(|id| {
                self.registry
                    .get(*id)
                    .is_some_and(|h| h.strength() >= self.config.min_strength_to_predict)
            })
            .collect();
        if self.config.compete_topk > 0 {
            active.truncate(self.config.compete_topk);
        }

        if active.is_empty() {
            if on_cooldown {
                self.telemetry.question_repeats_blocked += 1;
                return Decision::abstain_known(meta);
            }
            let top1 = self.registry.get(eligible[0]).expect("ranked id");
            let top2_sig = eligible
                .get(1)
                .and_then(|id| self.registry.get(*id))
                .map_or(EMPTY_SIG, |h| h.response_sig.as_str());
            let question = weak_knowledge_question(&top1.response_sig, top2_sig);
            meta.reason = Some(DecisionReason::WeakKnowledge);
            meta.top1 = Some(top1.id);
            meta.eligibility = Some(top1.eligibility);
            meta.truth = Some(top1.truth);
            self.last_question_step.insert(sig, self.current_step);
            return Decision::question(question, meta);
        }

        if active.len() >= 2 {
            let h1 = self.registry.get(active[0]).expect("ranked id");
            let h2 = self.registry.get(active[1]).expect("ranked id");
            let margin = h1.strength() - h2.strength();
            meta.margin = Some(margin);
            if margin < self.config.conflict_margin {
                if on_cooldown {
                    self.telemetry.question_repeats_blocked += 1;
                    return Decision::abstain_known(meta);
                }
                let question = conflict_question(&h1.response_sig, &h2.response_sig);
                meta.reason = Some(DecisionReason::Conflict);
                meta.top1 = Some(h1.id);
                meta.top2 = Some(h2.id);
                meta.strength = Some(h1.strength());
                self.last_question_step.insert(sig, self.current_step);
                return Decision::question(question, meta);
            }
        }

        let winner = self.registry.get(active[0]).expect("ranked id");
        meta.top1 = Some(winner.id);
        meta.strength = Some(winner.strength());
        meta.eligibility = Some(winner.eligibility);
        meta.truth = Some(winner.truth);
        Decision::assert(parse_signature(&winner.response_sig), meta)
    }

    // -----------------------------------------------------------------------
    // Update engine
    // -----------------------------------------------------------------------

    /// Update internals based on one exchange.
    ///
    /// `update_truth` may only be asserted by a supervised correction event;
    /// `eligibility_bump` goes to the winning handle only, never to truth.
    /// With `learn = false` only correlation counting and promotion run.
    pub fn observe(
        &mut self,
        stimulus: &[Pulse],
        received: &[Pulse],
        learn: bool,
        update_truth: bool,
        eligibility_bump: f64,
    ) -> StepMetrics {
        let decision = self.predict(stimulus);
        let predicted: Seq = match decision.lane {
            Lane::Assert => decision.response.clone().unwrap_or_default(),
            Lane::Question => QUESTION_MARKER.to_vec(),
            _ => Vec::new(),
        };
        let error = response_error(&predicted, received);

        let sig = signature(stimulus);
        let recv_sig = signature(received);

        if !learn {
            // Correlation counting continues so handles can be discovered
            // without the agent having to assert first.
            self.count_pair_and_promote(&sig, &recv_sig);
            self.update_telemetry(&sig);
            return StepMetrics {
                predicted,
                actual: received.to_vec(),
                error,
            };
        }

        // Decay before any competitive mutation.
        let pruned = self
            .registry
            .decay_all(self.config.decay_rate, self.config.prune_below);
        if pruned > 0 {
            tracing::debug!(pruned, "pruned weak handles during decay");
        }

        // Surprise locks the obsession loop: repeat (or slightly mutate) this
        // stimulus for the next few exploration choices.
        if error >= self.config.surprise_threshold {
            self.focus_seq = Some(stimulus.to_vec());
            self.focus_left = self.config.focus_repeats;
        }

        let mut candidates = self.registry.matching(&sig);

        // A lone unadopted placeholder adopts the observed response.
        if candidates.len() == 1 {
            if let Some(h) = self.registry.get_mut(candidates[0]) {
                if h.is_unadopted_proto() {
                    h.response_sig = recv_sig.clone();
                }
            }
        }

        self.registry.rank(&mut candidates);
        let allowed: Vec<HandleId> = if self.config.compete_topk > 0 {
            candidates
                .iter()
                .take(self.config.compete_topk)
                .copied()
                .collect()
        } else {
            candidates.clone()
        };

        let mut winner: Option<HandleId> = None;
        for id in &allowed {
            let Some(h) = self.registry.get_mut(*id) else {
                continue;
            };
            if h.response_sig == recv_sig {
                h.update(true, update_truth);
                h.bump_eligibility(eligibility_bump);
                winner = Some(*id);
            } else {
                h.update(false, update_truth);
            }
        }
        let touched_any = !allowed.is_empty();

        self.count_pair_and_promote(&sig, &recv_sig);

        // Competitive suppression: losers pay in proportion to the winner's
        // post-update strength.
        if self.config.inhibit_mult > 0.0 {
            if let Some(winner_id) = winner {
                let suppression = self
                    .registry
                    .get(winner_id)
                    .map_or(0.0, |h| h.strength() * self.config.inhibit_mult);
                for id in &candidates {
                    if *id == winner_id {
                        continue;
                    }
                    if let Some(h) = self.registry.get_mut(*id) {
                        h.inhibit(suppression);
                        self.telemetry.total_inhibitions += 1;
                    }
                }
            }
        }

        self.update_telemetry(&sig);

        // If no candidate existed at mutation time, lightly reinforce an
        // exact-pair handle (possibly one promotion just created).
        if !touched_any {
            if let Some(id) = self.registry.find_pair(&sig, &recv_sig) {
                if let Some(h) = self.registry.get_mut(id) {
                    h.update(true, update_truth);
                    h.bump_eligibility(eligibility_bump);
                }
            }
        }

        // Missed chance to assert: boost the handle that would have been
        // correct. Eligibility only — truth is never gifted for silence.
        if self.config.silence_penalty > 0.0 && decision.lane.is_silent() && !received.is_empty()
        {
            if let Some(id) = self.registry.find_pair(&sig, &recv_sig) {
                if let Some(h) = self.registry.get_mut(id) {
                    h.bump_eligibility(self.config.silence_penalty);
                }
            }
        }

        StepMetrics {
            predicted,
            actual: received.to_vec(),
            error,
        }
    }

    fn count_pair_and_promote(&mut self, sig: &str, recv_sig: &str) {
        let count = self
            .seen_counts
            .entry((sig.to_string(), recv_sig.to_string()))
            .or_insert(0);
        *count += 1;
        if *count >= self.config.promote_threshold && !self.registry.pair_exists(sig, recv_sig) {
            let id = self
                .registry
                .create(sig, recv_sig, PROMOTED_ELIGIBILITY, 0.0);
            tracing::debug!(handle = %id, stimulus = %sig, response = %recv_sig, "promoted handle");
        }
    }

    fn update_telemetry(&mut self, sig: &str) {
        let n = self.registry.matching(sig).len() as u64;
        self.telemetry.total_predict_calls += 1;
        self.telemetry.sum_candidate_count += n;
        if n >= 2 {
            self.telemetry.total_multi_candidate_steps += 1;
        }
    }

    // -----------------------------------------------------------------------
    // Exploration policy
    // -----------------------------------------------------------------------

    /// Choose the next sequence to send.
    ///
    /// Early steps vary length heavily (to catch length-keyed rules); later
    /// steps mix random sequences with structured palindrome and 2:1-ratio
    /// probes. An active focus lock repeats (or slightly mutates) the
    /// surprising stimulus instead.
    pub fn choose_action(&mut self, step: u64) -> Seq {
        if self.focus_left > 0 {
            if let Some(focus) = self.focus_seq.clone() {
                self.focus_left -= 1;
                if !focus.is_empty() && self.rng.r#gen::<f64>() < self.config.focus_mutate_prob {
                    let idx = self.rng.gen_range(0..focus.len());
                    let delta: i64 = if self.rng.r#gen::<bool>() { 1 } else { -1 };
                    let mut out = focus;
                    out[idx] = (i64::from(out[idx]) + delta).max(1) as Pulse;
                    return out;
                }
                return focus;
            }
        }

        if step < 15 {
            let n = self.rng.gen_range(1..=7);
            return (0..n).map(|_| self.rng.gen_range(1..=7)).collect();
        }

        let roll: f64 = self.rng.r#gen();
        if roll < 0.35 {
            let n = self.rng.gen_range(2..=8);
            return (0..n).map(|_| self.rng.gen_range(1..=9)).collect();
        }

        if roll < 0.65 {
            // Palindrome probe.
            let half: Seq = (0..2).map(|_| self.rng.gen_range(1..=9)).collect();
            let mut out = half.clone();
            if self.rng.r#gen::<f64>() < 0.5 {
                out.push(self.rng.gen_range(1..=9));
            }
            out.extend(half.iter().rev());
            return out;
        }

        // 2:1 ratio probe.
        let b = self.rng.gen_range(1..=6);
        let mut out = vec![2 * b, b];
        let tail_len = self.rng.gen_range(0..=2);
        out.extend((0..tail_len).map(|_| self.rng.gen_range(1..=7)));
        out
    }
}

impl std::fmt::Debug for BootstrapAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BootstrapAgent")
            .field("config", &self.config)
            .field("handles", &self.registry.len())
            .field("current_step", &self.current_step)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agent(config: AgentConfig) -> BootstrapAgent {
        BootstrapAgent::new(config).unwrap()
    }

    fn seed_handle(
        a: &mut BootstrapAgent,
        stimulus: &str,
        response: &str,
        eligibility: f64,
        truth: f64,
    ) -> HandleId {
        a.registry_mut().create(stimulus, response, eligibility, truth)
    }

    #[test]
    fn invalid_config_rejected() {
        let cfg = AgentConfig {
            decay_rate: 1.2,
            ..Default::default()
        };
        assert!(BootstrapAgent::new(cfg).is_err());

        let cfg = AgentConfig {
            promote_threshold: 0,
            ..Default::default()
        };
        assert!(BootstrapAgent::new(cfg).is_err());
    }

    #[test]
    fn unknown_stimulus_abstains_unknown() {
        let mut a = agent(AgentConfig::default());
        let d = a.predict(&[9, 9]);
        assert_eq!(d.lane, Lane::AbstainUnknown);
        assert!(!d.meta.had_any_match);
        assert_eq!(a.registry().len(), 0);
    }

    #[test]
    fn proto_seeding_creates_exactly_one_placeholder() {
        let mut a = agent(AgentConfig {
            seed_proto_handles: true,
            seed_eligibility: 0.25,
            eligibility_min_to_consider: 0.1,
            ..Default::default()
        });

        let d1 = a.predict(&[1, 2, 3]);
        assert_eq!(d1.lane, Lane::Question);
        assert!(d1.meta.was_proto_seeded_predecision);
        assert_eq!(a.registry().len(), 1);

        let h = a.registry().iter().next().unwrap();
        assert_eq!(h.stimulus_sig, "1,2,3");
        assert_eq!(h.response_sig, EMPTY_SIG);
        assert_eq!(h.truth, 0.0);
        assert_eq!(h.eligibility, 0.25);

        // Second predict before any observe must not create a second handle.
        let d2 = a.predict(&[1, 2, 3]);
        assert!(!d2.meta.was_proto_seeded_predecision);
        assert_eq!(a.registry().len(), 1);
    }

    #[test]
    fn proto_seed_below_eligibility_floor_is_nudged() {
        let mut a = agent(AgentConfig {
            seed_proto_handles: true,
            seed_eligibility: 0.05,
            eligibility_min_to_consider: 0.1,
            ..Default::default()
        });
        let d = a.predict(&[1, 1]);
        assert_eq!(d.lane, Lane::Question);
        assert_eq!(d.meta.reason, Some(DecisionReason::PreEligibleNudge));
        assert!(d.meta.nudge);
    }

    #[test]
    fn weak_knowledge_routes_to_question() {
        let mut a = agent(AgentConfig {
            min_strength_to_predict: 0.5,
            ..Default::default()
        });
        seed_handle(&mut a, "1", "10", 0.3, 0.3);

        let d = a.predict(&[1]);
        assert_eq!(d.lane, Lane::Question);
        assert_eq!(d.meta.reason, Some(DecisionReason::WeakKnowledge));
        assert!(d.question.unwrap().contains("[10]"));
    }

    #[test]
    fn conflict_routes_to_question() {
        let mut a = agent(AgentConfig {
            min_strength_to_predict: 0.1,
            conflict_margin: 0.5,
            ..Default::default()
        });
        seed_handle(&mut a, "1", "10", 0.6, 0.6);
        seed_handle(&mut a, "1", "20", 0.5, 0.5);

        let d = a.predict(&[1]);
        assert_eq!(d.lane, Lane::Question);
        assert_eq!(d.meta.reason, Some(DecisionReason::Conflict));
        assert!((d.meta.margin.unwrap() - 0.1).abs() < 1e-9);
    }

    #[test]
    fn confident_handle_asserts() {
        let mut a = agent(AgentConfig::default());
        let id = seed_handle(&mut a, "4,6", "5", 0.8, 0.8);

        let d = a.predict(&[4, 6]);
        assert_eq!(d.lane, Lane::Assert);
        assert_eq!(d.response, Some(vec![5]));
        assert_eq!(d.meta.top1, Some(id));
    }

    #[test]
    fn question_cooldown_blocks_repeat() {
        let mut a = agent(AgentConfig {
            seed_proto_handles: true,
            question_cooldown_n: 2,
            eligibility_min_to_consider: 0.1,
            ..Default::default()
        });

        // Step 1: proto-seed then weak-knowledge question.
        let d1 = a.predict(&[1, 2]);
        assert_eq!(d1.lane, Lane::Question);

        // Steps 2 and 3: on cooldown → abstain-known.
        let d2 = a.predict(&[1, 2]);
        assert_eq!(d2.lane, Lane::AbstainKnown);
        assert!(d2.meta.on_cooldown);
        let d3 = a.predict(&[1, 2]);
        assert_eq!(d3.lane, Lane::AbstainKnown);
        assert!(d3.meta.on_cooldown);
        assert_eq!(a.telemetry().question_repeats_blocked, 2);

        // Step 4: cooldown expired, eligible to ask again.
        let d4 = a.predict(&[1, 2]);
        assert_eq!(d4.lane, Lane::Question);
        assert!(!d4.meta.on_cooldown);
    }

    #[test]
    fn topk_restricts_competition_in_predict() {
        let mut a = agent(AgentConfig {
            compete_topk: 1,
            min_strength_to_predict: 0.1,
            conflict_margin: 0.0,
            ..Default::default()
        });
        seed_handle(&mut a, "1", "10", 0.2, 0.2);
        seed_handle(&mut a, "1", "20", 0.5, 0.5);

        let d = a.predict(&[1]);
        assert_eq!(d.lane, Lane::Assert);
        assert_eq!(d.response, Some(vec![20]));
    }

    #[test]
    fn decay_reduces_strength_when_learning() {
        let mut a = agent(AgentConfig {
            decay_rate: 0.1,
            ..Default::default()
        });
        let id = seed_handle(&mut a, "1", "2", 1.0, 1.0);

        // Unrelated stimulus: decay runs, competitive update does not touch it.
        a.observe(&[9, 9], &[9, 9], true, true, 0.0);

        let h = a.registry().get(id).unwrap();
        assert!((h.eligibility - 0.9).abs() < 1e-9);
        assert!((h.truth - 0.95).abs() < 1e-9);
    }

    #[test]
    fn frozen_observe_does_not_decay_or_mutate() {
        let mut a = agent(AgentConfig {
            decay_rate: 0.1,
            ..Default::default()
        });
        let id = seed_handle(&mut a, "1", "2", 1.0, 1.0);

        a.observe(&[1], &[2], false, false, 0.0);

        let h = a.registry().get(id).unwrap();
        assert_eq!(h.eligibility, 1.0);
        assert_eq!(h.truth, 1.0);
        assert_eq!(h.hits, 0);
    }

    #[test]
    fn decay_prunes_below_floor() {
        let mut a = agent(AgentConfig {
            decay_rate: 0.5,
            prune_below: 0.6,
            ..Default::default()
        });
        seed_handle(&mut a, "1", "2", 1.0, 1.0);

        // eligibility 1.0 → 0.5; strength 0.5 < 0.6 → pruned.
        a.observe(&[1], &[2], true, true, 0.0);
        assert_eq!(a.registry().len(), 0);
    }

    #[test]
    fn truth_inert_without_supervision() {
        let mut a = agent(AgentConfig::default());
        let id = seed_handle(&mut a, "1,1", "5", 0.5, 0.5);

        a.observe(&[1, 1], &[5], true, false, 0.0);
        let h = a.registry().get(id).unwrap();
        assert!((h.eligibility - 0.58).abs() < 1e-9);
        assert_eq!(h.truth, 0.5);

        a.observe(&[1, 1], &[9], true, false, 0.0);
        let h = a.registry().get(id).unwrap();
        assert_eq!(h.truth, 0.5);
    }

    #[test]
    fn supervised_mismatch_lowers_truth() {
        let mut a = agent(AgentConfig::default());
        let id = seed_handle(&mut a, "1,1", "5", 0.5, 0.5);

        a.observe(&[1, 1], &[9], true, true, 0.0);
        let h = a.registry().get(id).unwrap();
        assert!((h.truth - 0.38).abs() < 1e-9);
        assert_eq!(h.misses, 1);
    }

    #[test]
    fn eligibility_bump_goes_to_winner_only() {
        let mut a = agent(AgentConfig::default());
        let win = seed_handle(&mut a, "1", "5", 0.3, 0.3);
        let lose = seed_handle(&mut a, "1", "7", 0.3, 0.3);

        a.observe(&[1], &[5], true, true, 0.5);

        let w = a.registry().get(win).unwrap();
        // 0.3 + 0.08 + 0.5
        assert!((w.eligibility - 0.88).abs() < 1e-9);
        // Truth gets the supervised +0.08 only, never the bump.
        assert!((w.truth - 0.38).abs() < 1e-9);

        let l = a.registry().get(lose).unwrap();
        assert!((l.eligibility - 0.18).abs() < 1e-9);
    }

    #[test]
    fn inhibition_worked_example() {
        // Winner at 0.6 → 0.68 after a matched update; co-candidate at 0.4
        // mismatches to 0.28, then loses 0.68 × 0.5 = 0.34 → floored at 0.
        let mut a = agent(AgentConfig {
            inhibit_mult: 0.5,
            ..Default::default()
        });
        let win = seed_handle(&mut a, "2", "5", 0.6, 0.6);
        let lose = seed_handle(&mut a, "2", "7", 0.4, 0.4);

        a.observe(&[2], &[5], true, true, 0.0);

        let w = a.registry().get(win).unwrap();
        assert!((w.strength() - 0.68).abs() < 1e-9);

        let l = a.registry().get(lose).unwrap();
        assert_eq!(l.eligibility, 0.0);
        assert_eq!(l.truth, 0.0);
        assert_eq!(a.telemetry().total_inhibitions, 1);
    }

    #[test]
    fn promotion_after_threshold_pairs() {
        let mut a = agent(AgentConfig {
            promote_threshold: 3,
            ..Default::default()
        });

        a.observe(&[1, 1], &[5], false, false, 0.0);
        a.observe(&[1, 1], &[5], false, false, 0.0);
        assert_eq!(a.registry().len(), 0);

        a.observe(&[1, 1], &[5], false, false, 0.0);
        assert_eq!(a.registry().len(), 1);
        let h = a.registry().iter().next().unwrap();
        assert_eq!(h.stimulus_sig, "1,1");
        assert_eq!(h.response_sig, "5");
        assert_eq!(h.truth, 0.0);

        // No duplicate for the same pair.
        a.observe(&[1, 1], &[5], false, false, 0.0);
        assert_eq!(a.registry().len(), 1);
    }

    #[test]
    fn lone_proto_adopts_observed_response() {
        let mut a = agent(AgentConfig {
            seed_proto_handles: true,
            ..Default::default()
        });
        a.predict(&[3, 3]);
        a.observe(&[3, 3], &[7], true, false, 0.0);

        let h = a.registry().iter().next().unwrap();
        assert_eq!(h.response_sig, "7");
        assert_eq!(h.hits, 1);
    }

    #[test]
    fn silence_penalty_boosts_correct_handle() {
        let mut a = agent(AgentConfig {
            silence_penalty: 0.1,
            min_strength_to_predict: 0.5,
            ..Default::default()
        });
        let id = seed_handle(&mut a, "1,1", "5", 0.2, 0.2);

        // Weak handle → silent lane; matched update +0.08 plus penalty +0.1,
        // on eligibility only.
        a.observe(&[1, 1], &[5], true, true, 0.0);

        let h = a.registry().get(id).unwrap();
        assert!((h.eligibility - 0.38).abs() < 1e-9);
        assert!((h.truth - 0.28).abs() < 1e-9);
        assert_eq!(h.hits, 1);
    }

    #[test]
    fn no_silence_penalty_when_disabled() {
        let mut a = agent(AgentConfig {
            min_strength_to_predict: 0.5,
            ..Default::default()
        });
        let id = seed_handle(&mut a, "1,1", "5", 0.2, 0.2);

        a.observe(&[1, 1], &[5], true, true, 0.0);
        let h = a.registry().get(id).unwrap();
        assert!((h.strength() - 0.28).abs() < 1e-9);
    }

    #[test]
    fn surprise_locks_focus_on_stimulus() {
        let mut a = agent(AgentConfig {
            surprise_threshold: 1.5,
            focus_repeats: 3,
            focus_mutate_prob: 0.0,
            ..Default::default()
        });
        // Silent vs a 2-pulse response: error 4.0 ≥ threshold.
        a.observe(&[6, 1], &[3, 3], true, false, 0.0);

        for step in 0..3 {
            assert_eq!(a.choose_action(step), vec![6, 1]);
        }
        // Lock exhausted: back to exploration.
        let free = a.choose_action(3);
        assert!(!free.is_empty());
    }

    #[test]
    fn choose_action_is_deterministic_per_seed() {
        let mut a = agent(AgentConfig {
            seed: 11,
            ..Default::default()
        });
        let mut b = agent(AgentConfig {
            seed: 11,
            ..Default::default()
        });
        for step in 0..100 {
            assert_eq!(a.choose_action(step), b.choose_action(step));
        }
    }

    #[test]
    fn clamps_hold_under_stress() {
        let mut a = agent(AgentConfig {
            inhibit_mult: 1.0,
            silence_penalty: 0.9,
            decay_rate: 0.3,
            ..Default::default()
        });
        seed_handle(&mut a, "1", "5", 0.9, 0.9);
        seed_handle(&mut a, "1", "7", 0.8, 0.8);

        for _ in 0..50 {
            a.observe(&[1], &[5], true, true, 0.7);
            a.observe(&[1], &[7], true, true, 0.0);
            for h in a.registry().iter() {
                assert!((0.0..=1.0).contains(&h.eligibility));
                assert!((0.0..=1.0).contains(&h.truth));
            }
        }
    }
}
