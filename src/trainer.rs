//! Aggressive training orchestrator.
//!
//! Each round generates a batch of stimuli, routes every exchange through the
//! channel, lets the agent decide a lane, and then dispatches exactly one
//! learning event per sample. The dispatch table is the only place
//! `update_truth = true` is ever passed down, so truth provenance stays
//! auditable: truth moves on corrections and supervised questions, never on
//! unsupervised exposure or probes that happened to be right.
//!
//! A sample is *trainable* only when the oracle's answer is a single pulse;
//! multi-pulse answers are ambiguous ground truth and get questions, not
//! weight updates.
//!
//! On top of the per-sample loop sit three control mechanisms:
//!
//! - a question budget per round, with optional forced probes once exhausted,
//! - boundary drills queued from real errors and replayed next round,
//! - a sliding-window drift detector over committed steps that opens a probe
//!   burst when the error rate jumps.

use std::collections::{HashMap, VecDeque};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::agent::{BootstrapAgent, Telemetry};
use crate::channel::Channel;
use crate::error::{ConfigError, LoomResult};
use crate::handle::HandleId;
use crate::lane::{DecisionReason, Lane, ambiguous_oracle_question, weak_knowledge_question};
use crate::metrics::{ErrorCategory, QUESTION_MARKER, classify_error, response_error};
use crate::partner::Partner;
use crate::registry::HandleRegistry;
use crate::signature::{EMPTY_SIG, Pulse, Seq, parse_signature, signature};

/// Drill queue never grows past this.
const MAX_DRILL_QUEUE: usize = 64;

/// Handles averaged for the per-round confidence figures.
const TOP_HANDLES_FOR_AVG: usize = 10;

/// Error categories reported per round.
const TOP_ERROR_CATEGORIES: usize = 5;

/// Most recent steps kept for the run report.
const STEP_HISTORY: usize = 100;

/// Candidate handles snapshotted per step record.
const STEP_CANDIDATES: usize = 3;

// ---------------------------------------------------------------------------
// Samples and provenance
// ---------------------------------------------------------------------------

/// One stimulus presented during a round.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingSample {
    pub seq: Seq,
    pub sig: String,
    /// True for boundary drills replayed from the error queue.
    pub synthetic_drill: bool,
}

impl TrainingSample {
    pub fn new(seq: Seq, synthetic_drill: bool) -> Self {
        let sig = signature(&seq);
        Self {
            seq,
            sig,
            synthetic_drill,
        }
    }
}

/// Provenance of the learning event applied to one sample. The first three
/// are the only ones that move truth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateType {
    /// Non-probe assertion that was wrong or too close to call.
    CorrectionTruth,
    /// Forced probe assertion that turned out wrong.
    CorrectionTruthProbe,
    /// Question answered by a single-label oracle.
    QuestionSupervised,
    /// Eligibility-only boost after an abstain, when silence penalties are on.
    EligibilityNudge,
    /// Probe that happened to be right; eligibility learns, truth does not.
    ProbeSpeak,
    /// No learning event beyond correlation counting.
    None,
}

/// Per-round tally of learning events by provenance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateCounts {
    pub correction_truth: u64,
    pub correction_truth_probe: u64,
    pub question_supervised: u64,
    pub eligibility_nudge: u64,
    pub probe_speak: u64,
    pub none: u64,
}

impl UpdateCounts {
    fn bump(&mut self, update: UpdateType) {
        match update {
            UpdateType::CorrectionTruth => self.correction_truth += 1,
            UpdateType::CorrectionTruthProbe => self.correction_truth_probe += 1,
            UpdateType::QuestionSupervised => self.question_supervised += 1,
            UpdateType::EligibilityNudge => self.eligibility_nudge += 1,
            UpdateType::ProbeSpeak => self.probe_speak += 1,
            UpdateType::None => self.none += 1,
        }
    }
}

/// A matching handle as it stood at decision time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateSnapshot {
    pub id: HandleId,
    pub response_sig: String,
    pub strength: f64,
}

/// One fully processed sample, kept in a bounded trailing window so reports
/// can show the late-run behavior step by step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    pub sample_index: u64,
    pub stimulus_sig: String,
    pub actual_sig: String,
    pub predicted_sig: String,
    pub lane: Lane,
    pub probe: bool,
    pub synthetic_drill: bool,
    pub reason: Option<DecisionReason>,
    pub error: f64,
    pub margin: f64,
    pub category: ErrorCategory,
    pub update: UpdateType,
    /// Top matching handles at decision time, strongest first.
    pub top_candidates: Vec<CandidateSnapshot>,
}

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Round-level knobs, separate from the agent's own config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundOptions {
    /// Samples per round (drills included).
    pub batch_size: usize,
    /// Strength margin below which a sample counts as uncertain.
    pub uncertainty_threshold: f64,
    /// Questions allowed per round (0 = unlimited).
    pub question_budget_per_round: u32,
    /// Once the budget is spent, force an assertion instead of going silent.
    pub probe_after_budget: bool,
    /// Partial utility credit for a question relative to a correct assert.
    pub question_credit: f64,
    /// Force abstains into questions when the sample is ambiguous or uncertain.
    pub question_preferred: bool,
    /// Boundary drills queued per real assertion error.
    pub drill_n: usize,
    /// Channel noise probability.
    pub noise_prob: f64,
    /// Channel noise jitter magnitude.
    pub noise_jitter: u32,
}

impl Default for RoundOptions {
    fn default() -> Self {
        Self {
            batch_size: 30,
            uncertainty_threshold: 0.15,
            question_budget_per_round: 8,
            probe_after_budget: true,
            question_credit: 0.25,
            question_preferred: true,
            drill_n: 3,
            noise_prob: 0.0,
            noise_jitter: 0,
        }
    }
}

impl RoundOptions {
    /// Reject out-of-range unit-interval fields at construction.
    /// `noise_prob` is checked by [`Channel::new`].
    pub fn validate(&self) -> LoomResult<()> {
        let unit_fields: [(&'static str, f64); 2] = [
            ("uncertainty_threshold", self.uncertainty_threshold),
            ("question_credit", self.question_credit),
        ];
        for (field, value) in unit_fields {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::OutOfRange { field, value }.into());
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Drift detection
// ---------------------------------------------------------------------------

/// Sliding-window drift detector over committed (asserted) steps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriftConfig {
    /// Committed steps per window.
    pub window: usize,
    /// Error-rate trigger threshold.
    pub threshold: f64,
    /// Committed steps a trigger forces into probe mode.
    pub burst: u32,
}

impl Default for DriftConfig {
    fn default() -> Self {
        Self {
            window: 50,
            threshold: 0.60,
            burst: 20,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DriftDetector {
    config: DriftConfig,
    window: VecDeque<bool>,
    burst_left: u32,
    triggers: u64,
    trigger_indices: Vec<u64>,
}

impl DriftDetector {
    pub fn new(config: DriftConfig) -> Self {
        Self {
            config,
            window: VecDeque::new(),
            burst_left: 0,
            triggers: 0,
            trigger_indices: Vec::new(),
        }
    }

    /// Record one committed step. `sample_index` is a global counter used
    /// only to timestamp triggers. No new trigger fires while a burst is
    /// still being consumed; the burst itself drains one step per record.
    pub fn record(&mut self, was_error: bool, sample_index: u64) -> bool {
        if self.burst_left > 0 {
            self.burst_left -= 1;
            return false;
        }
        self.window.push_back(was_error);
        if self.window.len() < self.config.window {
            return false;
        }
        while self.window.len() > self.config.window {
            self.window.pop_front();
        }
        let errors = self.window.iter().filter(|e| **e).count();
        let rate = errors as f64 / self.window.len() as f64;
        if rate >= self.config.threshold {
            self.window.clear();
            self.burst_left = self.config.burst;
            self.triggers += 1;
            self.trigger_indices.push(sample_index);
            tracing::warn!(
                rate,
                threshold = self.config.threshold,
                sample_index,
                "drift trigger: opening probe burst"
            );
            return true;
        }
        false
    }

    pub fn in_burst(&self) -> bool {
        self.burst_left > 0
    }

    pub fn triggers(&self) -> u64 {
        self.triggers
    }

    pub fn trigger_indices(&self) -> &[u64] {
        &self.trigger_indices
    }
}

// ---------------------------------------------------------------------------
// Round metrics
// ---------------------------------------------------------------------------

/// Everything one round reports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundMetrics {
    pub round: u64,
    pub samples: usize,
    pub mean_error: f64,
    pub speak_rate: f64,
    pub question_rate: f64,
    pub na_rate: f64,
    /// Exactly-right fraction of trainable samples that were asserted.
    pub accuracy: f64,
    /// Fraction of non-probe assertions that were exactly right.
    pub precision: f64,
    /// Fraction of probe assertions that were exactly right.
    pub probe_precision: f64,
    /// `speak_rate × overall speak precision + question_rate × question_credit`.
    pub utility: f64,
    pub corrections: u64,
    pub question_supervised_count: u64,
    pub probe_count: u64,
    pub question_budget_hit_count: u64,
    pub questions_blocked_count: u64,
    pub speak_non_probe_count: u64,
    pub update_counts: UpdateCounts,
    /// Assertion-error categories, most frequent first.
    pub top_errors: Vec<(ErrorCategory, u64)>,
    pub handle_count: usize,
    /// Handles clearing the truth floor and the strength gate.
    pub speakable_handle_count: usize,
    /// Handles with enough truth whose strength fails the gate.
    pub gated_by_eligibility_count: usize,
    /// Averaged over the ten strongest handles.
    pub avg_eligibility: f64,
    pub avg_truth: f64,
    /// Agent telemetry deltas for this round.
    pub proto_seeded_count: u64,
    pub nudge_count: u64,
    pub cooldown_blocked_count: u64,
    pub drill_queue_size: usize,
    pub drift_triggers: u64,
    pub drift_trigger_indices: Vec<u64>,
}

/// Outcome of a single training step, for the round accumulator and tests.
#[derive(Debug, Clone, PartialEq)]
pub struct StepOutcome {
    pub lane: Lane,
    pub update: UpdateType,
    pub error: f64,
    pub probe: bool,
    pub reason: Option<DecisionReason>,
}

#[derive(Debug, Default)]
struct RoundState {
    questions_asked: u32,
    corrections: u64,
    question_supervised: u64,
    probe_count: u64,
    probe_correct: u64,
    budget_hits: u64,
    questions_blocked: u64,
    speak_non_probe: u64,
    speak_correct: u64,
    abstains: u64,
    trainable: u64,
    trainable_asserted_correct: u64,
    error_sum: f64,
    samples: usize,
    updates: UpdateCounts,
    taxonomy: HashMap<ErrorCategory, u64>,
    telemetry_start: Telemetry,
}

// ---------------------------------------------------------------------------
// Trainer
// ---------------------------------------------------------------------------

/// Drives an agent against one oracle partner.
pub struct Trainer {
    agent: BootstrapAgent,
    partner: Box<dyn Partner>,
    channel: Channel,
    options: RoundOptions,
    drift: DriftDetector,
    rng: StdRng,
    drill_queue: VecDeque<TrainingSample>,
    recent_steps: VecDeque<StepRecord>,
    round_state: RoundState,
    rounds_completed: u64,
    sample_index: u64,
}

impl Trainer {
    pub fn new(
        agent: BootstrapAgent,
        partner: Box<dyn Partner>,
        options: RoundOptions,
        drift_config: DriftConfig,
        seed: u64,
    ) -> LoomResult<Self> {
        options.validate()?;
        let channel = Channel::new(options.noise_prob, options.noise_jitter, seed ^ 0x9e3779b9)?;
        Ok(Self {
            agent,
            partner,
            channel,
            options,
            drift: DriftDetector::new(drift_config),
            rng: StdRng::seed_from_u64(seed),
            drill_queue: VecDeque::new(),
            recent_steps: VecDeque::new(),
            round_state: RoundState::default(),
            rounds_completed: 0,
            sample_index: 0,
        })
    }

    pub fn agent(&self) -> &BootstrapAgent {
        &self.agent
    }

    /// Mutable agent access, for seeding fixtures and diagnostics tooling.
    pub fn agent_mut(&mut self) -> &mut BootstrapAgent {
        &mut self.agent
    }

    pub fn drift(&self) -> &DriftDetector {
        &self.drift
    }

    pub fn drill_queue_len(&self) -> usize {
        self.drill_queue.len()
    }

    /// The trailing per-step window, oldest first.
    pub fn recent_steps(&self) -> Vec<StepRecord> {
        self.recent_steps.iter().cloned().collect()
    }

    /// Run `rounds` rounds and collect per-round metrics.
    pub fn train(&mut self, rounds: u64) -> Vec<RoundMetrics> {
        let mut history = Vec::with_capacity(rounds as usize);
        for _ in 0..rounds {
            let metrics = self.train_round();
            tracing::info!(
                round = metrics.round,
                mean_error = metrics.mean_error,
                precision = metrics.precision,
                question_rate = metrics.question_rate,
                handles = metrics.handle_count,
                drift_triggers = metrics.drift_triggers,
                "round complete"
            );
            history.push(metrics);
        }
        history
    }

    /// Run one round: queued drills first, then fresh samples.
    pub fn train_round(&mut self) -> RoundMetrics {
        self.begin_round();
        let batch = self.generate_batch();
        for sample in &batch {
            self.step(sample);
        }
        self.rounds_completed += 1;
        self.finish_round()
    }

    /// Reset per-round accounting. Exposed so diagnostics can drive
    /// [`Trainer::step`] with hand-built samples.
    pub fn begin_round(&mut self) {
        self.round_state = RoundState {
            telemetry_start: self.agent.telemetry(),
            ..Default::default()
        };
    }

    fn generate_batch(&mut self) -> Vec<TrainingSample> {
        let mut batch = Vec::with_capacity(self.options.batch_size);
        while batch.len() < self.options.batch_size {
            match self.drill_queue.pop_front() {
                Some(drill) => batch.push(drill),
                None => break,
            }
        }
        while batch.len() < self.options.batch_size {
            batch.push(TrainingSample::new(self.random_sequence(), false));
        }
        batch
    }

    /// Random stimulus: a fifth of samples anchor on `[1, 1]` so at least one
    /// signature recurs often enough to promote early.
    fn random_sequence(&mut self) -> Seq {
        if self.rng.r#gen::<f64>() < 0.2 {
            return vec![1, 1];
        }
        let n = self.rng.gen_range(1..=10);
        (0..n).map(|_| self.rng.gen_range(1..=12)).collect()
    }

    /// Strength margin between the two best assertable candidates for a
    /// signature. One lone candidate's margin is its own strength; no
    /// candidate above the gate means maximal uncertainty (1.0).
    fn uncertainty_margin(&self, sig: &str) -> f64 {
        let registry = self.agent.registry();
        let config = self.agent.config();
        let mut candidates: Vec<f64> = registry
            .matching_ranked(sig)
            .into_iter()
            .filter_map(|id| registry.get(id))
            .map(|h| h.strength())
            .filter(|s| *s >= config.min_strength_to_predict)
            .collect();
        if candidates.is_empty() {
            return 1.0;
        }
        if config.compete_topk > 0 {
            candidates.truncate(config.compete_topk);
        }
        let s2 = candidates.get(1).copied().unwrap_or(0.0);
        candidates[0] - s2
    }

    fn top_response(&self, sig: &str) -> Option<Seq> {
        let ranked = self.agent.registry().matching_ranked(sig);
        let top = self.agent.registry().get(*ranked.first()?)?;
        Some(parse_signature(&top.response_sig))
    }

    /// Response signatures of the two overall strongest handles, used for
    /// forced-question templates when the stimulus itself has no candidates.
    fn overall_top_sigs(&self) -> (String, String) {
        let ranked = self.agent.registry().ranked();
        let sig_of = |idx: usize| {
            ranked
                .get(idx)
                .map_or_else(|| EMPTY_SIG.to_string(), |h| h.response_sig.clone())
        };
        (sig_of(0), sig_of(1))
    }

    /// Process one sample end to end: channel, lane, overrides, learning
    /// event, drift accounting.
    pub fn step(&mut self, sample: &TrainingSample) -> StepOutcome {
        self.sample_index += 1;
        let truth = self.partner.respond(&sample.seq);
        let exchange = self.channel.transmit(&sample.seq, &truth);
        let stimulus = exchange.sent;
        let received = exchange.received;
        let sig = signature(&stimulus);

        let decision = self.agent.predict(&stimulus);
        let margin = self.uncertainty_margin(&sig);
        let top_candidates = self.candidate_snapshots(&sig);
        let uncertain = margin < self.options.uncertainty_threshold;
        // Single-pulse answers are supervisable ground truth; multi-pulse
        // answers are ambiguous and never drive weight updates.
        let trainable = received.len() == 1;
        let ambiguous = received.len() > 1;

        let mut lane = decision.lane;
        let mut response = decision.response.clone();
        let mut probe = false;
        let mut reason = decision.meta.reason;

        // An active drift burst turns silence into probes to resample the
        // concept.
        if self.drift.in_burst() && lane != Lane::Assert {
            if let Some(top) = self.top_response(&sig) {
                lane = Lane::Assert;
                response = Some(top);
                probe = true;
                reason = Some(DecisionReason::DriftProbe);
            }
        }

        // Abstains on ambiguous or uncertain samples become questions.
        if self.options.question_preferred
            && !probe
            && (ambiguous || uncertain)
            && matches!(lane, Lane::AbstainKnown | Lane::AbstainUnknown)
        {
            let (top1, top2) = self.overall_top_sigs();
            let question = if ambiguous {
                reason = Some(DecisionReason::AmbiguousOracle);
                ambiguous_oracle_question(&top1, &top2)
            } else {
                reason = Some(DecisionReason::UncertaintyPreferred);
                weak_knowledge_question(&top1, &top2)
            };
            tracing::debug!(stimulus = %sig, %question, "forcing abstain into question");
            lane = Lane::Question;
        }

        // Budget enforcement: a question past the budget either probes or is
        // silenced outright.
        if lane == Lane::Question && !self.budget_remaining() {
            self.round_state.budget_hits += 1;
            match self.top_response(&sig) {
                Some(top) if self.options.probe_after_budget => {
                    lane = Lane::Assert;
                    response = Some(top);
                    probe = true;
                    reason = Some(DecisionReason::BudgetProbe);
                }
                _ => {
                    lane = Lane::AbstainKnown;
                    response = None;
                    self.round_state.questions_blocked += 1;
                }
            }
        }

        // Error reflects the final lane, not the agent's first instinct.
        let predicted: Seq = match lane {
            Lane::Assert => response.clone().unwrap_or_default(),
            Lane::Question => QUESTION_MARKER.to_vec(),
            _ => Vec::new(),
        };
        let error = response_error(&predicted, &received);

        let update =
            self.dispatch_update(lane, probe, trainable, error, uncertain, &stimulus, &received, sample.synthetic_drill);

        self.account(lane, probe, trainable, error, update, &predicted, &received);
        if lane == Lane::Assert {
            self.drift.record(error > 0.0, self.sample_index);
        }

        self.recent_steps.push_back(StepRecord {
            sample_index: self.sample_index,
            stimulus_sig: sig,
            actual_sig: signature(&received),
            predicted_sig: signature(&predicted),
            lane,
            probe,
            synthetic_drill: sample.synthetic_drill,
            reason,
            error,
            margin,
            category: classify_error(&signature(&predicted), &signature(&received), error),
            update,
            top_candidates,
        });
        while self.recent_steps.len() > STEP_HISTORY {
            self.recent_steps.pop_front();
        }

        StepOutcome {
            lane,
            update,
            error,
            probe,
            reason,
        }
    }

    fn candidate_snapshots(&self, sig: &str) -> Vec<CandidateSnapshot> {
        let registry = self.agent.registry();
        registry
            .matching_ranked(sig)
            .into_iter()
            .take(STEP_CANDIDATES)
            .filter_map(|id| registry.get(id))
            .map(|h| CandidateSnapshot {
                id: h.id,
                response_sig: h.response_sig.clone(),
                strength: h.strength(),
            })
            .collect()
    }

    /// The provenance dispatch table. Exactly one observe call per sample;
    /// `update_truth` is decided here and nowhere else.
    #[allow(clippy::too_many_arguments)]
    fn dispatch_update(
        &mut self,
        lane: Lane,
        probe: bool,
        trainable: bool,
        error: f64,
        uncertain: bool,
        stimulus: &[Pulse],
        received: &[Pulse],
        synthetic_drill: bool,
    ) -> UpdateType {
        match lane {
            Lane::Assert if probe => {
                if trainable && error > 0.0 {
                    self.agent.observe(stimulus, received, true, true, 0.0);
                    UpdateType::CorrectionTruthProbe
                } else if trainable {
                    // A lucky probe earns eligibility, never truth.
                    self.agent.observe(stimulus, received, true, false, 0.0);
                    UpdateType::ProbeSpeak
                } else {
                    self.agent.observe(stimulus, received, false, false, 0.0);
                    UpdateType::None
                }
            }
            Lane::Assert => {
                if trainable && (error > 0.0 || uncertain) {
                    self.agent.observe(stimulus, received, true, true, 0.0);
                    if error > 0.0 && !synthetic_drill {
                        self.queue_boundary_drills(stimulus);
                    }
                    UpdateType::CorrectionTruth
                } else {
                    // Confident and correct (or untrainable): only correlation
                    // counting runs.
                    self.agent.observe(stimulus, received, false, false, 0.0);
                    UpdateType::None
                }
            }
            Lane::Question => {
                if trainable {
                    let bump = self.agent.config().question_eligibility_bump;
                    self.agent.observe(stimulus, received, true, true, bump);
                    UpdateType::QuestionSupervised
                } else {
                    self.agent.observe(stimulus, received, false, false, 0.0);
                    UpdateType::None
                }
            }
            Lane::AbstainKnown | Lane::AbstainUnknown => {
                if trainable && self.agent.config().silence_penalty > 0.0 {
                    self.agent.observe(stimulus, received, true, false, 0.0);
                    UpdateType::EligibilityNudge
                } else {
                    self.agent.observe(stimulus, received, false, false, 0.0);
                    UpdateType::None
                }
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn account(
        &mut self,
        lane: Lane,
        probe: bool,
        trainable: bool,
        error: f64,
        update: UpdateType,
        predicted: &[Pulse],
        received: &[Pulse],
    ) {
        let state = &mut self.round_state;
        state.samples += 1;
        state.error_sum += error;
        state.updates.bump(update);
        if trainable {
            state.trainable += 1;
        }
        match update {
            UpdateType::CorrectionTruth | UpdateType::CorrectionTruthProbe => {
                state.corrections += 1;
            }
            UpdateType::QuestionSupervised => state.question_supervised += 1,
            _ => {}
        }
        match lane {
            Lane::Assert => {
                if probe {
                    state.probe_count += 1;
                    if error == 0.0 {
                        state.probe_correct += 1;
                    }
                } else {
                    state.speak_non_probe += 1;
                    if error == 0.0 {
                        state.speak_correct += 1;
                    }
                }
                if trainable && error == 0.0 {
                    state.trainable_asserted_correct += 1;
                }
                if error > 0.0 {
                    let category =
                        classify_error(&signature(predicted), &signature(received), error);
                    *state.taxonomy.entry(category).or_insert(0) += 1;
                }
            }
            Lane::Question => state.questions_asked += 1,
            Lane::AbstainKnown | Lane::AbstainUnknown => state.abstains += 1,
        }
    }

    fn budget_remaining(&self) -> bool {
        self.options.question_budget_per_round == 0
            || self.round_state.questions_asked < self.options.question_budget_per_round
    }

    /// Queue `drill_n` near-miss variants of an error stimulus for replay.
    fn queue_boundary_drills(&mut self, stimulus: &[Pulse]) {
        if stimulus.is_empty() {
            return;
        }
        for _ in 0..self.options.drill_n {
            let mut drill = stimulus.to_vec();
            let idx = self.rng.gen_range(0..drill.len());
            let delta: i64 = if self.rng.r#gen::<bool>() { 1 } else { -1 };
            drill[idx] = (i64::from(drill[idx]) + delta).max(1) as Pulse;

            if self.rng.r#gen::<f64>() < 0.3 {
                if self.rng.r#gen::<bool>() {
                    drill.push(self.rng.gen_range(1..=12));
                } else if drill.len() > 1 {
                    let remove = self.rng.gen_range(0..drill.len());
                    drill.remove(remove);
                }
            }

            if self.drill_queue.len() >= MAX_DRILL_QUEUE {
                break;
            }
            self.drill_queue.push_back(TrainingSample::new(drill, true));
        }
    }

    fn finish_round(&mut self) -> RoundMetrics {
        let state = &self.round_state;
        let n = state.samples.max(1) as f64;
        let speaks = state.speak_non_probe + state.probe_count;
        let speak_rate = speaks as f64 / n;
        let question_rate = f64::from(state.questions_asked) / n;
        let overall_precision =
            (state.speak_correct + state.probe_correct) as f64 / speaks.max(1) as f64;

        let mut top_errors: Vec<(ErrorCategory, u64)> =
            state.taxonomy.iter().map(|(c, n)| (*c, *n)).collect();
        top_errors.sort_by(|a, b| b.1.cmp(&a.1));
        top_errors.truncate(TOP_ERROR_CATEGORIES);

        let registry = self.agent.registry();
        let (speakable, gated) = confidence_census(registry, self.agent.config());

        let top = registry.ranked();
        let top = &top[..top.len().min(TOP_HANDLES_FOR_AVG)];
        let denom = top.len().max(1) as f64;
        let avg_eligibility = top.iter().map(|h| h.eligibility).sum::<f64>() / denom;
        let avg_truth = top.iter().map(|h| h.truth).sum::<f64>() / denom;

        let telemetry = self.agent.telemetry();
        let start = state.telemetry_start;

        RoundMetrics {
            round: self.rounds_completed,
            samples: state.samples,
            mean_error: state.error_sum / n,
            speak_rate,
            question_rate,
            na_rate: state.abstains as f64 / n,
            accuracy: state.trainable_asserted_correct as f64 / state.trainable.max(1) as f64,
            precision: state.speak_correct as f64 / state.speak_non_probe.max(1) as f64,
            probe_precision: state.probe_correct as f64 / state.probe_count.max(1) as f64,
            utility: speak_rate * overall_precision + question_rate * self.options.question_credit,
            corrections: state.corrections,
            question_supervised_count: state.question_supervised,
            probe_count: state.probe_count,
            question_budget_hit_count: state.budget_hits,
            questions_blocked_count: state.questions_blocked,
            speak_non_probe_count: state.speak_non_probe,
            update_counts: state.updates,
            top_errors,
            handle_count: registry.len(),
            speakable_handle_count: speakable,
            gated_by_eligibility_count: gated,
            avg_eligibility,
            avg_truth,
            proto_seeded_count: telemetry.proto_seeded - start.proto_seeded,
            nudge_count: telemetry.silent_to_question_nudges - start.silent_to_question_nudges,
            cooldown_blocked_count: telemetry.question_repeats_blocked
                - start.question_repeats_blocked,
            drill_queue_size: self.drill_queue.len(),
            drift_triggers: self.drift.triggers(),
            drift_trigger_indices: self.drift.trigger_indices().to_vec(),
        }
    }
}

/// Count handles that clear the truth floor and the strength gate, and those
/// with enough truth whose strength still fails the gate (low eligibility
/// dragging `min(eligibility, truth)` down).
fn confidence_census(
    registry: &HandleRegistry,
    config: &crate::agent::AgentConfig,
) -> (usize, usize) {
    let mut speakable = 0;
    let mut gated = 0;
    for h in registry.iter() {
        if h.truth >= config.truth_min_to_speak {
            if h.strength() >= config.min_strength_to_predict {
                speakable += 1;
            } else {
                gated += 1;
            }
        }
    }
    (speakable, gated)
}
