//! Run reports: everything one training run produced, as one JSON document.
//!
//! The summary block is a pure function of the history block, so a report can
//! always be re-summarized after loading and must agree with what was saved.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::agent::{AgentConfig, BootstrapAgent, Telemetry};
use crate::error::{LoomResult, ReportError};
use crate::handle::HandleId;
use crate::trainer::{DriftConfig, RoundMetrics, RoundOptions, StepRecord, Trainer};

/// How many top handles a report snapshots.
const TOP_HANDLE_COUNT: usize = 10;

/// Trailing window (in samples) for the late-run error figure.
const TRAILING_SAMPLES: usize = 100;

/// Static facts about how the run was configured.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMetadata {
    pub partner: String,
    pub seed: u64,
    pub rounds: u64,
    pub agent_config: AgentConfig,
    pub options: RoundOptions,
    pub drift: DriftConfig,
}

/// Frozen view of one handle at report time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandleSnapshot {
    pub id: HandleId,
    pub stimulus: String,
    pub response: String,
    pub eligibility: f64,
    pub truth: f64,
    pub strength: f64,
    pub hits: u32,
    pub misses: u32,
}

/// Aggregates recomputed from the round history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub rounds: usize,
    pub total_samples: usize,
    pub mean_error: f64,
    /// Mean error over (roughly) the last hundred samples, taken at round
    /// granularity. Separates converged behavior from early flailing.
    pub trailing_mean_error: f64,
    pub speak_rate: f64,
    pub question_rate: f64,
    pub na_rate: f64,
    pub final_precision: f64,
    pub mean_utility: f64,
    pub total_corrections: u64,
    pub total_probes: u64,
    pub drift_triggers: u64,
}

/// The whole run: configuration, per-round history, the trailing per-step
/// window, derived summary, and the strongest handles at the end.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub metadata: RunMetadata,
    pub history: Vec<RoundMetrics>,
    /// The last ~100 processed samples, step by step, oldest first.
    pub last_steps: Vec<StepRecord>,
    pub summary: RunSummary,
    pub top_handles: Vec<HandleSnapshot>,
    pub telemetry: Telemetry,
}

impl RunReport {
    /// Assemble a report from a finished trainer.
    pub fn from_run(trainer: &Trainer, metadata: RunMetadata, history: Vec<RoundMetrics>) -> Self {
        let summary = summarize(&history);
        let top_handles = snapshot_top_handles(trainer.agent());
        Self {
            metadata,
            history,
            last_steps: trainer.recent_steps(),
            summary,
            top_handles,
            telemetry: trainer.agent().telemetry(),
        }
    }

    pub fn save(&self, path: &Path) -> LoomResult<()> {
        let json = serde_json::to_string_pretty(self).map_err(|e| ReportError::Serialization {
            message: e.to_string(),
        })?;
        std::fs::write(path, json).map_err(|source| ReportError::Io { source })?;
        Ok(())
    }

    pub fn load(path: &Path) -> LoomResult<Self> {
        let json = std::fs::read_to_string(path).map_err(|source| ReportError::Io { source })?;
        let report =
            serde_json::from_str(&json).map_err(|e| ReportError::Serialization {
                message: e.to_string(),
            })?;
        Ok(report)
    }
}

/// Recompute the summary block from a round history.
pub fn summarize(history: &[RoundMetrics]) -> RunSummary {
    let rounds = history.len();
    let total_samples: usize = history.iter().map(|r| r.samples).sum();
    let n = total_samples.max(1) as f64;

    let weighted = |f: fn(&RoundMetrics) -> f64| -> f64 {
        history.iter().map(|r| f(r) * r.samples as f64).sum::<f64>() / n
    };

    // Walk rounds backwards until roughly TRAILING_SAMPLES are covered.
    let mut trailing_error_sum = 0.0;
    let mut trailing_samples = 0usize;
    for r in history.iter().rev() {
        trailing_error_sum += r.mean_error * r.samples as f64;
        trailing_samples += r.samples;
        if trailing_samples >= TRAILING_SAMPLES {
            break;
        }
    }

    RunSummary {
        rounds,
        total_samples,
        mean_error: weighted(|r| r.mean_error),
        trailing_mean_error: trailing_error_sum / trailing_samples.max(1) as f64,
        speak_rate: weighted(|r| r.speak_rate),
        question_rate: weighted(|r| r.question_rate),
        na_rate: weighted(|r| r.na_rate),
        final_precision: history.last().map_or(0.0, |r| r.precision),
        mean_utility: weighted(|r| r.utility),
        total_corrections: history.iter().map(|r| r.corrections).sum(),
        total_probes: history.iter().map(|r| r.probe_count).sum(),
        drift_triggers: history.last().map_or(0, |r| r.drift_triggers),
    }
}

fn snapshot_top_handles(agent: &BootstrapAgent) -> Vec<HandleSnapshot> {
    agent
        .registry()
        .ranked()
        .into_iter()
        .take(TOP_HANDLE_COUNT)
        .map(|h| HandleSnapshot {
            id: h.id,
            stimulus: h.stimulus_sig.clone(),
            response: h.response_sig.clone(),
            eligibility: h.eligibility,
            truth: h.truth,
            strength: h.strength(),
            hits: h.hits,
            misses: h.misses,
        })
        .collect()
}
