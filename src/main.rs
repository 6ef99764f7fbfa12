//! pulseloom CLI: train a pulse-sequence concept learner against an oracle.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use miette::Result;

use pulseloom::agent::{AgentConfig, BootstrapAgent};
use pulseloom::partner::make_partner;
use pulseloom::report::{RunMetadata, RunReport, summarize};
use pulseloom::trainer::{DriftConfig, RoundOptions, Trainer};

#[derive(Parser)]
#[command(name = "pulseloom", version, about = "Online pulse-sequence concept learner")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Train an agent against a partner and write a run report.
    Train {
        /// Partner kind (e.g. sumprime, mixed, mixed_shift, adversarial).
        #[arg(long, default_value = "mixed")]
        partner: String,

        /// Master seed for agent, partner, and channel.
        #[arg(long, default_value = "42")]
        seed: u64,

        /// Number of training rounds.
        #[arg(long, default_value = "50")]
        rounds: u64,

        /// Samples per round.
        #[arg(long, default_value = "30")]
        batch_size: usize,

        /// Questions allowed per round (0 = unlimited).
        #[arg(long, default_value = "8")]
        question_budget: u32,

        /// Disable forced probes once the question budget is spent.
        #[arg(long)]
        no_probe_after_budget: bool,

        /// Channel noise probability.
        #[arg(long, default_value = "0.0")]
        noise_prob: f64,

        /// Channel noise jitter magnitude.
        #[arg(long, default_value = "1")]
        noise_jitter: u32,

        /// Per-observe eligibility decay rate.
        #[arg(long, default_value = "0.0")]
        decay_rate: f64,

        /// Drift-detector window size in committed steps.
        #[arg(long, default_value = "50")]
        drift_window: usize,

        /// Drift-detector error-rate threshold.
        #[arg(long, default_value = "0.6")]
        drift_threshold: f64,

        /// Write the run report to this JSON file.
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Re-summarize a saved run report.
    Summarize {
        /// Path to a run report JSON file.
        report: PathBuf,
    },

    /// Show the strongest handles from a saved run report.
    Handles {
        /// Path to a run report JSON file.
        report: PathBuf,
    },
}

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(3)
                .build(),
        )
    }))
    .ok(); // Ignore error if hook already set (e.g., in tests)

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Train {
            partner,
            seed,
            rounds,
            batch_size,
            question_budget,
            no_probe_after_budget,
            noise_prob,
            noise_jitter,
            decay_rate,
            drift_window,
            drift_threshold,
            out,
        } => {
            let agent_config = AgentConfig {
                seed,
                seed_proto_handles: true,
                question_eligibility_bump: 0.1,
                silence_penalty: 0.05,
                decay_rate,
                ..Default::default()
            };
            let options = RoundOptions {
                batch_size,
                question_budget_per_round: question_budget,
                probe_after_budget: !no_probe_after_budget,
                noise_prob,
                noise_jitter,
                ..Default::default()
            };
            let drift = DriftConfig {
                window: drift_window,
                threshold: drift_threshold,
                ..Default::default()
            };

            let agent = BootstrapAgent::new(agent_config.clone())?;
            let oracle = make_partner(&partner, seed)?;
            let mut trainer =
                Trainer::new(agent, oracle, options.clone(), drift.clone(), seed)?;

            let history = trainer.train(rounds);

            let metadata = RunMetadata {
                partner: partner.clone(),
                seed,
                rounds,
                agent_config,
                options,
                drift,
            };
            let report = RunReport::from_run(&trainer, metadata, history);

            print_summary(&report);

            if let Some(path) = out {
                report.save(&path)?;
                println!("\nReport written to {}", path.display());
            }
        }

        Commands::Summarize { report } => {
            let loaded = RunReport::load(&report)?;
            let recomputed = summarize(&loaded.history);
            if recomputed != loaded.summary {
                miette::bail!(
                    "summary in {} does not match its history; file may be edited or truncated",
                    report.display()
                );
            }
            print_summary(&loaded);
        }

        Commands::Handles { report } => {
            let loaded = RunReport::load(&report)?;
            println!(
                "Top handles after {} rounds against {}:",
                loaded.summary.rounds, loaded.metadata.partner
            );
            for h in &loaded.top_handles {
                println!(
                    "  {} {} -> {}  strength {:.2} (e {:.2} / t {:.2})  {}+/{}-",
                    h.id, h.stimulus, h.response, h.strength, h.eligibility, h.truth, h.hits,
                    h.misses
                );
            }
        }
    }

    Ok(())
}

fn print_summary(report: &RunReport) {
    let s = &report.summary;
    println!(
        "Run: {} vs {} ({} rounds, {} samples, seed {})",
        env!("CARGO_PKG_NAME"),
        report.metadata.partner,
        s.rounds,
        s.total_samples,
        report.metadata.seed
    );
    println!("  mean error        {:.3}", s.mean_error);
    println!("  trailing error    {:.3}", s.trailing_mean_error);
    println!("  final precision   {:.3}", s.final_precision);
    println!(
        "  lanes             speak {:.2} / question {:.2} / silent {:.2}",
        s.speak_rate, s.question_rate, s.na_rate
    );
    println!("  mean utility      {:.3}", s.mean_utility);
    println!(
        "  corrections {} / probes {} / drift triggers {}",
        s.total_corrections, s.total_probes, s.drift_triggers
    );
}
