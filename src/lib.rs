//! # pulseloom
//!
//! An online concept learner that converses in integer pulse sequences.
//!
//! The agent exchanges pulse sequences with an oracle partner and maintains a
//! registry of stimulus→response handles, each carrying two confidence
//! scalars: eligibility (relevance, moves freely) and truth (correctness,
//! moves only under supervision). Every prediction resolves to one of four
//! lanes — assert, question, abstain-known, abstain-unknown — and the
//! training orchestrator turns each exchange into exactly one provenance-
//! tagged learning event, with a per-round question budget, boundary drills
//! replayed from real errors, and a sliding-window drift detector that forces
//! probes when a learned concept stops holding.
//!
//! ## Quick start
//!
//! ```no_run
//! use pulseloom::agent::{AgentConfig, BootstrapAgent};
//! use pulseloom::partner::make_partner;
//! use pulseloom::trainer::{DriftConfig, RoundOptions, Trainer};
//!
//! # fn main() -> pulseloom::LoomResult<()> {
//! let agent = BootstrapAgent::new(AgentConfig {
//!     seed: 42,
//!     seed_proto_handles: true,
//!     ..Default::default()
//! })?;
//! let partner = make_partner("mixed", 42)?;
//! let mut trainer = Trainer::new(
//!     agent,
//!     partner,
//!     RoundOptions::default(),
//!     DriftConfig::default(),
//!     42,
//! )?;
//! let history = trainer.train(50);
//! println!("final precision: {}", history.last().unwrap().precision);
//! # Ok(())
//! # }
//! ```

pub mod agent;
pub mod channel;
pub mod error;
pub mod handle;
pub mod lane;
pub mod metrics;
pub mod partner;
pub mod registry;
pub mod report;
pub mod signature;
pub mod trainer;

pub use agent::{AgentConfig, BootstrapAgent};
pub use error::{LoomError, LoomResult};
pub use handle::{Handle, HandleId};
pub use lane::{Decision, Lane};
pub use partner::{Partner, make_partner};
pub use report::RunReport;
pub use trainer::{DriftConfig, RoundOptions, Trainer};
