//! Noisy transmission channel between agent and partner.
//!
//! Optional pulse jitter models an unreliable medium. The channel owns its
//! own seeded generator; with noise disabled it is a pure pass-through.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::{ConfigError, LoomResult};
use crate::signature::{Pulse, Seq};

/// A single turn: agent sends pulses, partner responds with pulses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exchange {
    pub sent: Seq,
    pub received: Seq,
}

/// Minimal shared channel with optional per-pulse jitter.
pub struct Channel {
    noise_prob: f64,
    noise_jitter: i64,
    rng: StdRng,
}

impl Channel {
    /// Create a channel. `noise_prob` must lie in [0, 1].
    pub fn new(noise_prob: f64, noise_jitter: u32, seed: u64) -> LoomResult<Self> {
        if !(0.0..=1.0).contains(&noise_prob) {
            return Err(ConfigError::OutOfRange {
                field: "noise_prob",
                value: noise_prob,
            }
            .into());
        }
        Ok(Self {
            noise_prob,
            noise_jitter: i64::from(noise_jitter),
            rng: StdRng::seed_from_u64(seed),
        })
    }

    /// Apply noise to both directions of an exchange.
    pub fn transmit(&mut self, sent: &[Pulse], received: &[Pulse]) -> Exchange {
        Exchange {
            sent: self.apply_noise(sent),
            received: self.apply_noise(received),
        }
    }

    fn apply_noise(&mut self, pulses: &[Pulse]) -> Seq {
        if self.noise_prob <= 0.0 || self.noise_jitter <= 0 {
            return pulses.to_vec();
        }
        pulses
            .iter()
            .map(|&p| {
                if self.rng.r#gen::<f64>() < self.noise_prob {
                    let jitter = self.rng.gen_range(-self.noise_jitter..=self.noise_jitter);
                    // Pulses stay positive.
                    (i64::from(p) + jitter).max(1) as Pulse
                } else {
                    p
                }
            })
            .collect()
    }
}
