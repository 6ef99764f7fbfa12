//! Oracle partners: named rule implementations behind a common trait.
//!
//! A partner is a (possibly stateful) function from a sent pulse sequence to
//! a response sequence. The factory dispatches over a name rather than an
//! inheritance hierarchy; unknown names are construction errors. Stochastic
//! partners own an independently seeded generator so reruns reproduce
//! identical traces.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::{LoomResult, PartnerError};
use crate::signature::{Pulse, Seq, signature};

/// Contract every oracle implementation presents to the trainer.
///
/// `respond` takes `&mut self` because some partners are phase-dependent,
/// keyed on an internal call counter.
pub trait Partner {
    fn name(&self) -> &'static str;
    fn respond(&mut self, sent: &[Pulse]) -> Seq;
}

/// Build a partner by kind name (case-insensitive). Several kinds accept
/// aliases, mirroring how operators refer to them in run configs.
pub fn make_partner(kind: &str, seed: u64) -> LoomResult<Box<dyn Partner>> {
    let partner: Box<dyn Partner> = match kind.trim().to_lowercase().as_str() {
        "sumprime" | "sum_prime" => Box::new(SumPrimePartner),
        "mixed" => Box::new(MixedPartner),
        "mixed_shift" => Box::new(MixedShiftPartner::new(500)),
        "mixed_shift_large" => Box::new(MixedShiftPartner::new(5000)),
        "adversarial" => Box::new(AdversarialPartner::new(seed)),
        "prime" | "prime_count" => Box::new(PrimeCountPartner),
        "ratio" | "2to1" => Box::new(RatioPartner),
        "symmetry" | "palindrome" => Box::new(SymmetryPartner),
        other => {
            return Err(PartnerError::Unknown {
                name: other.to_string(),
            }
            .into());
        }
    };
    Ok(partner)
}

fn is_prime(n: u64) -> bool {
    if n <= 1 {
        return false;
    }
    if n <= 3 {
        return true;
    }
    if n % 2 == 0 {
        return false;
    }
    let r = n.isqrt();
    let mut k = 3;
    while k <= r {
        if n % k == 0 {
            return false;
        }
        k += 2;
    }
    true
}

fn pulse_sum(sent: &[Pulse]) -> u64 {
    sent.iter().map(|&p| u64::from(p)).sum()
}

// ---------------------------------------------------------------------------
// Deterministic rule partners
// ---------------------------------------------------------------------------

/// Responds `[7]` iff the pulse sum is prime, otherwise silence.
pub struct SumPrimePartner;

impl Partner for SumPrimePartner {
    fn name(&self) -> &'static str {
        "sumprime"
    }

    fn respond(&mut self, sent: &[Pulse]) -> Seq {
        if sent.is_empty() {
            return Vec::new();
        }
        if is_prime(pulse_sum(sent)) {
            vec![7]
        } else {
            Vec::new()
        }
    }
}

/// Includes 5 if the length is prime, 7 if the sum is prime, sorted.
/// The only partner that can answer multi-label ("ambiguous" ground truth).
pub struct MixedPartner;

impl MixedPartner {
    fn rule(sent: &[Pulse]) -> Seq {
        if sent.is_empty() {
            return Vec::new();
        }
        let mut out = Vec::new();
        if is_prime(sent.len() as u64) {
            out.push(5);
        }
        if is_prime(pulse_sum(sent)) {
            out.push(7);
        }
        out
    }
}

impl Partner for MixedPartner {
    fn name(&self) -> &'static str {
        "mixed"
    }

    fn respond(&mut self, sent: &[Pulse]) -> Seq {
        Self::rule(sent)
    }
}

/// Phase-switching partner: the mixed rule until `split_point` calls, then a
/// parity rule ([2] for even sums, [1] for odd). Exercises drift detection.
pub struct MixedShiftPartner {
    split_point: u64,
    step_count: u64,
}

impl MixedShiftPartner {
    pub fn new(split_point: u64) -> Self {
        Self {
            split_point,
            step_count: 0,
        }
    }
}

impl Partner for MixedShiftPartner {
    fn name(&self) -> &'static str {
        "mixed_shift"
    }

    fn respond(&mut self, sent: &[Pulse]) -> Seq {
        let shifted = self.step_count >= self.split_point;
        self.step_count += 1;

        if sent.is_empty() {
            return Vec::new();
        }
        if !shifted {
            MixedPartner::rule(sent)
        } else if pulse_sum(sent) % 2 == 0 {
            vec![2]
        } else {
            vec![1]
        }
    }
}

/// Responds `[5]` iff the pulse count is prime.
pub struct PrimeCountPartner;

impl Partner for PrimeCountPartner {
    fn name(&self) -> &'static str {
        "prime_count"
    }

    fn respond(&mut self, sent: &[Pulse]) -> Seq {
        if is_prime(sent.len() as u64) {
            vec![5]
        } else {
            Vec::new()
        }
    }
}

/// Fires on an exact 2:1 ratio between the first two pulses; the response
/// echoes the gcd twice as a stable signature.
pub struct RatioPartner;

impl Partner for RatioPartner {
    fn name(&self) -> &'static str {
        "ratio_2_to_1"
    }

    fn respond(&mut self, sent: &[Pulse]) -> Seq {
        if sent.len() < 2 {
            return Vec::new();
        }
        let (a, b) = (sent[0], sent[1]);
        if a == 2 * b || b == 2 * a {
            let g = gcd(a, b);
            vec![g, g]
        } else {
            Vec::new()
        }
    }
}

fn gcd(a: Pulse, b: Pulse) -> Pulse {
    let (mut a, mut b) = (a, b);
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

/// Responds iff the sequence (length ≥ 3) is a palindrome: the middle pulse
/// for odd lengths, `[4]` for even.
pub struct SymmetryPartner;

impl Partner for SymmetryPartner {
    fn name(&self) -> &'static str {
        "symmetry_palindrome"
    }

    fn respond(&mut self, sent: &[Pulse]) -> Seq {
        if sent.len() < 3 {
            return Vec::new();
        }
        let reversed: Seq = sent.iter().rev().copied().collect();
        if reversed != sent {
            return Vec::new();
        }
        if sent.len() % 2 == 1 {
            vec![sent[sent.len() / 2].max(1)]
        } else {
            vec![4]
        }
    }
}

// ---------------------------------------------------------------------------
// Adversarial partner
// ---------------------------------------------------------------------------

/// Adversarial partner with seasons and concept drift.
///
/// - Seasonal ambiguity: for `target_sig` the dominant response flips between
///   `[5]` and `[7]` every `season_len` calls, with probability `p_major` of
///   the dominant answer.
/// - Concept drift: after `drift_step` calls, the mixed-rule answer for
///   `drift_sig` is swapped.
/// - Everything else falls back to the mixed rule.
pub struct AdversarialPartner {
    rng: StdRng,
    season_len: u64,
    drift_step: Option<u64>,
    p_major: f64,
    target_sig: String,
    drift_sig: String,
    total_steps: u64,
}

impl AdversarialPartner {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            season_len: 200,
            drift_step: Some(500),
            p_major: 0.75,
            target_sig: "8,4".to_string(),
            drift_sig: "2,2".to_string(),
            total_steps: 0,
        }
    }
}

impl Partner for AdversarialPartner {
    fn name(&self) -> &'static str {
        "adversarial"
    }

    fn respond(&mut self, sent: &[Pulse]) -> Seq {
        let t = self.total_steps;
        self.total_steps += 1;

        let sent_sig = signature(sent);

        if sent_sig == self.target_sig {
            let season = (t / self.season_len) % 2;
            let roll: f64 = self.rng.r#gen();
            let major = roll < self.p_major;
            return match (season, major) {
                (0, true) | (1, false) => vec![5],
                _ => vec![7],
            };
        }

        if let Some(drift) = self.drift_step {
            if t >= drift && sent_sig == self.drift_sig {
                // Swap what the base rule would have answered.
                return match MixedPartner::rule(sent).as_slice() {
                    [7] => vec![5],
                    [5] => vec![7],
                    [5, 7] => Vec::new(),
                    _ => vec![5, 7],
                };
            }
        }

        MixedPartner::rule(sent)
    }
}
