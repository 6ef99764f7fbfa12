//! Signature codec: canonical string identity for pulse sequences.
//!
//! Every stimulus and response is an ordered sequence of positive integer
//! pulses. The comma-joined decimal form is the sole identity used for
//! equality and registry lookup — two sequences are "the same" iff their
//! signatures are equal. No numeric semantics attach to the signature itself.

/// A single pulse (duration units, positive integer).
pub type Pulse = u32;

/// An ordered pulse sequence.
pub type Seq = Vec<Pulse>;

/// The reserved signature for the empty sequence, also used as the
/// placeholder response of a proto-seeded handle ("not yet known").
pub const EMPTY_SIG: &str = "0";

/// Encode a pulse sequence as its canonical signature string.
pub fn signature(seq: &[Pulse]) -> String {
    if seq.is_empty() {
        return EMPTY_SIG.to_string();
    }
    seq.iter()
        .map(|p| p.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

/// Decode a signature back into a pulse sequence.
///
/// The placeholder `"0"` decodes to the empty sequence. Signatures produced
/// by [`signature`] always round-trip; unparseable components are skipped.
pub fn parse_signature(sig: &str) -> Seq {
    if sig.is_empty() || sig == EMPTY_SIG {
        return Vec::new();
    }
    sig.split(',').filter_map(|s| s.parse().ok()).collect()
}

/// Render a signature for human-readable question text, e.g. `"5,7"` → `"[5 7]"`.
pub fn format_act(sig: &str) -> String {
    if sig.is_empty() || sig == EMPTY_SIG {
        return "[]".to_string();
    }
    format!("[{}]", sig.replace(',', " "))
}
