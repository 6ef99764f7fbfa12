//! Rich diagnostic error types for pulseloom.
//!
//! The core has no exceptional control flow: abstentions, question reroutes,
//! and nonzero error scores are all data, never faults. The only caller-visible
//! errors are construction-time configuration problems (out-of-range
//! thresholds, unknown partner names) and report I/O, each with miette
//! `#[diagnostic]` codes and help text.

use miette::Diagnostic;
use thiserror::Error;

/// Top-level error type for pulseloom.
///
/// Each variant wraps a subsystem-specific error, preserving the full
/// diagnostic chain (error codes, help text, source chains) through to the user.
#[derive(Debug, Error, Diagnostic)]
pub enum LoomError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Partner(#[from] PartnerError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Report(#[from] ReportError),
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("{field} must lie in [0, 1], got {value}")]
    #[diagnostic(
        code(loom::config::out_of_range),
        help(
            "Probabilities, decay rates, gate thresholds, and penalty values \
             are all unit-interval scalars. Check the field named in the \
             message and correct it."
        )
    )]
    OutOfRange { field: &'static str, value: f64 },

    #[error("promote_threshold must be at least 1, got {value}")]
    #[diagnostic(
        code(loom::config::promote_threshold),
        help("A pair must be observed at least once before promotion can fire.")
    )]
    PromoteThreshold { value: u32 },
}

// ---------------------------------------------------------------------------
// Partner errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum PartnerError {
    #[error("unknown partner kind: {name:?}")]
    #[diagnostic(
        code(loom::partner::unknown),
        help(
            "Registered partner kinds are: sumprime, mixed, mixed_shift, \
             mixed_shift_large, adversarial, prime_count, ratio, symmetry. \
             Names are matched case-insensitively."
        )
    )]
    Unknown { name: String },
}

// ---------------------------------------------------------------------------
// Report errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ReportError {
    #[error("I/O error: {source}")]
    #[diagnostic(
        code(loom::report::io),
        help(
            "A filesystem operation on a run report failed. Check that the \
             target directory exists and has correct permissions."
        )
    )]
    Io {
        #[source]
        source: std::io::Error,
    },

    #[error("serialization error: {message}")]
    #[diagnostic(
        code(loom::report::serde),
        help(
            "Failed to serialize or deserialize a run report. The file may \
             have been produced by an incompatible version."
        )
    )]
    Serialization { message: String },
}

/// Convenience alias for functions returning pulseloom results.
pub type LoomResult<T> = std::result::Result<T, LoomError>;
