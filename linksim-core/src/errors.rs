//! Linksim error types with granular categories

use thiserror::Error;

/// Top-level error type for all linksim operations
#[derive(Debug, Error)]
pub enum LinkError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("DSP processing error: {0}")]
    Dsp(#[from] DspError),
}

/// Configuration errors
///
/// Every variant aborts the run before any waveform is produced.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Unknown modulation type: {code}")]
    UnknownModulation { code: u8 },

    #[error("Invalid sample sizing: nbits={nbits}, nspb={nspb} (both must be > 0)")]
    InvalidSizing { nbits: usize, nspb: usize },

    #[error("Pattern length {pattern_len} is too short (must be >= 4)")]
    PatternTooShort { pattern_len: usize },

    #[error("Eye window of {eye_bits} bits does not fit in {nbits} bits")]
    EyeWindowTooWide { eye_bits: usize, nbits: usize },

    #[error("Unit interval {ui_ps} ps must be positive")]
    InvalidUnitInterval { ui_ps: f64 },

    #[error("Minimum delay {min_delay} s is past the end of the record ({t_end} s)")]
    MinDelayPastEnd { min_delay: f64, t_end: f64 },

    #[error("Pattern period spans no crossings (pattern_len={pattern_len})")]
    NoCrossingsInPattern { pattern_len: usize },

    #[error(
        "TIE track too short for pattern averaging: have {have}, need {need} \
         (the record must span enough pattern repetitions, with no crossings lost at the tail)"
    )]
    InsufficientCrossings { have: usize, need: usize },
}

/// DSP processing errors
#[derive(Debug, Error)]
pub enum DspError {
    #[error("Input signal never exceeds the minimum initial deviation ({min_dev})")]
    InsufficientSignal { min_dev: f64 },

    #[error("Recovered clock times do not cover the eye window (need past {needed} s, have {covered} s)")]
    InsufficientCoverage { needed: f64, covered: f64 },

    #[error("Length mismatch between time and value vectors: {t_len} vs {x_len}")]
    LengthMismatch { t_len: usize, x_len: usize },

    #[error("High-pass filter design failed: corner {corner_hz} Hz at sample rate {fs_hz} Hz")]
    FilterDesignFailed { corner_hz: f64, fs_hz: f64 },
}

/// Result type alias for linksim operations
pub type Result<T> = std::result::Result<T, LinkError>;
