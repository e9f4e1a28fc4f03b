//! Link diagnostics: timing-jitter decomposition and eye-diagram maps.

pub mod eye;
pub mod jitter;

pub use eye::{calc_eye, EyeMap};
pub use jitter::{calc_jitter, make_uniform, JitterParams, JitterResult};
