//! Signal processing kernels shared by the pipeline stages
//!
//! This module provides the numeric core of the simulator:
//! - Forward/inverse DFTs and FFT-based linear convolution
//! - Threshold-crossing extraction for jitter analysis
//! - Impulse-response trimming and TIE-track uniformization
//! - The periodic-noise coupling filter
//!
//! All routines operate on `f64` samples; frequency responses use
//! `num_complex::Complex64` in the non-shifted FFT layout.

pub mod crossings;
pub mod fft;
pub mod filters;

// Re-export commonly used items
pub use crossings::{find_crossing_times, find_crossings, CrossingOptions};
pub use fft::{convolve_trunc, fft, ifft_real};
pub use filters::highpass_coupling_filter;
