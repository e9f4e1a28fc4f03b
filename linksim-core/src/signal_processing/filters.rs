//! Coupling filter and impulse-response conditioning

use biquad::{Biquad, Coefficients, DirectForm2Transposed, ToHertz, Type, Q_BUTTERWORTH_F64};

use crate::errors::{DspError, Result};

/// Run a single causal pass of a 2nd-order Butterworth high-pass over `x`.
///
/// Models the capacitive coupling of a periodic aggressor into the signal
/// path: only the transitions of the aggressor survive, not its d.c. level.
///
/// # Arguments
/// * `x` - Input samples
/// * `corner_hz` - High-pass corner frequency (Hz)
/// * `fs_hz` - Sample rate (Hz)
pub fn highpass_coupling_filter(x: &[f64], corner_hz: f64, fs_hz: f64) -> Result<Vec<f64>> {
    let coeffs =
        Coefficients::<f64>::from_params(Type::HighPass, fs_hz.hz(), corner_hz.hz(), Q_BUTTERWORTH_F64)
            .map_err(|_| DspError::FilterDesignFailed {
                corner_hz,
                fs_hz,
            })?;
    let mut filter = DirectForm2Transposed::<f64>::new(coeffs);
    Ok(x.iter().map(|&v| filter.run(v)).collect())
}

/// Trim an impulse response for display and convolution economy.
///
/// Drops a leading portion equal to 90% of the bulk channel delay, and clips
/// the tail at the first index where cumulative energy reaches 99.9% of the
/// total.
///
/// # Returns
/// `(trimmed, start_ix)` where `start_ix` is the index of the first retained
/// sample in the original vector.
pub fn trim_impulse(g: &[f64], ts: f64, chnl_dly: f64) -> (Vec<f64>, usize) {
    let start_ix = ((0.9 * chnl_dly / ts) as usize).min(g.len());
    let total: f64 = g.iter().map(|&v| v * v).sum();
    let target = 0.999 * total;
    let mut acc = 0.0;
    let mut end = 0;
    while end < g.len() && acc < target {
        acc += g[end] * g[end];
        end += 1;
    }
    (g[start_ix..end.max(start_ix)].to_vec(), start_ix)
}
