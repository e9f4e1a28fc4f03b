//! Threshold-crossing extraction
//!
//! Crossing times are the raw material of the jitter decomposition: every
//! stage output is reduced to an ordered list of interpolated threshold
//! crossings before any timing statistics are computed.

use crate::config::ModulationType;
use crate::errors::{ConfigError, DspError, Result};

/// Options controlling the crossing scan.
#[derive(Debug, Clone, Copy)]
pub struct CrossingOptions {
    /// Earliest time at which a crossing may be reported.
    pub min_delay: f64,
    /// When set, drop the first crossing if it is not a rising edge.
    ///
    /// The bit stream always opens with the `[0, 1, 1]` sync marker, so the
    /// first retained crossing of a clean signal is rising; starting the
    /// scan there keeps ideal and actual crossing lists aligned.
    pub rising_first: bool,
    /// Minimum initial deviation from zero (normalized to max |x|) that must
    /// be seen before the scan starts.
    pub min_init_dev: f64,
}

impl Default for CrossingOptions {
    fn default() -> Self {
        Self {
            min_delay: 0.0,
            rising_first: true,
            min_init_dev: 0.1,
        }
    }
}

/// Find the times at which `x` crosses `thresh`, by linear interpolation.
///
/// The scan skips leading samples whose magnitude stays below
/// `min_init_dev * max|x|`; a signal that never exceeds that deviation
/// surfaces [`DspError::InsufficientSignal`].
pub fn find_crossing_times(
    t: &[f64],
    x: &[f64],
    opts: CrossingOptions,
    thresh: f64,
) -> Result<Vec<f64>> {
    if t.len() != x.len() {
        return Err(DspError::LengthMismatch {
            t_len: t.len(),
            x_len: x.len(),
        }
        .into());
    }
    if x.is_empty() {
        return Ok(Vec::new());
    }

    let max_mag = x.iter().fold(0.0_f64, |m, &v| m.max(v.abs()));
    let min_mag = opts.min_init_dev * max_mag;
    let mut start = 0;
    while start < x.len() && x[start].abs() < min_mag {
        start += 1;
    }
    if start == x.len() {
        return Err(DspError::InsufficientSignal { min_dev: min_mag }.into());
    }

    let x = &x[start..];
    let t = &t[start..];
    let shifted: Vec<f64> = x.iter().map(|&v| v - thresh).collect();

    // Exact zeros would register twice (once entering, once leaving), so
    // promote them to +1 before differencing the sign track.
    let signs: Vec<f64> = shifted
        .iter()
        .map(|&v| {
            let s = v.signum();
            if v == 0.0 {
                1.0
            } else {
                s
            }
        })
        .collect();

    let mut xings = Vec::new();
    let mut rising = Vec::new();
    for i in 0..signs.len() - 1 {
        let d = signs[i + 1] - signs[i];
        if d != 0.0 {
            let frac = shifted[i] / (shifted[i] - shifted[i + 1]);
            xings.push(t[i] + (t[i + 1] - t[i]) * frac);
            rising.push(d > 0.0);
        }
    }

    let mut min_time = t[0];
    if opts.min_delay > 0.0 {
        let t_end = *t.last().unwrap_or(&0.0);
        if opts.min_delay >= t_end {
            return Err(ConfigError::MinDelayPastEnd {
                min_delay: opts.min_delay,
                t_end,
            }
            .into());
        }
        let mut j = 0;
        while j < t.len() && t[j] < opts.min_delay {
            j += 1;
        }
        min_time = t[j];
    }

    let mut first = 0;
    while first < xings.len() && xings[first] < min_time {
        first += 1;
    }
    if opts.rising_first && first < xings.len() && !rising[first] {
        first += 1;
    }

    Ok(xings.split_off(first))
}

/// Find the crossing times of a stage output, according to modulation type.
///
/// NRZ and PAM-4 use a single zero-threshold scan; duo-binary has no zero
/// crossings at all, so it is scanned at both `±amplitude/2` and the results
/// merged in time order.
pub fn find_crossings(
    t: &[f64],
    x: &[f64],
    amplitude: f64,
    opts: CrossingOptions,
    mod_type: ModulationType,
) -> Result<Vec<f64>> {
    match mod_type {
        ModulationType::Nrz | ModulationType::Pam4 => find_crossing_times(t, x, opts, 0.0),
        ModulationType::DuoBinary => {
            let mut lo = find_crossing_times(t, x, opts, -amplitude / 2.0)?;
            let hi = find_crossing_times(t, x, opts, amplitude / 2.0)?;
            lo.extend(hi);
            lo.sort_by(|a, b| a.partial_cmp(b).expect("crossing times are finite"));
            Ok(lo)
        }
    }
}
