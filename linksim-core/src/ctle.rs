//! Continuous-time linear equalizer synthesis and application
//!
//! The CTLE is specified by its natural bandwidth, peaking frequency, and
//! peaking magnitude. Those three numbers pin a two-pole/one-zero transfer
//! function: poles at the bandwidth and the peaking frequency, zero placed
//! to produce the requested boost.

use num_complex::Complex64;

use crate::config::{SimulationConfig, TimeBase};
use crate::signal_processing::fft::{convolve_trunc, fft, ifft_real};
use crate::transmitter::TxOutput;
use crate::utils::{argmax, resize_zero};

/// CTLE specification, in SI units.
#[derive(Debug, Clone, Copy)]
pub struct CtleParams {
    /// Unequalized signal-path bandwidth (Hz).
    pub rx_bw: f64,
    /// Peaking frequency (Hz).
    pub peak_freq: f64,
    /// Peaking magnitude (dB, relative to d.c.).
    pub peak_mag_db: f64,
}

impl CtleParams {
    pub fn from_config(cfg: &SimulationConfig) -> Self {
        Self {
            rx_bw: cfg.rx_bw(),
            peak_freq: cfg.peak_freq(),
            peak_mag_db: cfg.peak_mag_db,
        }
    }
}

/// Rational transfer function in polynomial form, assembled from the
/// partial-fraction residues over the pole pair.
#[derive(Debug, Clone, Copy)]
struct Rational {
    /// Numerator coefficients, descending powers of s.
    num: [f64; 2],
    /// Denominator coefficients, descending powers of s.
    den: [f64; 3],
}

fn synthesize_rational(p: &CtleParams) -> Rational {
    let p2 = -2.0 * std::f64::consts::PI * p.rx_bw;
    let p1 = -2.0 * std::f64::consts::PI * p.peak_freq;
    let z = p1 / 10.0_f64.powf(p.peak_mag_db / 20.0);

    if p1 != p2 {
        // H(s) = r1/(s - p1) + r2/(s - p2)
        let r1 = (z - p1) / (p2 - p1);
        let r2 = 1.0 - r1;
        Rational {
            num: [r1 + r2, -(r1 * p2 + r2 * p1)],
            den: [1.0, -(p1 + p2), p1 * p2],
        }
    } else {
        // Degenerate pole pair: H(s) = r1/(s - p1) + r2/(s - p1)^2
        let r1 = -1.0;
        let r2 = z - p1;
        Rational {
            num: [r1, r2 - r1 * p1],
            den: [1.0, -2.0 * p1, p1 * p1],
        }
    }
}

/// Evaluate the CTLE frequency response on the given angular-frequency grid
/// and normalize it to unit d.c. gain.
pub fn synthesize(p: &CtleParams, ws: &[f64]) -> Vec<Complex64> {
    let rational = synthesize_rational(p);
    let mut response: Vec<Complex64> = ws
        .iter()
        .map(|&w| {
            let s = Complex64::new(0.0, w);
            let num = s * rational.num[0] + rational.num[1];
            let den = (s * rational.den[0] + rational.den[1]) * s + rational.den[2];
            num / den
        })
        .collect();
    let dc_mag = response.first().map(|v| v.norm()).unwrap_or(1.0);
    if dc_mag > 0.0 {
        for v in response.iter_mut() {
            *v /= dc_mag;
        }
    }
    response
}

/// CTLE stage outputs and responses.
#[derive(Debug, Clone)]
pub struct CtleOutput {
    /// Equalized waveform.
    pub out: Vec<f64>,
    /// CTLE-only impulse response, truncated to the channel-response length.
    pub h: Vec<f64>,
    /// CTLE-only frequency response (unit d.c.), full FFT grid.
    pub transfer: Vec<Complex64>,
    /// Cumulative impulse response through Tx, channel, and CTLE.
    pub h_cascade: Vec<f64>,
    /// Cumulative frequency response.
    pub transfer_cascade: Vec<Complex64>,
    /// Time of the cumulative-response peak: the pipeline's estimate of the
    /// total convolutional delay (s).
    pub conv_dly: f64,
}

/// Run the CTLE stage over the transmitter output.
pub fn apply(p: &CtleParams, tb: &TimeBase, tx: &TxOutput, chnl_len: usize) -> CtleOutput {
    let ws = tb.omega_vector();
    let transfer = synthesize(p, &ws);
    let h: Vec<f64> = ifft_real(&transfer).into_iter().take(chnl_len).collect();

    let out = convolve_trunc(&tx.out, &h, tx.out.len());
    let h_cascade = convolve_trunc(&tx.h_cascade, &h, tx.h_cascade.len());
    let conv_dly = argmax(&h_cascade) as f64 * tb.ts;
    let transfer_cascade = fft(&resize_zero(&h_cascade, tb.npts));

    CtleOutput {
        out,
        h,
        transfer,
        h_cascade,
        transfer_cascade,
        conv_dly,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{SimulationConfig, TimeBase};
    use approx::assert_relative_eq;

    fn grid() -> (TimeBase, Vec<f64>) {
        let cfg = SimulationConfig {
            nbits: 256,
            nspb: 32,
            ..SimulationConfig::default()
        };
        let tb = TimeBase::derive(&cfg);
        let ws = tb.omega_vector();
        (tb, ws)
    }

    #[test]
    fn dc_gain_is_unity_after_normalization() {
        let (_, ws) = grid();
        let p = CtleParams {
            rx_bw: 12.0e9,
            peak_freq: 5.0e9,
            peak_mag_db: 6.0,
        };
        let response = synthesize(&p, &ws);
        assert_relative_eq!(response[0].norm(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn response_peaks_near_the_peaking_frequency() {
        let (tb, ws) = grid();
        let p = CtleParams {
            rx_bw: 12.0e9,
            peak_freq: 5.0e9,
            peak_mag_db: 6.0,
        };
        let response = synthesize(&p, &ws);
        let bin_of = |f: f64| (f / tb.f0).round() as usize;
        let peak_mag = response[bin_of(5.0e9)].norm();
        assert!(peak_mag > 1.2, "expected peaking, got {}", peak_mag);
        // Well above both poles the response rolls off below d.c.
        let hf_mag = response[bin_of(40.0e9).min(ws.len() / 2)].norm();
        assert!(hf_mag < peak_mag);
    }

    #[test]
    fn degenerate_pole_pair_stays_finite() {
        let (_, ws) = grid();
        let p = CtleParams {
            rx_bw: 5.0e9,
            peak_freq: 5.0e9,
            peak_mag_db: 3.0,
        };
        let response = synthesize(&p, &ws);
        assert!(response.iter().all(|v| v.re.is_finite() && v.im.is_finite()));
        assert_relative_eq!(response[0].norm(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn impulse_response_integrates_to_unit_dc() {
        let (tb, ws) = grid();
        let p = CtleParams {
            rx_bw: 12.0e9,
            peak_freq: 5.0e9,
            peak_mag_db: 1.7,
        };
        let response = synthesize(&p, &ws);
        let h = ifft_real(&response);
        let sum: f64 = h.iter().sum();
        // sum(h) equals H(0) for the untruncated inverse transform.
        assert_relative_eq!(sum, 1.0, epsilon = 1e-6);
        assert_eq!(h.len(), tb.npts);
    }
}
