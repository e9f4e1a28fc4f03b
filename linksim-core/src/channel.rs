//! Channel modeling: lossy transmission line with terminated source and load
//!
//! The interconnect follows the metallic-transmission model: skin-effect
//! series resistance, dielectric-loss shunt capacitance, and the resulting
//! frequency-dependent propagation constant and characteristic impedance.
//! The loaded transfer function folds in the source/load networks and the
//! reflections between them.

use num_complex::Complex64;

use crate::config::SimulationConfig;
use crate::signal_processing::fft::ifft_real;
use crate::signal_processing::filters::trim_impulse;

/// Frequency floor substituted for ω = 0 to avoid division by zero. The
/// d.c. point is discarded by downstream log-scale plots anyway.
const OMEGA_FLOOR: f64 = 1.0e-12;

/// Cross-sectional and termination parameters of the channel.
#[derive(Debug, Clone, Copy)]
pub struct ChannelParams {
    /// Skin-effect resistance (Ω/m).
    pub r0: f64,
    /// Skin-effect crossover frequency (rad/s).
    pub w0: f64,
    /// D.c. resistance (Ω/m).
    pub rdc: f64,
    /// Characteristic impedance in the LC region (Ω).
    pub z0: f64,
    /// Propagation velocity (m/s).
    pub v0: f64,
    /// Loss tangent.
    pub theta0: f64,
    /// Line length (m).
    pub length: f64,
    /// Source series resistance (Ω).
    pub rs: f64,
    /// Source parasitic capacitance (F).
    pub cs: f64,
    /// Load resistance, differential (Ω).
    pub rl: f64,
    /// Load parasitic capacitance, single ended (F).
    pub cp: f64,
    /// Load d.c. blocking capacitance, single ended (F).
    pub cl: f64,
}

impl ChannelParams {
    pub fn from_config(cfg: &SimulationConfig) -> Self {
        Self {
            r0: cfg.r0,
            w0: cfg.w0,
            rdc: cfg.rdc,
            z0: cfg.z0,
            v0: cfg.v0(),
            theta0: cfg.theta0,
            length: cfg.l_ch,
            rs: cfg.rs,
            cs: cfg.cs(),
            rl: cfg.rin,
            cp: cfg.cp(),
            cl: cfg.cl(),
        }
    }

    /// Bulk propagation delay of the line (s).
    pub fn delay(&self) -> f64 {
        self.length / self.v0
    }
}

/// Propagation constant `γ(ω)` and characteristic impedance `Zc(ω)` from the
/// cross-sectional parameters.
pub fn propagation_constant(p: &ChannelParams, ws: &[f64]) -> (Vec<Complex64>, Vec<Complex64>) {
    let l0 = p.z0 / p.v0; // external inductance per unit length (H/m)
    let c0 = 1.0 / (p.z0 * p.v0); // nominal capacitance per unit length (F/m)

    let mut gamma = Vec::with_capacity(ws.len());
    let mut zc = Vec::with_capacity(ws.len());
    for (i, &w_raw) in ws.iter().enumerate() {
        let w = if i == 0 && w_raw == 0.0 { OMEGA_FLOOR } else { w_raw };
        let jw = Complex64::new(0.0, w);
        let rac = (Complex64::new(0.0, 2.0 * w / p.w0)).sqrt() * p.r0;
        let r = (Complex64::new(p.rdc * p.rdc, 0.0) + rac * rac).sqrt();
        let c = Complex64::new(0.0, w / p.w0).powf(-2.0 * p.theta0 / std::f64::consts::PI) * c0;
        let series = jw * l0 + r;
        let shunt = jw * c;
        gamma.push((series * shunt).sqrt());
        zc.push((series / shunt).sqrt());
    }
    (gamma, zc)
}

/// Fully loaded transfer function of the complete channel.
///
/// `h` is the unloaded line response `exp(-ℓγ)`, `zc` the matching
/// characteristic impedance. The result is the voltage across the load
/// resistor, including the admittance divider into the line and the
/// source/load reflections.
pub fn loaded_transfer_function(
    p: &ChannelParams,
    h: &[Complex64],
    zc: &[Complex64],
    ws: &[f64],
) -> Vec<Complex64> {
    let mut g = Vec::with_capacity(ws.len());
    for (i, &w_raw) in ws.iter().enumerate() {
        let w = if i == 0 && w_raw == 0.0 { OMEGA_FLOOR } else { w_raw };
        let jw = Complex64::new(0.0, w);

        // Impedance looking back into the Tx output: parallel RC.
        let zs = p.rs / (Complex64::new(1.0, 0.0) + jw * p.rs * p.cs);
        // Rx load: two series blocking caps, then Rterm in parallel with the
        // series combination of the two parasitic caps.
        let z_shunt = p.rl / (Complex64::new(1.0, 0.0) + jw * p.rl * p.cp / 2.0);
        let zl = 2.0 / (jw * p.cl) + z_shunt;
        // Admittance divider into the interconnect.
        let cs_par_zc = zc[i] / (Complex64::new(1.0, 0.0) + jw * zc[i] * p.cs);
        let a = cs_par_zc / (p.rs + cs_par_zc);
        // Reflection coefficients at the load and the source.
        let r1 = (zl - zc[i]) / (zl + zc[i]);
        let r2 = (zs - zc[i]) / (zs + zc[i]);

        let loaded = a * h[i] * (Complex64::new(1.0, 0.0) + r1)
            / (Complex64::new(1.0, 0.0) - r1 * r2 * h[i] * h[i]);
        // We want what appears across the load resistor, not across ZL.
        g.push(loaded * (z_shunt / zl));
    }
    g
}

/// Channel response bundle: frequency response, trimmed impulse response,
/// and the trim bookkeeping needed to place it on the time axis.
#[derive(Debug, Clone)]
pub struct ChannelResponse {
    /// Loaded frequency response over the full FFT grid.
    pub transfer: Vec<Complex64>,
    /// Trimmed impulse response.
    pub h: Vec<f64>,
    /// Index of the first retained impulse-response sample.
    pub start_ix: usize,
    /// Bulk propagation delay (s).
    pub delay: f64,
}

/// Compute the channel response over the given angular-frequency grid.
///
/// The factor of two compensates the nominal differential half divider, so
/// a matched zero-length line comes out near unity in the passband.
pub fn analyze(p: &ChannelParams, ws: &[f64], ts: f64) -> ChannelResponse {
    let (gamma, zc) = propagation_constant(p, ws);
    let h_line: Vec<Complex64> = gamma.iter().map(|&g| (-p.length * g).exp()).collect();
    let transfer: Vec<Complex64> = loaded_transfer_function(p, &h_line, &zc, ws)
        .into_iter()
        .map(|v| v * 2.0)
        .collect();
    let h_raw = ifft_real(&transfer);
    let delay = p.delay();
    let (h, start_ix) = trim_impulse(&h_raw, ts, delay);
    ChannelResponse {
        transfer,
        h,
        start_ix,
        delay,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{SimulationConfig, TimeBase};

    fn test_params(length: f64) -> ChannelParams {
        let cfg = SimulationConfig {
            l_ch: length,
            ..SimulationConfig::default()
        };
        ChannelParams::from_config(&cfg)
    }

    fn grid() -> (Vec<f64>, f64) {
        let cfg = SimulationConfig {
            nbits: 512,
            nspb: 32,
            ..SimulationConfig::default()
        };
        let tb = TimeBase::derive(&cfg);
        (tb.omega_vector(), tb.ts)
    }

    #[test]
    fn dc_point_is_guarded() {
        let p = test_params(1.0);
        let (ws, _) = grid();
        assert_eq!(ws[0], 0.0);
        let (gamma, zc) = propagation_constant(&p, &ws);
        assert!(gamma[0].re.is_finite() && gamma[0].im.is_finite());
        assert!(zc[0].re.is_finite() && zc[0].im.is_finite());
    }

    #[test]
    fn zero_length_line_is_transparent_in_passband() {
        let p = test_params(0.0);
        let (ws, ts) = grid();
        let resp = analyze(&p, &ws, ts);
        // Pick a bin around 1 GHz: well above the a.c.-coupling corner,
        // well below the parasitic roll-off.
        let f0 = ws[1] / (2.0 * std::f64::consts::PI);
        let bin = (1.0e9 / f0).round() as usize;
        let mag = resp.transfer[bin].norm();
        assert!(mag > 0.7 && mag < 1.2, "passband magnitude {}", mag);
    }

    #[test]
    fn loss_grows_with_frequency_and_length() {
        let (ws, ts) = grid();
        let short = analyze(&test_params(0.5), &ws, ts);
        let long = analyze(&test_params(2.0), &ws, ts);
        let f0 = ws[1] / (2.0 * std::f64::consts::PI);
        let bin_lo = (1.0e9 / f0).round() as usize;
        let bin_hi = (5.0e9 / f0).round() as usize;
        // Longer line attenuates more at the same frequency.
        assert!(long.transfer[bin_hi].norm() < short.transfer[bin_hi].norm());
        // A lossy line attenuates high frequencies more than low ones.
        assert!(long.transfer[bin_hi].norm() < long.transfer[bin_lo].norm());
    }

    #[test]
    fn impulse_energy_sits_after_the_bulk_delay() {
        let (ws, ts) = grid();
        let p = test_params(1.0);
        let resp = analyze(&p, &ws, ts);
        assert!(!resp.h.is_empty());
        // The trim retains 10% of the delay as pre-cursor margin.
        let expected_start = (0.9 * resp.delay / ts) as usize;
        assert_eq!(resp.start_ix, expected_start);
        let peak_ix = crate::utils::argmax(&resp.h);
        let peak_time = (resp.start_ix + peak_ix) as f64 * ts;
        assert!(
            (peak_time - resp.delay).abs() < 0.5 * resp.delay,
            "peak at {} s, delay {} s",
            peak_time,
            resp.delay
        );
    }
}
