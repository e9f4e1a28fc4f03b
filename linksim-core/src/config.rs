//! Configuration types for the linksim pipeline.

use serde::{Deserialize, Serialize};

use crate::errors::{ConfigError, Result};

/// Nominal speed of light used for the relative propagation velocity (m/s).
const C_LIGHT: f64 = 3.0e8;

/// Modulation scheme of the transmitted symbol stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ModulationType {
    #[default]
    Nrz,
    DuoBinary,
    Pam4,
}

impl ModulationType {
    /// Numeric code used by configuration files (NRZ=0, duo-binary=1, PAM-4=2).
    pub fn from_code(code: u8) -> Result<Self> {
        match code {
            0 => Ok(Self::Nrz),
            1 => Ok(Self::DuoBinary),
            2 => Ok(Self::Pam4),
            _ => Err(ConfigError::UnknownModulation { code }.into()),
        }
    }

    /// Unit-interval stretch of the scheme: PAM-4 transmits one symbol per
    /// two bit periods, doubling the effective UI.
    pub fn ui_multiplier(self) -> usize {
        match self {
            Self::Nrz | Self::DuoBinary => 1,
            Self::Pam4 => 2,
        }
    }
}

/// Complete configuration record for one simulation run.
///
/// Field names carry their unit suffix where the natural unit is not SI
/// (`ui_ps`, `cout_pf`, ...); the accessor methods convert to SI.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    // Waveform sizing.
    pub nbits: usize,
    pub eye_bits: usize,
    pub nspb: usize,
    pub pattern_len: usize,

    // Transmit electrical.
    pub ui_ps: f64,
    pub vod: f64,
    pub rn: f64,
    pub pn_mag: f64,
    pub pn_freq_mhz: f64,

    // Termination network.
    pub rs: f64,
    pub cout_pf: f64,
    pub rin: f64,
    pub cac_uf: f64,
    pub cin_pf: f64,

    // Channel cross-section.
    pub r0: f64,
    pub w0: f64,
    pub rdc: f64,
    pub z0: f64,
    pub v0_rel: f64,
    pub theta0: f64,
    pub l_ch: f64,

    // Tx FFE taps.
    pub pretap: f64,
    pub posttap: f64,

    // CTLE.
    pub rx_bw_ghz: f64,
    pub peak_freq_ghz: f64,
    pub peak_mag_db: f64,

    // DFE / CDR.
    pub use_dfe: bool,
    pub n_taps: usize,
    pub gain: f64,
    pub delta_t_ps: f64,
    pub alpha: f64,
    pub decision_scaler: f64,
    pub n_ave: usize,
    pub n_lock_ave: usize,
    pub rel_lock_tol: f64,
    pub lock_sustain: usize,
    pub sum_bw_ghz: f64,
    pub sum_ideal: bool,

    /// Periodic-component threshold for jitter decomposition (sigma multiples).
    pub thresh: f64,

    pub mod_type: ModulationType,

    /// Seed for the pattern and noise generators; entropy-seeded when absent.
    pub rng_seed: Option<u64>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            nbits: 4000,
            eye_bits: 2000,
            nspb: 32,
            pattern_len: 127,

            ui_ps: 100.0,
            vod: 1.0,
            rn: 0.001,
            pn_mag: 0.001,
            pn_freq_mhz: 11.0,

            rs: 100.0,
            cout_pf: 0.5,
            rin: 100.0,
            cac_uf: 1.0,
            cin_pf: 0.5,

            r0: 1.452,
            w0: 10.0e6,
            rdc: 0.1876,
            z0: 100.0,
            v0_rel: 0.67,
            theta0: 0.02,
            l_ch: 1.0,

            pretap: -0.05,
            posttap: -0.10,

            rx_bw_ghz: 12.0,
            peak_freq_ghz: 5.0,
            peak_mag_db: 1.7,

            use_dfe: true,
            n_taps: 5,
            gain: 0.1,
            delta_t_ps: 0.1,
            alpha: 0.01,
            decision_scaler: 0.5,
            n_ave: 100,
            n_lock_ave: 500,
            rel_lock_tol: 0.1,
            lock_sustain: 500,
            sum_bw_ghz: 12.0,
            sum_ideal: true,

            thresh: 6.0,

            mod_type: ModulationType::Nrz,
            rng_seed: None,
        }
    }
}

impl SimulationConfig {
    /// Base unit interval in seconds (before any PAM-4 correction).
    pub fn ui(&self) -> f64 {
        self.ui_ps * 1.0e-12
    }

    pub fn pn_freq(&self) -> f64 {
        self.pn_freq_mhz * 1.0e6
    }

    /// Source parasitic capacitance (F).
    pub fn cs(&self) -> f64 {
        self.cout_pf * 1.0e-12
    }

    /// Load a.c. coupling capacitance (F).
    pub fn cl(&self) -> f64 {
        self.cac_uf * 1.0e-6
    }

    /// Load parasitic capacitance (F).
    pub fn cp(&self) -> f64 {
        self.cin_pf * 1.0e-12
    }

    /// Propagation velocity (m/s).
    pub fn v0(&self) -> f64 {
        self.v0_rel * C_LIGHT
    }

    pub fn rx_bw(&self) -> f64 {
        self.rx_bw_ghz * 1.0e9
    }

    pub fn peak_freq(&self) -> f64 {
        self.peak_freq_ghz * 1.0e9
    }

    pub fn sum_bw(&self) -> f64 {
        self.sum_bw_ghz * 1.0e9
    }

    pub fn delta_t(&self) -> f64 {
        self.delta_t_ps * 1.0e-12
    }

    /// Check the configuration before a run. Every failure aborts the run.
    pub fn validate(&self) -> Result<()> {
        if self.nbits == 0 || self.nspb == 0 {
            return Err(ConfigError::InvalidSizing {
                nbits: self.nbits,
                nspb: self.nspb,
            }
            .into());
        }
        if self.pattern_len < 4 {
            return Err(ConfigError::PatternTooShort {
                pattern_len: self.pattern_len,
            }
            .into());
        }
        if self.eye_bits == 0 || self.eye_bits > self.nbits {
            return Err(ConfigError::EyeWindowTooWide {
                eye_bits: self.eye_bits,
                nbits: self.nbits,
            }
            .into());
        }
        if self.ui_ps <= 0.0 {
            return Err(ConfigError::InvalidUnitInterval { ui_ps: self.ui_ps }.into());
        }
        // PAM-4 consumes bits in pairs.
        if self.mod_type == ModulationType::Pam4 && self.nbits % 2 != 0 {
            return Err(ConfigError::InvalidSizing {
                nbits: self.nbits,
                nspb: self.nspb,
            }
            .into());
        }
        Ok(())
    }
}

/// Derived sampling-grid values, fixed for the whole run.
///
/// PAM-4 transmits one symbol per two bit periods; rather than mutating the
/// configured values in place, the correction is applied once here so the
/// invariant `nspui = nspb * ui_multiplier` stays visible.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeBase {
    /// Effective unit interval (s).
    pub ui: f64,
    /// Number of effective unit intervals in the record.
    pub nui: usize,
    /// Unit intervals inside the eye/analysis window.
    pub eye_uis: usize,
    /// Samples per effective unit interval.
    pub nspui: usize,
    /// Total sample count (`nbits * nspb`), also the FFT length.
    pub npts: usize,
    /// Sample interval (s).
    pub ts: f64,
    /// Sample rate (1/s).
    pub fs: f64,
    /// Frequency resolution of the FFT grid (Hz).
    pub f0: f64,
}

impl TimeBase {
    pub fn derive(cfg: &SimulationConfig) -> Self {
        let base_ui = cfg.ui();
        let m = cfg.mod_type.ui_multiplier();
        let npts = cfg.nbits * cfg.nspb;
        let ts = base_ui / cfg.nspb as f64;
        Self {
            ui: base_ui * m as f64,
            nui: cfg.nbits / m,
            eye_uis: cfg.eye_bits / m,
            nspui: cfg.nspb * m,
            npts,
            ts,
            fs: cfg.nspb as f64 / base_ui,
            f0: 1.0 / (ts * npts as f64),
        }
    }

    /// Uniform sample-time vector `t[n] = n * Ts`.
    pub fn time_vector(&self) -> Vec<f64> {
        (0..self.npts).map(|i| i as f64 * self.ts).collect()
    }

    /// Angular-frequency vector matching the non-shifted FFT layout:
    /// `[0, w0, 2w0, .., wN, -(wN - w0), .., -w0]`.
    pub fn omega_vector(&self) -> Vec<f64> {
        let half = self.npts / 2;
        let w0 = 2.0 * std::f64::consts::PI * self.f0;
        let mut w: Vec<f64> = (0..=half).map(|i| i as f64 * w0).collect();
        w.extend((1..self.npts - half).map(|i| -((self.npts - half - i) as f64) * w0));
        w
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn default_config_is_valid() {
        assert!(SimulationConfig::default().validate().is_ok());
    }

    #[test]
    fn pattern_too_short_is_rejected() {
        let cfg = SimulationConfig {
            pattern_len: 3,
            ..SimulationConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn modulation_codes_round_trip() {
        assert_eq!(ModulationType::from_code(0).unwrap(), ModulationType::Nrz);
        assert_eq!(ModulationType::from_code(1).unwrap(), ModulationType::DuoBinary);
        assert_eq!(ModulationType::from_code(2).unwrap(), ModulationType::Pam4);
        assert!(ModulationType::from_code(3).is_err());
    }

    #[test]
    fn pam4_doubles_effective_unit_interval() {
        let cfg = SimulationConfig {
            mod_type: ModulationType::Pam4,
            ..SimulationConfig::default()
        };
        let tb = TimeBase::derive(&cfg);
        assert_relative_eq!(tb.ui, 2.0 * cfg.ui());
        assert_eq!(tb.nui, cfg.nbits / 2);
        assert_eq!(tb.eye_uis, cfg.eye_bits / 2);
        assert_eq!(tb.nspui, cfg.nspb * 2);
        // The sample grid itself is untouched.
        assert_eq!(tb.npts, cfg.nbits * cfg.nspb);
        assert_relative_eq!(tb.ts, cfg.ui() / cfg.nspb as f64);
    }

    #[test]
    fn partial_toml_overrides_defaults() {
        let cfg: SimulationConfig = toml::from_str(
            r#"
            nbits = 1000
            mod_type = "Pam4"
            rx_bw_ghz = 20.0
            "#,
        )
        .unwrap();
        assert_eq!(cfg.nbits, 1000);
        assert_eq!(cfg.mod_type, ModulationType::Pam4);
        assert_relative_eq!(cfg.rx_bw(), 20.0e9);
        assert_eq!(cfg.nspb, SimulationConfig::default().nspb);
    }

    #[test]
    fn omega_vector_has_mirrored_layout() {
        let cfg = SimulationConfig {
            nbits: 4,
            nspb: 2,
            ..SimulationConfig::default()
        };
        let tb = TimeBase::derive(&cfg);
        let w = tb.omega_vector();
        assert_eq!(w.len(), 8);
        let w0 = 2.0 * std::f64::consts::PI * tb.f0;
        assert_relative_eq!(w[0], 0.0);
        assert_relative_eq!(w[4], 4.0 * w0);
        assert_relative_eq!(w[5], -3.0 * w0);
        assert_relative_eq!(w[7], -w0);
    }
}
