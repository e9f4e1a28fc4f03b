//! Transmitter stage: 3-tap feed-forward pre-emphasis, aggressor coupling
//! noise, channel convolution, and receive-referred Gaussian noise.

use rand::Rng;
use rand_distr::StandardNormal;

use crate::channel::ChannelResponse;
use crate::config::{SimulationConfig, TimeBase};
use crate::errors::Result;
use crate::signal_processing::fft::{convolve_trunc, fft};
use crate::signal_processing::filters::highpass_coupling_filter;
use crate::symbols::oversample;
use crate::utils::resize_zero;

/// Corner frequency of the high-pass that models capacitive coupling of the
/// periodic aggressor into the victim (Hz).
pub const CORNER_FREQ: f64 = 1.0e6;

/// Transmitter stage outputs and responses.
#[derive(Debug, Clone)]
pub struct TxOutput {
    /// Waveform at the receiver input (after channel and noise).
    pub out: Vec<f64>,
    /// Tx-only impulse response (FFE taps at symbol spacing), matched to the
    /// channel impulse-response length.
    pub h: Vec<f64>,
    /// Tx-only frequency response over the full FFT grid.
    pub transfer: Vec<num_complex::Complex64>,
    /// Cumulative Tx-plus-channel impulse response.
    pub h_cascade: Vec<f64>,
    /// Cumulative Tx-plus-channel frequency response.
    pub transfer_cascade: Vec<num_complex::Complex64>,
}

/// FFE tap vector `[pre, main, post]` with the main cursor absorbing the
/// magnitude taken by the outer taps, scaled to the output swing.
pub fn ffe_taps(pretap: f64, posttap: f64, vod: f64) -> [f64; 3] {
    [
        pretap * vod,
        (1.0 - pretap.abs() - posttap.abs()) * vod,
        posttap * vod,
    ]
}

/// Run the transmitter stage.
///
/// The FFE operates at symbol rate (one tap per symbol); the result is then
/// oversampled by zero-order hold, the coupling noise added, the whole
/// convolved with the channel, and finally the receive noise applied.
pub fn apply<R: Rng>(
    cfg: &SimulationConfig,
    tb: &TimeBase,
    symbols: &[f64],
    chnl: &ChannelResponse,
    rng: &mut R,
) -> Result<TxOutput> {
    let taps = ffe_taps(cfg.pretap, cfg.posttap, cfg.vod);

    // Per-symbol FIR, truncated to the symbol count.
    let ffe_out = convolve_trunc(symbols, &taps, symbols.len());
    let mut out = oversample(&ffe_out, cfg.nspb);

    // The Tx impulse response is the tap vector at symbol spacing. It is
    // not used to form the output (noise is injected between the FFE and
    // the channel), only reported alongside it.
    let mut h = vec![0.0; 3 * cfg.nspb];
    for (k, &tap) in taps.iter().enumerate() {
        h[k * cfg.nspb] = tap;
    }
    let h = resize_zero(&h, chnl.h.len());
    let transfer = fft(&resize_zero(&h, tb.npts));

    // Periodic aggressor: a square wave high-pass filtered down to its
    // transitions, as a capacitively coupled neighbor would appear.
    if cfg.pn_mag != 0.0 {
        let pn_period = 1.0 / cfg.pn_freq();
        let pn_samps = (pn_period / tb.ts + 0.5) as usize;
        let mut pn_cycle = vec![0.0; pn_samps.max(2)];
        let half = pn_cycle.len() / 2;
        for v in pn_cycle.iter_mut().skip(half) {
            *v = cfg.pn_mag;
        }
        let pn_raw = crate::utils::tile_to(&pn_cycle, out.len());
        let pn = highpass_coupling_filter(&pn_raw, CORNER_FREQ, tb.fs)?;
        for (o, n) in out.iter_mut().zip(pn.iter()) {
            *o += n;
        }
    }

    // Cascade responses, then push the waveform through the channel.
    let h_cascade = convolve_trunc(&h, &chnl.h, chnl.h.len());
    let transfer_cascade = fft(&resize_zero(&h_cascade, tb.npts));
    let mut out = convolve_trunc(&out, &chnl.h, out.len());

    // Receive-referred random noise.
    if cfg.rn != 0.0 {
        for o in out.iter_mut() {
            let noise: f64 = rng.sample::<f64, _>(StandardNormal);
            *o += noise * cfg.rn;
        }
    }

    Ok(TxOutput {
        out,
        h,
        transfer,
        h_cascade,
        transfer_cascade,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TimeBase;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn quiet_config() -> SimulationConfig {
        SimulationConfig {
            nbits: 64,
            eye_bits: 32,
            nspb: 8,
            rn: 0.0,
            pn_mag: 0.0,
            ..SimulationConfig::default()
        }
    }

    fn passthrough_channel(len: usize) -> ChannelResponse {
        let mut h = vec![0.0; len];
        h[0] = 1.0;
        ChannelResponse {
            transfer: vec![num_complex::Complex64::new(1.0, 0.0); len],
            h,
            start_ix: 0,
            delay: 0.0,
        }
    }

    #[test]
    fn main_tap_absorbs_outer_magnitude() {
        let taps = ffe_taps(0.1, -0.2, 1.0);
        assert_relative_eq!(taps[0], 0.1);
        assert_relative_eq!(taps[1], 0.7);
        assert_relative_eq!(taps[2], -0.2);
    }

    #[test]
    fn zero_taps_passthrough_on_ideal_channel() {
        let cfg = quiet_config();
        let cfg = SimulationConfig {
            pretap: 0.0,
            posttap: 0.0,
            ..cfg
        };
        let tb = TimeBase::derive(&cfg);
        let symbols = vec![1.0, -1.0, 1.0, 1.0, -1.0, -1.0, 1.0, -1.0];
        let chnl = passthrough_channel(24);
        let mut rng = StdRng::seed_from_u64(1);
        let tx = apply(&cfg, &tb, &symbols, &chnl, &mut rng).unwrap();
        let ideal = oversample(&symbols, cfg.nspb);
        assert_eq!(tx.out.len(), ideal.len());
        for (a, b) in tx.out.iter().zip(ideal.iter()) {
            assert_relative_eq!(a, b, epsilon = 1e-9);
        }
    }

    #[test]
    fn tx_impulse_response_holds_taps_at_symbol_spacing() {
        let cfg = quiet_config();
        let tb = TimeBase::derive(&cfg);
        let symbols = vec![1.0; 16];
        let chnl = passthrough_channel(3 * cfg.nspb + 5);
        let mut rng = StdRng::seed_from_u64(1);
        let tx = apply(&cfg, &tb, &symbols, &chnl, &mut rng).unwrap();
        let taps = ffe_taps(cfg.pretap, cfg.posttap, cfg.vod);
        assert_relative_eq!(tx.h[0], taps[0]);
        assert_relative_eq!(tx.h[cfg.nspb], taps[1]);
        assert_relative_eq!(tx.h[2 * cfg.nspb], taps[2]);
        assert!(tx.h[1].abs() < 1e-12);
    }

    #[test]
    fn periodic_noise_changes_output() {
        let base = quiet_config();
        let tb = TimeBase::derive(&base);
        let symbols = vec![1.0; 64];
        let chnl = passthrough_channel(16);
        let mut rng = StdRng::seed_from_u64(1);
        let clean = apply(&base, &tb, &symbols, &chnl, &mut rng).unwrap();
        let noisy_cfg = SimulationConfig {
            pn_mag: 0.1,
            pn_freq_mhz: 1000.0,
            ..base
        };
        let mut rng = StdRng::seed_from_u64(1);
        let noisy = apply(&noisy_cfg, &tb, &symbols, &chnl, &mut rng).unwrap();
        let delta: f64 = clean
            .out
            .iter()
            .zip(noisy.out.iter())
            .map(|(a, b)| (a - b).abs())
            .sum();
        assert!(delta > 0.0);
    }

    #[test]
    fn receive_noise_is_reproducible_with_seed() {
        let cfg = SimulationConfig {
            rn: 0.01,
            ..quiet_config()
        };
        let tb = TimeBase::derive(&cfg);
        let symbols = vec![1.0, -1.0, 1.0, -1.0];
        let chnl = passthrough_channel(8);
        let mut rng1 = StdRng::seed_from_u64(9);
        let mut rng2 = StdRng::seed_from_u64(9);
        let a = apply(&cfg, &tb, &symbols, &chnl, &mut rng1).unwrap();
        let b = apply(&cfg, &tb, &symbols, &chnl, &mut rng2).unwrap();
        assert_eq!(a.out, b.out);
    }
}
