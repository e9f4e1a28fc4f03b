//! End-to-end link simulation pipeline
//!
//! One call runs the straight-line data flow: symbol source, channel,
//! transmitter, CTLE, DFE collaborator, jitter decomposition, bathtub and
//! eye assembly. Every intermediate lands in an immutable
//! [`SimulationResult`]; stage outputs feed the next stage and nothing is
//! mutated after the run returns.

use num_complex::Complex64;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::channel::{self, ChannelParams};
use crate::config::{SimulationConfig, TimeBase};
use crate::ctle::{self, CtleParams};
use crate::dfe::{DfeCollaborator, DfeConfig, DfeRun, SlicerDfe};
use crate::diagnostics::eye::{calc_eye, EyeMap};
use crate::diagnostics::jitter::{calc_jitter, JitterParams, JitterResult};
use crate::errors::{DspError, Result};
use crate::logging::RunLogger;
use crate::signal_processing::crossings::{find_crossings, CrossingOptions};
use crate::signal_processing::fft::{convolve_trunc, fft};
use crate::symbols::{generate_bits, map_symbols, oversample};
use crate::transmitter;
use crate::utils::{cumulative_sum, mean, moving_average, resize_zero};

/// Floor applied to bathtub values before the log-scale display; anything
/// smaller is clipped to a tenth of this.
pub const MIN_BATHTUB_VAL: f64 = 1.0e-18;

/// Vertical resolution of the eye heat maps (rows).
const EYE_HEIGHT: usize = 100;

/// Impulse, step, and frequency response of one stage (or of the cascade up
/// to and including it).
#[derive(Debug, Clone)]
pub struct ResponseTriple {
    pub h: Vec<f64>,
    pub s: Vec<f64>,
    pub transfer: Vec<Complex64>,
}

impl ResponseTriple {
    fn new(h: Vec<f64>, transfer: Vec<Complex64>) -> Self {
        let s = cumulative_sum(&h);
        Self { h, s, transfer }
    }
}

/// Everything recorded for one pipeline stage.
#[derive(Debug, Clone)]
pub struct StageReport {
    /// Stage output waveform, full record length.
    pub output: Vec<f64>,
    /// Response of this stage alone.
    pub incremental: ResponseTriple,
    /// Response of the cascade from the transmitter input to this stage.
    pub cumulative: ResponseTriple,
    pub jitter: JitterResult,
    /// Bathtub curve over the histogram bin centers (clipped, linear).
    pub bathtub: Vec<f64>,
    pub eye: EyeMap,
}

/// Immutable result record of one run.
#[derive(Debug)]
pub struct SimulationResult {
    pub config: SimulationConfig,
    pub timebase: TimeBase,
    /// Sample times (s).
    pub t: Vec<f64>,
    /// FFT-grid frequencies (Hz), non-shifted layout.
    pub f: Vec<f64>,
    pub bits: Vec<u8>,
    pub symbols: Vec<f64>,
    pub ideal_signal: Vec<f64>,
    pub ideal_xings: Vec<f64>,
    /// Bulk channel delay (s).
    pub chnl_dly: f64,
    /// Cumulative convolutional delay through the CTLE (s).
    pub conv_dly: f64,
    /// First retained sample of the trimmed channel response.
    pub chnl_start_ix: usize,
    pub chnl: StageReport,
    pub tx: StageReport,
    pub ctle: StageReport,
    pub dfe: StageReport,
    pub dfe_run: DfeRun,
    /// Bit errors inside the analysis window, after delay alignment.
    pub bit_errs: usize,
    /// Normalized bit cross-correlation used for the delay alignment.
    pub auto_corr: Vec<f64>,
    /// Smoothed CTLE-to-DFE jitter-spectrum ratio.
    pub jitter_rejection_ratio: Vec<f64>,
    pub logger: RunLogger,
}

/// Run the pipeline with the bundled non-adaptive DFE collaborator.
pub fn run_simulation(cfg: &SimulationConfig) -> Result<SimulationResult> {
    let tb = TimeBase::derive(cfg);
    let dfe_cfg = DfeConfig {
        n_taps: cfg.n_taps,
        gain: if cfg.use_dfe { cfg.gain } else { 0.0 },
        delta_t: cfg.delta_t(),
        alpha: cfg.alpha,
        ui: tb.ui,
        nspui: tb.nspui,
        decision_scaler: cfg.decision_scaler,
        mod_type: cfg.mod_type,
        n_ave: cfg.n_ave,
        n_lock_ave: cfg.n_lock_ave,
        rel_lock_tol: cfg.rel_lock_tol,
        lock_sustain: cfg.lock_sustain,
        bandwidth: cfg.sum_bw(),
        ideal: if cfg.use_dfe { cfg.sum_ideal } else { true },
    };
    let mut dfe = SlicerDfe::new(dfe_cfg);
    run_simulation_with(cfg, &mut dfe)
}

/// Run the pipeline with a caller-provided DFE collaborator.
pub fn run_simulation_with(
    cfg: &SimulationConfig,
    dfe: &mut dyn DfeCollaborator,
) -> Result<SimulationResult> {
    cfg.validate()?;
    let mut logger = RunLogger::default();
    let tb = TimeBase::derive(cfg);
    let t = tb.time_vector();
    let ws = tb.omega_vector();
    let f: Vec<f64> = ws.iter().map(|w| w / (2.0 * std::f64::consts::PI)).collect();

    let mut rng = match cfg.rng_seed {
        Some(seed) => ChaCha8Rng::seed_from_u64(seed),
        None => ChaCha8Rng::from_entropy(),
    };

    // Symbol source and the ideal crossing grid.
    logger.start_stage("channel");
    let bits = generate_bits(cfg.nbits, cfg.pattern_len, &mut rng);
    let symbols = map_symbols(&bits, cfg.mod_type);
    let ideal_signal = oversample(&symbols, cfg.nspb);
    let ideal_xings = find_crossings(
        &t,
        &ideal_signal,
        cfg.decision_scaler,
        CrossingOptions {
            min_delay: tb.ui / 2.0,
            ..CrossingOptions::default()
        },
        cfg.mod_type,
    )?;

    // Channel.
    let chnl_params = ChannelParams::from_config(cfg);
    let chnl_resp = channel::analyze(&chnl_params, &ws, tb.ts);
    let chnl_out = convolve_trunc(&ideal_signal, &chnl_resp.h, ideal_signal.len());
    logger.finish_stage("channel", tb.npts);

    // Transmitter.
    logger.start_stage("tx");
    let tx_out = transmitter::apply(cfg, &tb, &symbols, &chnl_resp, &mut rng)?;
    logger.finish_stage("tx", tb.npts);

    // CTLE.
    logger.start_stage("ctle");
    let ctle_params = CtleParams::from_config(cfg);
    let ctle_out = ctle::apply(&ctle_params, &tb, &tx_out, chnl_resp.h.len());
    logger.finish_stage("ctle", tb.npts);

    // DFE collaborator.
    logger.start_stage("dfe");
    let dfe_run = dfe.run(&t, &ctle_out.out)?;
    let (bit_errs, auto_corr) = count_bit_errors(&bits, &dfe_run.bits_out, cfg.eye_bits);

    // Post-DFE responses: a unit impulse plus the negated final taps at
    // symbol spacing, multiplied into the CTLE cascade.
    let final_taps = dfe_run
        .tap_weights
        .last()
        .cloned()
        .unwrap_or_else(|| vec![0.0; cfg.n_taps]);
    let mut dfe_h = vec![0.0; (1 + final_taps.len()) * cfg.nspb];
    dfe_h[0] = 1.0;
    for (k, &w) in final_taps.iter().enumerate() {
        dfe_h[(k + 1) * cfg.nspb] = -w;
    }
    let dfe_h = resize_zero(&dfe_h, ctle_out.h_cascade.len());
    let dfe_transfer = fft(&resize_zero(&dfe_h, tb.npts));
    let dfe_out_h = convolve_trunc(&ctle_out.h_cascade, &dfe_h, ctle_out.h_cascade.len());
    let dfe_out_transfer: Vec<Complex64> = ctle_out
        .transfer_cascade
        .iter()
        .zip(dfe_transfer.iter())
        .map(|(a, b)| a * b)
        .collect();
    logger.finish_stage("dfe", tb.npts);

    // Jitter decomposition, stage by stage.
    logger.start_stage("jitter");
    let jitter_params = JitterParams {
        ui: tb.ui,
        nui: tb.nui,
        pattern_len: cfg.pattern_len,
        rel_thresh: cfg.thresh,
        zero_mean: true,
    };
    let stage_jitter = |out: &[f64]| -> Result<JitterResult> {
        let actual = find_crossings(
            &t,
            out,
            cfg.decision_scaler,
            CrossingOptions::default(),
            cfg.mod_type,
        )?;
        calc_jitter(&jitter_params, &ideal_xings, &actual)
    };
    let chnl_jitter = stage_jitter(&chnl_out)?;
    let tx_jitter = stage_jitter(&tx_out.out)?;
    let ctle_jitter = stage_jitter(&ctle_out.out)?;

    // The DFE stage is analyzed over the trailing eye window only, past the
    // CDR settling region, and with the crossing scan delayed by the
    // cumulative convolutional delay.
    let ignore_until = (tb.nui - tb.eye_uis) as f64 * tb.ui + tb.ui / 2.0;
    let dfe_ideal: Vec<f64> = ideal_xings
        .iter()
        .copied()
        .filter(|&x| x > ignore_until)
        .collect();
    let dfe_actual = find_crossings(
        &t,
        &dfe_run.out,
        cfg.decision_scaler,
        CrossingOptions {
            min_delay: ignore_until + ctle_out.conv_dly,
            rising_first: false,
            ..CrossingOptions::default()
        },
        cfg.mod_type,
    )?;
    let dfe_jitter = calc_jitter(
        &JitterParams {
            nui: tb.eye_uis,
            ..jitter_params
        },
        &dfe_ideal,
        &dfe_actual,
    )?;

    // Ratio of smoothed CTLE to DFE jitter spectra; the CTLE spectrum is
    // condensed so the frequency axes line up.
    let skip_factor = (cfg.nbits / cfg.eye_bits).max(1);
    let condensed: Vec<f64> = ctle_jitter
        .spectrum
        .chunks(skip_factor)
        .map(mean)
        .collect();
    let window = (dfe_jitter.spectrum.len() / 10).max(1);
    let num = moving_average(&condensed, window);
    let den = moving_average(&dfe_jitter.spectrum, window);
    let jitter_rejection_ratio: Vec<f64> = num
        .iter()
        .zip(den.iter())
        .map(|(a, b)| if *b > 0.0 { a / b } else { 0.0 })
        .collect();
    logger.finish_stage("jitter", tb.npts);

    // Eye maps. The DFE eye folds around the recovered clock, which must
    // cover the analysis window.
    logger.start_stage("eyes");
    let eye_chnl = calc_eye(tb.ui, tb.nspui, EYE_HEIGHT, &chnl_out, None);
    let eye_tx = calc_eye(tb.ui, tb.nspui, EYE_HEIGHT, &tx_out.out, None);
    let eye_ctle = calc_eye(tb.ui, tb.nspui, EYE_HEIGHT, &ctle_out.out, None);
    let eye_window_start = (tb.nui - tb.eye_uis) as f64 * tb.ui;
    let clock_start = dfe_run
        .clock_times
        .iter()
        .position(|&ct| ct > eye_window_start)
        .ok_or(DspError::InsufficientCoverage {
            needed: eye_window_start,
            covered: dfe_run.clock_times.last().copied().unwrap_or(0.0),
        })?;
    let eye_dfe = calc_eye(
        tb.ui,
        tb.nspui,
        EYE_HEIGHT,
        &dfe_run.out,
        Some(&dfe_run.clock_times[clock_start..]),
    );
    logger.finish_stage("eyes", tb.npts);

    let chnl_triple = ResponseTriple::new(chnl_resp.h.clone(), chnl_resp.transfer.clone());
    let chnl_report = StageReport {
        output: chnl_out,
        incremental: chnl_triple.clone(),
        cumulative: chnl_triple,
        bathtub: bathtub(&chnl_jitter.hist_synth),
        jitter: chnl_jitter,
        eye: eye_chnl,
    };
    let tx_report = StageReport {
        output: tx_out.out.clone(),
        incremental: ResponseTriple::new(tx_out.h.clone(), tx_out.transfer.clone()),
        cumulative: ResponseTriple::new(tx_out.h_cascade.clone(), tx_out.transfer_cascade.clone()),
        bathtub: bathtub(&tx_jitter.hist_synth),
        jitter: tx_jitter,
        eye: eye_tx,
    };
    let ctle_report = StageReport {
        output: ctle_out.out.clone(),
        incremental: ResponseTriple::new(ctle_out.h.clone(), ctle_out.transfer.clone()),
        cumulative: ResponseTriple::new(
            ctle_out.h_cascade.clone(),
            ctle_out.transfer_cascade.clone(),
        ),
        bathtub: bathtub(&ctle_jitter.hist_synth),
        jitter: ctle_jitter,
        eye: eye_ctle,
    };
    let dfe_report = StageReport {
        output: dfe_run.out.clone(),
        incremental: ResponseTriple::new(dfe_h, dfe_transfer),
        cumulative: ResponseTriple::new(dfe_out_h, dfe_out_transfer),
        bathtub: bathtub(&dfe_jitter.hist_synth),
        jitter: dfe_jitter,
        eye: eye_dfe,
    };

    Ok(SimulationResult {
        config: cfg.clone(),
        timebase: tb,
        t,
        f,
        bits,
        symbols,
        ideal_signal,
        ideal_xings,
        chnl_dly: chnl_resp.delay,
        conv_dly: ctle_out.conv_dly,
        chnl_start_ix: chnl_resp.start_ix,
        chnl: chnl_report,
        tx: tx_report,
        ctle: ctle_report,
        dfe: dfe_report,
        dfe_run,
        bit_errs,
        auto_corr,
        jitter_rejection_ratio,
        logger,
    })
}

/// Cumulative distribution from each histogram edge toward the middle,
/// clipped for log-scale display.
fn bathtub(hist_synth: &[f64]) -> Vec<f64> {
    let half_len = hist_synth.len() / 2;
    let mut left: Vec<f64> = hist_synth
        .iter()
        .rev()
        .take(half_len)
        .scan(0.0, |acc, &v| {
            *acc += v;
            Some(*acc)
        })
        .collect();
    left.reverse();
    let right = hist_synth.iter().take(half_len + 1).scan(0.0, |acc, &v| {
        *acc += v;
        Some(*acc)
    });
    left.extend(right);
    left.into_iter()
        .map(|v| {
            if v < MIN_BATHTUB_VAL {
                0.1 * MIN_BATHTUB_VAL
            } else {
                v
            }
        })
        .collect()
}

/// Align recovered bits to the transmitted stream by cross-correlation over
/// the analysis window, then count residual mismatches.
fn count_bit_errors(bits: &[u8], bits_out: &[u8], eye_bits: usize) -> (usize, Vec<f64>) {
    let window_start = bits.len().saturating_sub(eye_bits);
    let tx_tail = &bits[window_start..];
    let rx_tail = if bits_out.len() > window_start {
        &bits_out[window_start..]
    } else {
        bits_out
    };
    if tx_tail.is_empty() || rx_tail.is_empty() {
        return (0, Vec::new());
    }

    let tx_ones: f64 = tx_tail.iter().map(|&b| b as f64).sum();
    let norm = if tx_ones > 0.0 { tx_ones } else { 1.0 };
    let max_lag = tx_tail.len() / 2;
    let mut auto_corr = Vec::with_capacity(max_lag + 1);
    for lag in 0..=max_lag {
        let mut acc = 0.0;
        for (i, &rx) in rx_tail.iter().enumerate() {
            if i + lag >= tx_tail.len() {
                break;
            }
            acc += (rx * tx_tail[i + lag]) as f64;
        }
        auto_corr.push(acc / norm);
    }
    let bit_dly = crate::utils::argmax(&auto_corr);

    let errors = rx_tail
        .iter()
        .enumerate()
        .filter(|(i, &rx)| i + bit_dly < tx_tail.len() && rx != tx_tail[i + bit_dly])
        .count();
    (errors, auto_corr)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bathtub_is_monotone_from_each_edge() {
        let mut hist = vec![0.0; 99];
        hist[49] = 0.5;
        hist[48] = 0.2;
        hist[50] = 0.2;
        hist[0] = 0.05;
        hist[98] = 0.05;
        let tub = bathtub(&hist);
        assert_eq!(tub.len(), 99);
        // Falling from the left edge toward the middle.
        for w in tub[..49].windows(2) {
            assert!(w[0] >= w[1]);
        }
        // Rising toward the right edge.
        for w in tub[50..].windows(2) {
            assert!(w[0] <= w[1]);
        }
        // Clipping floor.
        assert!(tub.iter().all(|&v| v >= 0.1 * MIN_BATHTUB_VAL));
    }

    #[test]
    fn bit_errors_zero_for_shifted_copy() {
        let bits: Vec<u8> = (0..64).map(|i| ((i * 7) % 3 == 0) as u8).collect();
        // Receiver sees the same stream advanced by two bits.
        let bits_out: Vec<u8> = bits[2..].to_vec();
        let (errs, corr) = count_bit_errors(&bits, &bits_out, 32);
        assert_eq!(errs, 0);
        assert!(!corr.is_empty());
    }

    #[test]
    fn bit_errors_count_flips() {
        let bits: Vec<u8> = (0..64).map(|i| (i % 2) as u8).collect();
        let mut bits_out = bits.clone();
        bits_out[40] ^= 1;
        bits_out[50] ^= 1;
        let (errs, _) = count_bit_errors(&bits, &bits_out, 32);
        assert_eq!(errs, 2);
    }
}
