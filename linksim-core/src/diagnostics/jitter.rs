//! Timing-jitter decomposition
//!
//! The TIE (time-interval error) track of a stage is split into four
//! components:
//!
//! - **ISI** - data-dependent jitter, recovered by averaging the TIE over
//!   repetitions of the bit pattern and taking the peak-to-peak excursion.
//! - **DCD** - the mean offset between rising- and falling-edge timing.
//! - **PJ** - bounded periodic jitter, isolated in the spectrum of the
//!   data-independent track by a moving-average threshold.
//! - **RJ** - the unbounded random remainder, estimated from the
//!   below-threshold spectral magnitudes.
//!
//! The decomposition ends with a measured TIE histogram and a synthetic one
//! (ISI + PJ convolved with a Gaussian of width RJ) whose tails feed the
//! bathtub curves.

use ndarray::{Array2, Axis};

use crate::errors::{ConfigError, Result};
use crate::signal_processing::fft::{fft, ifft_real};
use crate::utils::{mean, moving_average, peak_to_peak, tile_to};

/// Number of histogram bins. Odd, so one bin straddles zero.
pub const NUM_BINS: usize = 99;

/// Inputs to the jitter decomposition.
#[derive(Debug, Clone, Copy)]
pub struct JitterParams {
    /// Nominal unit interval (s).
    pub ui: f64,
    /// Number of unit intervals spanned by the analyzed record.
    pub nui: usize,
    /// Number of unit intervals before the bit pattern repeats.
    pub pattern_len: usize,
    /// Threshold for periodic spectral components (sigma multiples).
    pub rel_thresh: f64,
    /// Force the TIE track to zero mean before decomposition.
    pub zero_mean: bool,
}

/// Complete result of one jitter decomposition.
#[derive(Debug, Clone)]
pub struct JitterResult {
    /// TIE track (one entry per matched crossing, pad sentinels included).
    pub tie: Vec<f64>,
    /// Ideal crossing times the TIE entries belong to.
    pub t_tie: Vec<f64>,
    pub isi: f64,
    pub dcd: f64,
    pub pj: f64,
    pub rj: f64,
    /// Data-independent TIE track.
    pub tie_ind: Vec<f64>,
    /// Periodic-detection threshold (first spectrum half).
    pub thresh: Vec<f64>,
    /// Magnitude spectrum of the total TIE track (first half).
    pub spectrum: Vec<f64>,
    /// Magnitude spectrum of the data-independent track (first half).
    pub ind_spectrum: Vec<f64>,
    /// Frequencies of the spectrum bins (Hz).
    pub freqs: Vec<f64>,
    /// Measured TIE histogram (PMF over `bin_centers`).
    pub hist: Vec<f64>,
    /// Synthetic histogram: ISI + PJ convolved with the RJ Gaussian.
    pub hist_synth: Vec<f64>,
    /// Histogram bin centers (s).
    pub bin_centers: Vec<f64>,
}

/// Below this RJ (seconds) the Gaussian tail PMF degenerates to a delta and
/// the extrapolation convolution is skipped.
const RJ_FLOOR: f64 = 1.0e-18;

/// Decompose the jitter in a set of actual crossings against the ideal grid.
pub fn calc_jitter(
    params: &JitterParams,
    ideal_xings: &[f64],
    actual_xings: &[f64],
) -> Result<JitterResult> {
    let ui = params.ui;
    if ideal_xings.is_empty() || actual_xings.is_empty() {
        return Err(ConfigError::InsufficientCrossings { have: 0, need: 1 }.into());
    }

    // Re-reference both crossing lists so the first ideal crossing sits at
    // UI/2 and the first actual crossing lines up with it. The latter
    // removes the cumulative group delay of the stages in front of us.
    let ideal_shift = ideal_xings[0] - ui / 2.0;
    let ideal: Vec<f64> = ideal_xings.iter().map(|&x| x - ideal_shift).collect();
    let actual_shift = actual_xings[0] - ideal[0];
    let actual: Vec<f64> = actual_xings.iter().map(|&x| x - actual_shift).collect();

    // Phase 1: assemble the TIE track, walking the ideal crossings in order
    // and pairing each with its best-matching actual crossing.
    let mut tie = Vec::with_capacity(ideal.len());
    let mut t_tie = Vec::with_capacity(ideal.len());
    let mut pad_ixs = Vec::new();
    let mut cursor = 0usize;
    let mut skip_next_ideal = false;
    for &ideal_xing in &ideal {
        if skip_next_ideal {
            t_tie.push(ideal_xing);
            skip_next_ideal = false;
            continue;
        }
        let min_t = ideal_xing - ui;
        let max_t = ideal_xing + ui;
        while cursor < actual.len() && actual[cursor] < min_t {
            cursor += 1;
        }
        if cursor == actual.len() {
            break;
        }
        if actual[cursor] > max_t {
            // The crossing never happened. An uncrossed level implies at
            // least two consecutive missed transitions, so the next ideal
            // crossing is skipped as well.
            pad_ixs.push(tie.len() + 2 * pad_ixs.len());
            skip_next_ideal = true;
        } else {
            let mut best = cursor;
            let mut j = cursor;
            while j < actual.len() && actual[j] <= max_t {
                if (actual[j] - ideal_xing).abs() < (actual[best] - ideal_xing).abs() {
                    best = j;
                }
                j += 1;
            }
            tie.push(actual[best] - ideal_xing);
            cursor = best + 1;
        }
        t_tie.push(ideal_xing);
    }

    if params.zero_mean {
        let m = mean(&tie);
        for v in tie.iter_mut() {
            *v -= m;
        }
    }

    // Missed crossings become alternating saturation sentinels; the
    // histogram folds them into its outermost bins.
    for &pad_ix in &pad_ixs {
        tie.insert(pad_ix, -3.0 * ui / 4.0);
        tie.insert(pad_ix, 3.0 * ui / 4.0);
    }

    // A miss at the record tail (or running out of actual crossings) can
    // leave the tracks one element apart; keep the common prefix.
    let common = tie.len().min(t_tie.len());
    tie.truncate(common);
    t_tie.truncate(common);

    // Phase 2: pattern-average the rising and falling edges separately.
    let pattern_span = params.pattern_len as f64 * ui;
    let xings_per_pattern = ideal
        .iter()
        .position(|&x| x >= pattern_span)
        .ok_or(ConfigError::NoCrossingsInPattern {
            pattern_len: params.pattern_len,
        })?;
    if xings_per_pattern == 0 {
        return Err(ConfigError::NoCrossingsInPattern {
            pattern_len: params.pattern_len,
        }
        .into());
    }
    let fallings_per_pattern = xings_per_pattern / 2;
    let risings_per_pattern = xings_per_pattern - fallings_per_pattern;
    let num_patterns = params.nui / params.pattern_len;
    if num_patterns == 0 {
        return Err(ConfigError::InsufficientCrossings {
            have: tie.len(),
            need: xings_per_pattern,
        }
        .into());
    }

    let need = (2 * num_patterns * risings_per_pattern)
        .saturating_sub(1)
        .max(2 * num_patterns * fallings_per_pattern);
    if tie.len() < need {
        return Err(ConfigError::InsufficientCrossings {
            have: tie.len(),
            need,
        }
        .into());
    }

    let take_strided = |offset: usize, count: usize| -> Vec<f64> {
        (0..count).map(|k| tie[offset + 2 * k]).collect()
    };
    let tie_risings = Array2::from_shape_vec(
        (num_patterns, risings_per_pattern),
        take_strided(0, num_patterns * risings_per_pattern),
    )
    .expect("shape follows from the length check");
    let tie_fallings = Array2::from_shape_vec(
        (num_patterns, fallings_per_pattern),
        take_strided(1, num_patterns * fallings_per_pattern),
    )
    .expect("shape follows from the length check");

    let tie_risings_ave = tie_risings
        .mean_axis(Axis(0))
        .map(|a| a.to_vec())
        .unwrap_or_default();
    let tie_fallings_ave = tie_fallings
        .mean_axis(Axis(0))
        .map(|a| a.to_vec())
        .unwrap_or_default();

    let isi = peak_to_peak(&tie_risings_ave)
        .max(peak_to_peak(&tie_fallings_ave))
        .min(ui);
    let dcd = (mean(&tie_risings_ave) - mean(&tie_fallings_ave)).abs();

    // Phase 3: strip the data-dependent component and split the remainder
    // into periodic and random parts in the frequency domain.
    let mut tie_ave = Vec::with_capacity(tie.len());
    for (r, f) in tie_risings_ave.iter().zip(tie_fallings_ave.iter()) {
        tie_ave.push(*r);
        tie_ave.push(*f);
    }
    let tie_ave = if tie_ave.is_empty() {
        vec![0.0; tie.len()]
    } else {
        tile_to(&tie_ave, tie.len())
    };
    let tie_ind: Vec<f64> = tie.iter().zip(tie_ave.iter()).map(|(j, a)| j - a).collect();

    // Total-jitter spectrum, for display.
    let (tie_uniform, _) = make_uniform(&t_tie, &tie, ui, params.nui);
    let y_total = fft(&tie_uniform);
    let norm_total = (tie.len() as f64).sqrt();
    let spectrum: Vec<f64> = y_total[..y_total.len() / 2]
        .iter()
        .map(|v| v.norm() / norm_total)
        .collect();
    let f0 = 1.0 / (ui * params.nui as f64);
    let freqs: Vec<f64> = (0..y_total.len() / 2).map(|i| i as f64 * f0).collect();

    // Data-independent spectrum drives the PJ/RJ separation. The power
    // normalization uses the pre-padding length: zero padding adds no
    // energy, which keeps the RJ estimate conservative.
    let (ind_uniform, valid_ix) = make_uniform(&t_tie, &tie_ind, ui, params.nui);
    let norm_ind = (tie_ind.len() as f64).sqrt();
    let y: Vec<num_complex::Complex64> = fft(&ind_uniform)
        .into_iter()
        .map(|v| v / norm_ind)
        .collect();
    let y_mag: Vec<f64> = y.iter().map(|v| v.norm()).collect();
    let window = (y_mag.len() / 10).max(1);
    let y_mean = moving_average(&y_mag, window);
    let sq_dev: Vec<f64> = y_mag
        .iter()
        .zip(y_mean.iter())
        .map(|(m, mu)| (m - mu) * (m - mu))
        .collect();
    let y_sigma: Vec<f64> = moving_average(&sq_dev, window)
        .into_iter()
        .map(f64::sqrt)
        .collect();
    let thresh_full: Vec<f64> = y_mean
        .iter()
        .zip(y_sigma.iter())
        .map(|(mu, sg)| mu + params.rel_thresh * sg)
        .collect();

    let zero = num_complex::Complex64::new(0.0, 0.0);
    let y_per: Vec<num_complex::Complex64> = y
        .iter()
        .zip(y_mag.iter())
        .zip(thresh_full.iter())
        .map(|((v, m), th)| if m > th { *v } else { zero })
        .collect();
    let y_rnd: Vec<f64> = y_mag
        .iter()
        .zip(thresh_full.iter())
        .map(|(m, th)| if m > th { 0.0 } else { *m })
        .collect();
    let rnd_mean = mean(&y_rnd);
    let rj = mean(
        &y_rnd
            .iter()
            .map(|v| (v - rnd_mean) * (v - rnd_mean))
            .collect::<Vec<_>>(),
    )
    .sqrt();

    let tie_per_uniform: Vec<f64> = ifft_real(&y_per).into_iter().map(|v| v * norm_ind).collect();
    let tie_per: Vec<f64> = valid_ix
        .iter()
        .filter(|&&ix| ix < tie_per_uniform.len())
        .map(|&ix| tie_per_uniform[ix])
        .collect();
    let pj = peak_to_peak(&tie_per);

    let thresh = thresh_full[..thresh_full.len() / 2].to_vec();
    let ind_spectrum = y_mag[..y_mag.len() / 2].to_vec();

    // Phase 4: histograms. The synthetic one reassembles everything except
    // RJ, then extrapolates the tails with the RJ Gaussian.
    let jitter_synth: Vec<f64> = tie_ave
        .iter()
        .zip(tie_per.iter())
        .map(|(a, p)| a + p)
        .collect();

    let (hist, bin_centers) = saturating_hist(&tie, ui, NUM_BINS);
    let (hist_synth_raw, _) = saturating_hist(&jitter_synth, ui, NUM_BINS);
    let hist_synth = extrapolate_tails(&hist_synth_raw, &bin_centers, rj);

    Ok(JitterResult {
        tie,
        t_tie,
        isi,
        dcd,
        pj,
        rj,
        tie_ind,
        thresh,
        spectrum,
        ind_spectrum,
        freqs,
        hist,
        hist_synth,
        bin_centers,
    })
}

/// Resample a crossing-indexed track onto the uniform UI grid by
/// zero-filling the slots where crossings are missing.
///
/// Returns the uniform vector (padded or truncated to `nui` slots) and the
/// slot indices occupied by real samples.
pub fn make_uniform(t: &[f64], track: &[f64], ui: f64, nui: usize) -> (Vec<f64>, Vec<usize>) {
    assert_eq!(t.len(), track.len(), "time and track vectors must align");
    let mut uniform = Vec::with_capacity(nui);
    let mut valid_ix = Vec::with_capacity(track.len());
    if track.is_empty() {
        uniform.resize(nui, 0.0);
        return (uniform, valid_ix);
    }

    if nui > 0 {
        valid_ix.push(0);
    }
    uniform.push(track[0]);
    let mut pos = 0usize;
    for i in 0..t.len() - 1 {
        let run = ((t[i + 1] - t[i]) / ui + 0.5) as usize;
        pos += run;
        if pos < nui {
            valid_ix.push(pos);
        }
        for _ in 1..run {
            uniform.push(0.0);
        }
        uniform.push(track[i + 1]);
    }
    uniform.resize(nui, 0.0);
    (uniform, valid_ix)
}

/// PMF of `x` over `[-UI/2, UI/2]`, sweeping `[-UI, -UI/2]` and
/// `[UI/2, UI]` into the first and last bins. Values beyond `±UI` are
/// excluded from the mass entirely.
fn saturating_hist(x: &[f64], ui: f64, num_bins: usize) -> (Vec<f64>, Vec<f64>) {
    let inner = num_bins - 2;
    let mut edges = Vec::with_capacity(num_bins + 1);
    edges.push(-ui);
    for i in 0..num_bins - 1 {
        edges.push(-ui / 2.0 + i as f64 * ui / inner as f64);
    }
    edges.push(ui);

    let mut counts = vec![0u64; num_bins];
    for &v in x {
        if v < edges[0] || v > edges[num_bins] {
            continue;
        }
        // Left-inclusive bins, with the final right edge inclusive.
        let mut bin = num_bins - 1;
        for j in 0..num_bins {
            if v < edges[j + 1] {
                bin = j;
                break;
            }
        }
        counts[bin] += 1;
    }
    let total: u64 = counts.iter().sum();
    let hist = counts
        .iter()
        .map(|&c| if total > 0 { c as f64 / total as f64 } else { 0.0 })
        .collect();

    let mut centers = Vec::with_capacity(num_bins);
    centers.push(-ui / 2.0);
    for i in 0..num_bins - 2 {
        centers.push((edges[i + 1] + edges[i + 2]) / 2.0);
    }
    centers.push(ui / 2.0);
    (hist, centers)
}

/// Convolve the synthetic histogram with the RJ Gaussian PMF and fold the
/// convolution tails back into the saturation bins.
fn extrapolate_tails(hist: &[f64], bin_centers: &[f64], rj: f64) -> Vec<f64> {
    if rj < RJ_FLOOR {
        return hist.to_vec();
    }
    let pdf: Vec<f64> = bin_centers
        .iter()
        .map(|&c| (-c * c / (2.0 * rj * rj)).exp())
        .collect();
    let pdf_sum: f64 = pdf.iter().sum();
    let pmf: Vec<f64> = pdf.iter().map(|v| v / pdf_sum).collect();

    let n = hist.len();
    let mut full = vec![0.0; 2 * n - 1];
    for (i, &h) in hist.iter().enumerate() {
        for (j, &p) in pmf.iter().enumerate() {
            full[i + j] += h * p;
        }
    }

    let tail_len = (n - 1) / 2;
    let mut out = Vec::with_capacity(n);
    out.push(full[..tail_len + 1].iter().sum());
    out.extend_from_slice(&full[tail_len + 1..full.len() - tail_len - 1]);
    out.push(full[full.len() - tail_len - 1..].iter().sum());
    out
}
