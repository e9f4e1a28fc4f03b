//! Eye-diagram density maps
//!
//! Traces are folded modulo two unit intervals into a `height x 2*nspui`
//! hit-count grid. Pre-CDR stages fold at the mean crossing phase; the
//! post-DFE stage folds around the recovered clock instants, interpolating
//! between samples so clock drift does not smear the map.

use ndarray::Array2;

use crate::utils::max_abs;

/// Eye-diagram heat map plus the scaling needed to label its axes.
#[derive(Debug, Clone)]
pub struct EyeMap {
    /// Hit counts, `height` rows by `2 * nspui` columns.
    pub counts: Array2<f64>,
    /// Vertical full scale (V); rows span `[-y_max, y_max]`.
    pub y_max: f64,
    /// Horizontal span (s); columns span `[-ui, ui]`.
    pub ui: f64,
}

/// Accumulate the eye diagram of `ys`.
///
/// With `clock_times` given, each window is centered on a recovered clock
/// edge; otherwise the fold phase is the mean zero-crossing position and a
/// constant UI is assumed.
pub fn calc_eye(
    ui: f64,
    nspui: usize,
    height: usize,
    ys: &[f64],
    clock_times: Option<&[f64]>,
) -> EyeMap {
    let width = 2 * nspui;
    let tsamp = ui / nspui as f64;
    let y_max = 1.1 * max_abs(ys);
    let y_scale = if y_max > 0.0 {
        height as f64 / (2.0 * y_max)
    } else {
        0.0
    };
    let y_offset = (height / 2) as isize;

    let mut counts = Array2::<f64>::zeros((height, width));
    let mut deposit = |row: isize, col: usize| {
        if row >= 0 && (row as usize) < height && col < width {
            counts[(row as usize, col)] += 1.0;
        }
    };

    match clock_times {
        Some(clocks) => {
            for &clock_time in clocks {
                let start_time = clock_time - ui;
                if start_time < 0.0 {
                    continue;
                }
                let start_ix = (start_time / tsamp) as usize;
                if start_ix + width > ys.len() {
                    break;
                }
                let interp_fac = (start_time - start_ix as f64 * tsamp) / tsamp;
                for i in 0..width {
                    if start_ix + i + 1 >= ys.len() {
                        break;
                    }
                    let s1 = ys[start_ix + i];
                    let s2 = ys[start_ix + i + 1];
                    let y = s1 + (s2 - s1) * interp_fac;
                    deposit((y * y_scale + 0.5) as isize + y_offset, i);
                }
            }
        }
        None => {
            // Fold phase: mean crossing position within the UI, plus half a
            // UI so the eye opening sits mid-window.
            let mut phase_sum = 0.0;
            let mut phase_count = 0usize;
            for i in 0..ys.len().saturating_sub(1) {
                if ys[i].signum() != ys[i + 1].signum() && ys[i] != ys[i + 1] {
                    phase_sum += (i % nspui) as f64;
                    phase_count += 1;
                }
            }
            let mean_phase = if phase_count > 0 {
                phase_sum / phase_count as f64
            } else {
                0.0
            };
            let mut start_ix = mean_phase.round() as usize + nspui / 2;
            while start_ix + width < ys.len() {
                for (i, &y) in ys[start_ix..start_ix + width].iter().enumerate() {
                    deposit((y * y_scale + 0.5) as isize + y_offset, i);
                }
                start_ix += nspui;
            }
        }
    }

    EyeMap {
        counts,
        y_max,
        ui,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square_wave(n_ui: usize, nspui: usize) -> Vec<f64> {
        let mut ys = Vec::with_capacity(n_ui * nspui);
        for k in 0..n_ui {
            let level = if k % 2 == 0 { -1.0 } else { 1.0 };
            ys.extend(std::iter::repeat(level).take(nspui));
        }
        ys
    }

    #[test]
    fn free_running_eye_counts_every_window_sample() {
        let nspui = 16;
        let ys = square_wave(64, nspui);
        let eye = calc_eye(1.0, nspui, 100, &ys, None);
        let total: f64 = eye.counts.iter().sum();
        // Each folded window deposits 2*nspui hits (bar edge effects at the
        // record tail).
        assert!(total > 0.0);
        assert_eq!(total % (2 * nspui) as f64, 0.0);
    }

    #[test]
    fn clean_square_wave_concentrates_on_two_rails() {
        let nspui = 16;
        let ys = square_wave(64, nspui);
        let eye = calc_eye(1.0, nspui, 100, &ys, None);
        // Hits only on the two signal rails: exactly two occupied rows.
        let occupied: Vec<usize> = eye
            .counts
            .outer_iter()
            .enumerate()
            .filter(|(_, row)| row.iter().any(|&v| v > 0.0))
            .map(|(r, _)| r)
            .collect();
        assert_eq!(occupied.len(), 2);
    }

    #[test]
    fn clocked_eye_respects_record_bounds() {
        let nspui = 8;
        let ys = square_wave(32, nspui);
        // Clock times marching off the end of the record must not panic.
        let clocks: Vec<f64> = (0..40).map(|k| 1.5 + k as f64).collect();
        let eye = calc_eye(1.0, nspui, 50, &ys, Some(&clocks));
        let total: f64 = eye.counts.iter().sum();
        assert!(total > 0.0);
    }

    #[test]
    fn vertical_scale_tracks_signal_swing() {
        let nspui = 8;
        let ys: Vec<f64> = square_wave(16, nspui).iter().map(|v| v * 0.4).collect();
        let eye = calc_eye(1.0, nspui, 50, &ys, None);
        assert!((eye.y_max - 0.44).abs() < 1e-12);
    }
}
