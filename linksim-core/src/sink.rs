//! Plot-sink interface
//!
//! The engine hands every displayable array to a [`PlotSink`] exactly once
//! per run. Display transforms (dB magnitudes, picosecond axes, log-clipped
//! bathtubs) happen here, at the boundary, so the result record itself stays
//! in SI units.

use std::collections::BTreeMap;

use crate::pipeline::{SimulationResult, StageReport, MIN_BATHTUB_VAL};

/// Receiver of named plot arrays.
pub trait PlotSink {
    fn set_data(&mut self, key: &str, values: Vec<f64>);
}

/// In-memory sink, keyed by series name.
#[derive(Debug, Default)]
pub struct MemoryPlotSink {
    data: BTreeMap<String, Vec<f64>>,
}

impl MemoryPlotSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&[f64]> {
        self.data.get(key).map(|v| v.as_slice())
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.data.keys().map(|k| k.as_str())
    }

    pub fn into_inner(self) -> BTreeMap<String, Vec<f64>> {
        self.data
    }
}

impl PlotSink for MemoryPlotSink {
    fn set_data(&mut self, key: &str, values: Vec<f64>) {
        self.data.insert(key.to_string(), values);
    }
}

fn db_mag(transfer: &[num_complex::Complex64], len: usize) -> Vec<f64> {
    transfer
        .iter()
        .skip(1)
        .take(len)
        .map(|v| 20.0 * v.norm().max(MIN_BATHTUB_VAL).log10())
        .collect()
}

fn db_rel_ui(spectrum: &[f64], ui: f64) -> Vec<f64> {
    spectrum
        .iter()
        .skip(1)
        .map(|&v| 10.0 * (v.max(MIN_BATHTUB_VAL).log10() - ui.log10()))
        .collect()
}

impl SimulationResult {
    /// Emit every plottable series once.
    pub fn write_plots(&self, sink: &mut dyn PlotSink) {
        let tb = &self.timebase;
        let half = self.f.len() / 2;
        let len_f = half.saturating_sub(1);

        // Axes.
        sink.set_data("t_ns", self.t.iter().map(|v| v * 1.0e9).collect());
        let t_ns_chnl: Vec<f64> = self
            .t
            .iter()
            .skip(self.chnl_start_ix)
            .take(self.chnl.incremental.h.len())
            .map(|v| v * 1.0e9)
            .collect();
        sink.set_data("t_ns_chnl", t_ns_chnl);
        sink.set_data(
            "f_GHz",
            self.f[1..half].iter().map(|v| v / 1.0e9).collect(),
        );

        // Waveforms.
        sink.set_data("ideal_signal", self.ideal_signal.clone());
        sink.set_data("auto_corr", self.auto_corr.clone());

        // DFE adaptation traces.
        if let Some(final_taps) = self.dfe_run.tap_weights.last() {
            for tap in 0..final_taps.len() {
                let series: Vec<f64> = self
                    .dfe_run
                    .tap_weights
                    .iter()
                    .map(|snapshot| snapshot.get(tap).copied().unwrap_or(0.0))
                    .collect();
                sink.set_data(&format!("tap{}_weights", tap + 1), series);
            }
        }
        sink.set_data(
            "ui_ests",
            self.dfe_run.ui_ests.iter().map(|v| v * 1.0e12).collect(),
        );
        sink.set_data("clocks", self.dfe_run.clocks.clone());
        sink.set_data(
            "lockeds",
            self.dfe_run
                .lockeds
                .iter()
                .map(|&b| if b { 1.0 } else { 0.0 })
                .collect(),
        );

        // Per-stage series.
        let ts = tb.ts;
        let stages: [(&str, &StageReport); 4] = [
            ("chnl", &self.chnl),
            ("tx", &self.tx),
            ("ctle", &self.ctle),
            ("dfe", &self.dfe),
        ];
        for (name, report) in stages {
            sink.set_data(&format!("{name}_out"), report.output.clone());
            // Impulse responses are displayed in V/ns.
            let scale = 1.0e-9 / ts;
            sink.set_data(
                &format!("{name}_h"),
                report.incremental.h.iter().map(|v| v * scale).collect(),
            );
            sink.set_data(&format!("{name}_s"), report.incremental.s.clone());
            sink.set_data(
                &format!("{name}_H"),
                db_mag(&report.incremental.transfer, len_f),
            );
            sink.set_data(
                &format!("{name}_out_h"),
                report.cumulative.h.iter().map(|v| v * scale).collect(),
            );
            sink.set_data(&format!("{name}_out_s"), report.cumulative.s.clone());
            sink.set_data(
                &format!("{name}_out_H"),
                db_mag(&report.cumulative.transfer, len_f),
            );

            sink.set_data(&format!("jitter_{name}"), report.jitter.hist.clone());
            sink.set_data(
                &format!("jitter_ext_{name}"),
                report.jitter.hist_synth.clone(),
            );
            sink.set_data(
                &format!("jitter_spectrum_{name}"),
                db_rel_ui(&report.jitter.spectrum, tb.ui),
            );
            sink.set_data(
                &format!("jitter_ind_spectrum_{name}"),
                db_rel_ui(&report.jitter.ind_spectrum, tb.ui),
            );
            sink.set_data(
                &format!("thresh_{name}"),
                db_rel_ui(&report.jitter.thresh, tb.ui),
            );
            sink.set_data(
                &format!("bathtub_{name}"),
                report.bathtub.iter().map(|v| v.log10()).collect(),
            );

            // Eye heat map, flattened row-major, plus its horizontal axis.
            sink.set_data(
                &format!("eye_{name}"),
                report.eye.counts.iter().copied().collect(),
            );
        }

        let width = 2 * tb.nspui;
        let eye_index: Vec<f64> = (0..width)
            .map(|i| {
                let frac = i as f64 / (width - 1) as f64;
                (-tb.ui + 2.0 * tb.ui * frac) * 1.0e12
            })
            .collect();
        sink.set_data("eye_index", eye_index);

        sink.set_data(
            "jitter_bins",
            self.chnl
                .jitter
                .bin_centers
                .iter()
                .map(|v| v * 1.0e12)
                .collect(),
        );
        sink.set_data(
            "f_MHz",
            self.chnl.jitter.freqs[1..].iter().map(|v| v / 1.0e6).collect(),
        );
        sink.set_data(
            "f_MHz_dfe",
            self.dfe.jitter.freqs[1..].iter().map(|v| v / 1.0e6).collect(),
        );
        sink.set_data(
            "jitter_rejection_ratio",
            self.jitter_rejection_ratio
                .iter()
                .skip(1)
                .copied()
                .collect(),
        );
    }
}
