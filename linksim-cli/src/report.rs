//! Terminal summary of a simulation run.

use linksim_core::pipeline::{SimulationResult, StageReport};

fn ps(v: f64) -> f64 {
    v * 1.0e12
}

fn stage_row(name: &str, report: &StageReport) {
    let j = &report.jitter;
    println!(
        "{:<8} {:>10.3} {:>10.3} {:>10.3} {:>10.3}",
        name,
        ps(j.isi),
        ps(j.dcd),
        ps(j.pj),
        ps(j.rj)
    );
}

pub fn print_summary(result: &SimulationResult) {
    let cfg = &result.config;
    let tb = &result.timebase;

    println!(
        "linksim: {} bits at {:.1} ps UI ({} samples/UI), {:?}",
        cfg.nbits, tb.ui * 1.0e12, tb.nspui, cfg.mod_type
    );
    println!(
        "channel: {:.2} m, bulk delay {:.3} ns; cumulative delay {:.3} ns",
        cfg.l_ch,
        result.chnl_dly * 1.0e9,
        result.conv_dly * 1.0e9
    );
    println!();
    println!(
        "{:<8} {:>10} {:>10} {:>10} {:>10}",
        "stage", "isi (ps)", "dcd (ps)", "pj (ps)", "rj (ps)"
    );
    stage_row("channel", &result.chnl);
    stage_row("tx", &result.tx);
    stage_row("ctle", &result.ctle);
    stage_row("dfe", &result.dfe);
    println!();
    println!(
        "bit errors in analysis window: {} ({} bits recovered)",
        result.bit_errs,
        result.dfe_run.bits_out.len()
    );
}
