use proptest::prelude::*;

use linksim_core::config::ModulationType;
use linksim_core::diagnostics::jitter::{calc_jitter, make_uniform, JitterParams, NUM_BINS};
use linksim_core::signal_processing::crossings::{find_crossing_times, CrossingOptions};
use linksim_core::symbols::{map_symbols, oversample};
use linksim_core::utils::{cumulative_sum, moving_average};

fn clock_xings(n: usize, ui: f64) -> Vec<f64> {
    (0..n).map(|k| ui / 2.0 + k as f64 * ui).collect()
}

proptest! {
    /// A track that is already on the uniform UI grid passes through the
    /// uniformizer untouched, and a second pass changes nothing.
    #[test]
    fn make_uniform_is_idempotent(
        values in prop::collection::vec(-0.4f64..0.4, 4..64),
    ) {
        let ui = 1.0;
        let t: Vec<f64> = (0..values.len()).map(|k| ui / 2.0 + k as f64 * ui).collect();
        let (uniform, valid_ix) = make_uniform(&t, &values, ui, values.len());
        prop_assert_eq!(&uniform, &values);
        prop_assert_eq!(valid_ix.len(), values.len());
        let (again, _) = make_uniform(&t, &uniform, ui, values.len());
        prop_assert_eq!(again, uniform);
    }

    /// The TIE histogram is a PMF for any bounded perturbation of the
    /// crossing grid, and the decomposition respects its value ranges.
    #[test]
    fn jitter_histogram_is_a_pmf(
        seed_ties in prop::collection::vec(-0.2f64..0.2, 64),
    ) {
        let ui = 1.0;
        let n = seed_ties.len();
        let ideal = clock_xings(n, ui);
        let actual: Vec<f64> = ideal
            .iter()
            .zip(seed_ties.iter())
            .map(|(x, d)| x + d)
            .collect();
        let params = JitterParams {
            ui,
            nui: n,
            pattern_len: 8,
            rel_thresh: 6.0,
            zero_mean: true,
        };
        let result = calc_jitter(&params, &ideal, &actual).unwrap();
        let mass: f64 = result.hist.iter().sum();
        prop_assert!((mass - 1.0).abs() < 1e-12);
        let synth_mass: f64 = result.hist_synth.iter().sum();
        prop_assert!((synth_mass - 1.0).abs() < 1e-9);
        prop_assert_eq!(result.hist.len(), NUM_BINS);
        prop_assert!(result.isi <= ui);
        prop_assert!(result.dcd >= 0.0);
        prop_assert!(result.pj >= 0.0);
        prop_assert!(result.rj >= 0.0);
    }

    /// Sliding mean output always matches the input length, and every
    /// output value stays within the input range.
    #[test]
    fn moving_average_preserves_length_and_range(
        values in prop::collection::vec(-10.0f64..10.0, 1..128),
        window in 1usize..32,
    ) {
        let out = moving_average(&values, window);
        prop_assert_eq!(out.len(), values.len());
        let lo = values.iter().cloned().fold(f64::INFINITY, f64::min);
        let hi = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        for v in out {
            prop_assert!(v >= lo - 1e-9 && v <= hi + 1e-9);
        }
    }

    /// The cumulative sum ends at the plain sum.
    #[test]
    fn cumulative_sum_totals(values in prop::collection::vec(-5.0f64..5.0, 1..64)) {
        let csum = cumulative_sum(&values);
        let total: f64 = values.iter().sum();
        prop_assert!((csum[values.len() - 1] - total).abs() < 1e-9);
    }

    /// Crossing count of an oversampled NRZ stream equals its transition
    /// count (the scan starts at full amplitude, so nothing is skipped).
    #[test]
    fn crossing_count_matches_transitions(
        bits in prop::collection::vec(0u8..2, 8..64),
        nspb in 4usize..16,
    ) {
        let symbols = map_symbols(&bits, ModulationType::Nrz);
        let x = oversample(&symbols, nspb);
        let t: Vec<f64> = (0..x.len()).map(|i| i as f64).collect();
        let opts = CrossingOptions {
            rising_first: false,
            ..CrossingOptions::default()
        };
        let xings = find_crossing_times(&t, &x, opts, 0.0).unwrap();
        let transitions = bits.windows(2).filter(|w| w[0] != w[1]).count();
        prop_assert_eq!(xings.len(), transitions);
    }
}
