//! DFT wrappers and FFT-based linear convolution
//!
//! FFT lengths follow the pipeline sample count (`nbits * nspb`) and are not
//! required to be powers of two; `rustfft` falls back to Bluestein's
//! algorithm for awkward sizes. The inverse transform is scaled by `1/N` so
//! that `ifft(fft(x)) == x`.

use num_complex::Complex64;
use rustfft::FftPlanner;

/// Forward DFT of a real-valued vector.
///
/// Output uses the non-shifted layout: indices `0..=N/2` hold non-negative
/// frequencies, the remainder the mirrored negatives.
pub fn fft(x: &[f64]) -> Vec<Complex64> {
    let mut buffer: Vec<Complex64> = x.iter().map(|&v| Complex64::new(v, 0.0)).collect();
    fft_in_place(&mut buffer);
    buffer
}

/// Forward DFT of a complex vector, in place.
pub fn fft_in_place(buffer: &mut [Complex64]) {
    if buffer.is_empty() {
        return;
    }
    let mut planner = FftPlanner::new();
    let fft = planner.plan_fft_forward(buffer.len());
    fft.process(buffer);
}

/// Inverse DFT, scaled by `1/N`.
pub fn ifft(spectrum: &[Complex64]) -> Vec<Complex64> {
    let mut buffer = spectrum.to_vec();
    if buffer.is_empty() {
        return buffer;
    }
    let mut planner = FftPlanner::new();
    let inverse = planner.plan_fft_inverse(buffer.len());
    inverse.process(&mut buffer);
    let scale = 1.0 / buffer.len() as f64;
    for v in buffer.iter_mut() {
        *v *= scale;
    }
    buffer
}

/// Inverse DFT of a spectrum known to describe a real signal.
///
/// Imaginary residue from numerical noise is discarded.
pub fn ifft_real(spectrum: &[Complex64]) -> Vec<f64> {
    ifft(spectrum).into_iter().map(|v| v.re).collect()
}

/// Linear convolution of `x` and `h`, truncated to the first `n` samples.
///
/// Matches direct convolution followed by truncation, but runs in
/// O(m log m) via zero-padded DFTs (m = len(x) + len(h) - 1).
pub fn convolve_trunc(x: &[f64], h: &[f64], n: usize) -> Vec<f64> {
    if x.is_empty() || h.is_empty() || n == 0 {
        return vec![0.0; n];
    }
    let full_len = x.len() + h.len() - 1;
    let mut planner = FftPlanner::new();
    let forward = planner.plan_fft_forward(full_len);
    let inverse = planner.plan_fft_inverse(full_len);

    let mut a: Vec<Complex64> = x.iter().map(|&v| Complex64::new(v, 0.0)).collect();
    a.resize(full_len, Complex64::new(0.0, 0.0));
    let mut b: Vec<Complex64> = h.iter().map(|&v| Complex64::new(v, 0.0)).collect();
    b.resize(full_len, Complex64::new(0.0, 0.0));

    forward.process(&mut a);
    forward.process(&mut b);
    for (va, vb) in a.iter_mut().zip(b.iter()) {
        *va *= vb;
    }
    inverse.process(&mut a);

    let scale = 1.0 / full_len as f64;
    a.iter().take(n.min(full_len)).map(|v| v.re * scale).chain(std::iter::repeat(0.0)).take(n).collect()
}
