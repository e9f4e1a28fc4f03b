//! Symbol generation: pseudo-random bit pattern, line coding, oversampling.

use rand::Rng;

use crate::config::ModulationType;

/// Fixed bit prefix opening every pattern.
///
/// The prefix guarantees a known first rising edge, which the jitter engine
/// uses as its synchronization point when pairing ideal and actual
/// crossings.
pub const SYNC_PREFIX: [u8; 3] = [0, 1, 1];

/// Generate the transmit bit stream: the sync prefix followed by
/// `pattern_len - 3` uniform random bits, tiled and truncated to `nbits`.
pub fn generate_bits<R: Rng>(nbits: usize, pattern_len: usize, rng: &mut R) -> Vec<u8> {
    let mut pattern = Vec::with_capacity(pattern_len);
    pattern.extend_from_slice(&SYNC_PREFIX);
    for _ in SYNC_PREFIX.len()..pattern_len {
        pattern.push(rng.gen_range(0..2) as u8);
    }
    pattern.iter().copied().cycle().take(nbits).collect()
}

/// Map bits to symbol voltages according to the modulation scheme.
///
/// Every scheme returns exactly one symbol per bit period, so the
/// oversampled waveform length stays `nbits * nspb` regardless of scheme;
/// PAM-4 packs two bits per symbol and replicates each symbol twice.
pub fn map_symbols(bits: &[u8], mod_type: ModulationType) -> Vec<f64> {
    match mod_type {
        ModulationType::Nrz => bits.iter().map(|&b| 2.0 * b as f64 - 1.0).collect(),
        ModulationType::DuoBinary => {
            // XOR pre-coding prevents infinite error propagation in the
            // (1 + D) partial-response encoding.
            let mut prev = 0u8;
            let mut symbols = Vec::with_capacity(bits.len());
            for &b in bits {
                let p = b ^ prev;
                symbols.push((p + prev) as f64 - 1.0);
                prev = p;
            }
            symbols
        }
        ModulationType::Pam4 => {
            let mut symbols = Vec::with_capacity(bits.len());
            for pair in bits.chunks_exact(2) {
                let level = ((pair[0] << 1) + pair[1]) as f64 * 2.0 / 3.0 - 1.0;
                symbols.push(level);
                symbols.push(level);
            }
            symbols
        }
    }
}

/// Zero-order-hold oversampling: hold each symbol for `nspb` samples.
pub fn oversample(symbols: &[f64], nspb: usize) -> Vec<f64> {
    let mut x = Vec::with_capacity(symbols.len() * nspb);
    for &s in symbols {
        x.extend(std::iter::repeat(s).take(nspb));
    }
    x
}
