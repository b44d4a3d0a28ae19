//! Initial latent sampling — Gaussian noise sized from predicted durations.
//!
//! The denoising loop starts from pure noise; its time axis is the waveform
//! length compressed by `base_chunk_size × chunk_compress_factor`, and its
//! channel axis is `latent_dim × chunk_compress_factor`.  Positions past an
//! item's own latent length are zeroed at sampling time; the mask then gates
//! validity for the vector estimator.

use ndarray::Array3;
use rand::Rng;

use crate::tokenize::length_to_mask;

/// One standard-normal draw via the Box–Muller transform.
///
/// `u1` is floored away from exactly 0 to keep the logarithm finite.
fn standard_normal<R: Rng + ?Sized>(rng: &mut R) -> f32 {
    let u1: f64 = rng.gen::<f64>().max(1e-12);
    let u2: f64 = rng.gen();
    ((-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()) as f32
}

fn ceil_div(n: usize, d: usize) -> usize {
    (n + d - 1) / d
}

/// Draw the initial noisy latent for a batch of durations (seconds) and build
/// the matching `(batch, 1, latent_len)` validity mask.
///
/// Returns `(noisy_latent, latent_mask)` with `noisy_latent` of shape
/// `(batch, latent_dim × compress, latent_len)`, already zeroed outside each
/// item's valid region.
pub fn sample_noisy_latent<R: Rng + ?Sized>(
    durations: &[f32],
    sample_rate: u32,
    base_chunk_size: u32,
    chunk_compress_factor: u32,
    latent_dim: u32,
    rng: &mut R,
) -> (Array3<f32>, Array3<f32>) {
    let bsz = durations.len();
    let max_dur = durations.iter().fold(0.0f32, |a, &b| a.max(b));

    let wav_len_max = (max_dur * sample_rate as f32) as usize;
    let wav_lengths: Vec<usize> = durations
        .iter()
        .map(|&d| (d * sample_rate as f32) as usize)
        .collect();

    let chunk_size = (base_chunk_size * chunk_compress_factor) as usize;
    let latent_len = ceil_div(wav_len_max, chunk_size);
    let latent_dim = (latent_dim * chunk_compress_factor) as usize;

    let mut noisy_latent = Array3::<f32>::zeros((bsz, latent_dim, latent_len));
    for v in noisy_latent.iter_mut() {
        *v = standard_normal(rng);
    }

    let latent_lengths: Vec<usize> = wav_lengths
        .iter()
        .map(|&len| ceil_div(len, chunk_size))
        .collect();
    let latent_mask = length_to_mask(&latent_lengths, Some(latent_len));

    for b in 0..bsz {
        for d in 0..latent_dim {
            for t in 0..latent_len {
                noisy_latent[[b, d, t]] *= latent_mask[[b, 0, t]];
            }
        }
    }

    (noisy_latent, latent_mask)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
