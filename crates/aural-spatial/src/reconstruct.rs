//! Impulse-response reconstructor (C11): turns a per-source `EnergyField`
//! into a time-domain SH impulse response via band-filtered noise-tail
//! shaping.

use std::sync::OnceLock;

use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

use aural_dsp::{Biquad, BiquadCoeffs, BAND_CENTERS_HZ};

use crate::energy_field::{EnergyField, BIN_DURATION_SECONDS, NUM_BANDS};

const NOISE_TABLE_SEED: u64 = 0x5350_4154_4941_4C00;

/// A shared bandlimited white-noise source, generated once per requested
/// length and cached so repeated reconstructions at the same settings reuse
/// identical samples (determinism across calls, not just across channels).
fn noise_table(len: usize) -> &'static [f32] {
    static CACHE: OnceLock<parking_lot::Mutex<std::collections::HashMap<usize, &'static [f32]>>> = OnceLock::new();
    let cache = CACHE.get_or_init(Default::default);
    let mut guard = cache.lock();
    if let Some(existing) = guard.get(&len) {
        return existing;
    }
    let mut rng = ChaCha8Rng::seed_from_u64(NOISE_TABLE_SEED.wrapping_add(len as u64));
    let samples: Vec<f32> = (0..len).map(|_| rng.random::<f32>() * 2.0 - 1.0).collect();
    let leaked: &'static [f32] = Vec::leak(samples);
    guard.insert(len, leaked);
    leaked
}

/// A dense, multi-channel time-domain impulse response: one sample buffer
/// per SH channel.
#[derive(Debug, Clone)]
pub struct ImpulseResponse {
    num_channels: usize,
    samples: Vec<f32>,
}

impl ImpulseResponse {
    pub fn num_channels(&self) -> usize {
        self.num_channels
    }

    pub fn len_per_channel(&self) -> usize {
        self.samples.len() / self.num_channels.max(1)
    }

    pub fn channel(&self, index: usize) -> &[f32] {
        let len = self.len_per_channel();
        &self.samples[index * len..(index + 1) * len]
    }
}

/// Reconstructs a SH impulse response from an `EnergyField`, sharing a
/// per-band bandpass filter bank (reset between channels) across every SH
/// channel of a single call.
pub struct Reconstructor {
    sample_rate: f32,
}

impl Reconstructor {
    pub fn new(sample_rate: f32) -> Self {
        Self { sample_rate }
    }

    pub fn reconstruct(&self, field: &EnergyField, duration_seconds: f32) -> ImpulseResponse {
        let total_samples = (duration_seconds * self.sample_rate).ceil().max(1.0) as usize;
        let samples_per_bin = ((BIN_DURATION_SECONDS * self.sample_rate).round().max(1.0)) as usize;
        let num_channels = field.num_channels();
        let noise = noise_table(total_samples);

        let mut filters: Vec<Biquad> = BAND_CENTERS_HZ
            .iter()
            .map(|&freq| Biquad::new(BiquadCoeffs::bandpass(freq, 1.0, self.sample_rate)))
            .collect();

        let mut output = vec![0.0f32; num_channels * total_samples];
        let mut band_scratch = vec![0.0f32; total_samples];

        for channel in 0..num_channels {
            let channel_out = &mut output[channel * total_samples..(channel + 1) * total_samples];
            for band in 0..NUM_BANDS {
                band_scratch.fill(0.0);
                for bin in 0..field.num_bins() {
                    let energy = field.get(channel, band, bin);
                    if energy <= 0.0 {
                        continue;
                    }
                    let amplitude = (energy / BIN_DURATION_SECONDS).sqrt();
                    let start = bin * samples_per_bin;
                    let end = (start + samples_per_bin).min(total_samples);
                    if start >= total_samples {
                        break;
                    }
                    for (i, sample) in band_scratch[start..end].iter_mut().enumerate() {
                        *sample = noise[(start + i) % noise.len()] * amplitude;
                    }
                }
                filters[band].reset();
                filters[band].process_block(&mut band_scratch);
                for (dst, src) in channel_out.iter_mut().zip(band_scratch.iter()) {
                    *dst += src;
                }
            }
        }

        ImpulseResponse { num_channels, samples: output }
    }
}
