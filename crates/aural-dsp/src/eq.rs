//! A 3-band EQ built from three cascaded [`Biquad`] stages (low-shelf,
//! peaking, high-shelf) at fixed representative band centers.
//!
//! Used by both the direct-path gain chain and the path effect's dry-signal
//! EQ: rather than a true crossover (band-split then recombine, which needs
//! phase-complementary filters to avoid comb filtering), a cascade of three
//! shelf/peak stages applies each band's gain directly, the same technique
//! real-time geometry-driven spatializers use for air-absorption and
//! occlusion/transmission coloration.

use crate::biquad::{Biquad, BiquadCoeffs};

/// Representative octave-band centers: low (~400 Hz), mid (~2.5 kHz), high
/// (~15 kHz) -- shared by air absorption (C7), transmission (C7), and the
/// path-effect EQ (C8).
pub const BAND_CENTERS_HZ: [f32; 3] = [400.0, 2500.0, 15000.0];

const SHELF_Q: f32 = 0.707;
const PEAK_Q: f32 = 1.0;

/// A cascaded 3-band tone-control EQ with independently settable per-band
/// gains (linear, not dB).
#[derive(Debug, Clone)]
pub struct ThreeBandEq {
    sample_rate: f32,
    low: Biquad,
    mid: Biquad,
    high: Biquad,
    gains: [f32; 3],
}

impl ThreeBandEq {
    pub fn new(sample_rate: f32) -> Self {
        let mut eq = Self {
            sample_rate,
            low: Biquad::new(BiquadCoeffs::identity()),
            mid: Biquad::new(BiquadCoeffs::identity()),
            high: Biquad::new(BiquadCoeffs::identity()),
            gains: [1.0; 3],
        };
        eq.set_gains([1.0, 1.0, 1.0]);
        eq
    }

    /// Sets all three band gains (linear multipliers) and recomputes
    /// coefficients. Coefficients are recomputed once per call -- not
    /// per-sample -- matching how the per-frame effects that own this EQ
    /// update it once per audio callback.
    pub fn set_gains(&mut self, gains: [f32; 3]) {
        self.gains = gains;
        let db = gains.map(linear_to_db);
        self.low.set_coeffs(BiquadCoeffs::low_shelf(BAND_CENTERS_HZ[0], SHELF_Q, db[0], self.sample_rate));
        self.mid.set_coeffs(BiquadCoeffs::peaking(BAND_CENTERS_HZ[1], PEAK_Q, db[1], self.sample_rate));
        self.high.set_coeffs(BiquadCoeffs::high_shelf(BAND_CENTERS_HZ[2], SHELF_Q, db[2], self.sample_rate));
    }

    pub fn gains(&self) -> [f32; 3] {
        self.gains
    }

    pub fn reset(&mut self) {
        self.low.reset();
        self.mid.reset();
        self.high.reset();
    }

    pub fn process_block(&mut self, samples: &mut [f32]) {
        self.low.process_block(samples);
        self.mid.process_block(samples);
        self.high.process_block(samples);
    }

    pub fn process_into(&mut self, input: &[f32], output: &mut [f32]) {
        output.copy_from_slice(input);
        self.process_block(output);
    }
}

fn linear_to_db(gain: f32) -> f32 {
    20.0 * gain.max(1e-6).log10()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unity_gains_pass_signal_through_near_identity() {
        let mut eq = ThreeBandEq::new(48000.0);
        let input = vec![0.3, -0.2, 0.5, -0.1, 0.7];
        let mut output = vec![0.0; input.len()];
        eq.process_into(&input, &mut output);
        for (i, o) in input.iter().zip(output.iter()) {
            assert!((i - o).abs() < 1e-3);
        }
    }

    #[test]
    fn zero_gain_band_attenuates_steady_tone() {
        let sample_rate = 48000.0;
        let mut eq = ThreeBandEq::new(sample_rate);
        eq.set_gains([0.0, 1.0, 1.0]);
        let n = 2048;
        let freq = BAND_CENTERS_HZ[0];
        let mut peak_after = 0.0f32;
        for i in 0..n {
            let t = i as f32 / sample_rate;
            let x = (2.0 * std::f32::consts::PI * freq * t).sin();
            let mut buf = [x];
            eq.process_block(&mut buf);
            if i > n / 2 {
                peak_after = peak_after.max(buf[0].abs());
            }
        }
        assert!(peak_after < 0.5, "expected low band attenuated, got {peak_after}");
    }
}
