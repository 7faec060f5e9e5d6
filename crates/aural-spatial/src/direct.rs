//! Direct-path effect (C7): per-frame gain chain (distance attenuation,
//! 3-band air absorption, directivity, occlusion, 3-band transmission),
//! with linear parameter ramping across the frame. Never produces a tail.

use aural_core::AudioEffectState;
use aural_dsp::{ThreeBandEq, BAND_CENTERS_HZ};

/// Default per-meter air-absorption coefficients for the low/mid/high bands
/// (`BAND_CENTERS_HZ`), representative of ~400 Hz/~2.5 kHz/~15 kHz octaves.
pub const DEFAULT_AIR_ABSORPTION_ALPHA: [f32; 3] = [0.0002, 0.0017, 0.0182];

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum DistanceAttenuationModel {
    UserDefined(f32),
    Physics { min_distance: f32 },
    Disabled,
}

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum AirAbsorptionModel {
    UserDefined([f32; 3]),
    Physics,
    Disabled,
}

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct DirectivityParams {
    pub dipole_weight: f32,
    pub dipole_power: f32,
    pub cos_theta: f32,
}

impl DirectivityParams {
    pub const OMNI: Self = Self { dipole_weight: 0.0, dipole_power: 1.0, cos_theta: 1.0 };

    /// `(1-w) + w * |cos theta|^p`.
    pub fn evaluate(&self) -> f32 {
        let w = self.dipole_weight.clamp(0.0, 1.0);
        let p = self.dipole_power.max(1.0);
        (1.0 - w) + w * self.cos_theta.abs().powf(p)
    }
}

/// Per-frame input parameters for the direct-path gain chain.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct DirectPathParams {
    pub distance: f32,
    pub distance_attenuation: DistanceAttenuationModel,
    pub air_absorption: AirAbsorptionModel,
    pub directivity: DirectivityParams,
    pub occlusion: f32,
    pub transmission: [f32; 3],
}

impl DirectPathParams {
    fn distance_attenuation_gain(&self) -> f32 {
        match self.distance_attenuation {
            DistanceAttenuationModel::UserDefined(g) => g,
            DistanceAttenuationModel::Physics { min_distance } => {
                (min_distance / self.distance.max(1e-4)).min(1.0)
            }
            DistanceAttenuationModel::Disabled => 1.0,
        }
    }

    fn air_absorption_gains(&self) -> [f32; 3] {
        match self.air_absorption {
            AirAbsorptionModel::UserDefined(g) => g,
            AirAbsorptionModel::Physics => {
                DEFAULT_AIR_ABSORPTION_ALPHA.map(|alpha| (-alpha * self.distance).exp())
            }
            AirAbsorptionModel::Disabled => [1.0; 3],
        }
    }

    fn band_gains(&self) -> [f32; 3] {
        let occlusion = self.occlusion.clamp(0.0, 1.0);
        let air = self.air_absorption_gains();
        let mut gains = [0.0; 3];
        for b in 0..3 {
            let mix = occlusion + (1.0 - occlusion) * self.transmission[b];
            gains[b] = air[b] * mix;
        }
        gains
    }
}

/// The direct-path gain chain. Owns the broadband ramp (distance
/// attenuation x directivity) and the 3-band EQ that carries
/// air-absorption x occlusion/transmission coloration. Reports
/// `TailComplete` always (a gain chain has no memory), but still exposes
/// `tail()` to fit the orchestrator's uniform effect contract.
pub struct DirectPathEffect {
    broadband_ramp: aural_dsp::LinearRamp,
    eq: ThreeBandEq,
}

impl DirectPathEffect {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            broadband_ramp: aural_dsp::LinearRamp::new(1.0),
            eq: ThreeBandEq::new(sample_rate),
        }
    }

    /// Computes the frame's gain targets from `params` and ramps the
    /// broadband scalar (distance attenuation x directivity) across the
    /// frame as a per-sample multiply. The EQ's band gains (air absorption
    /// x occlusion/transmission mix) only recompute coefficients once per
    /// call, so a sudden change (e.g. occlusion snapping in) would
    /// otherwise step the filtered signal discontinuously mid-stream; when
    /// the targets differ from the EQ's current gains, this frame is
    /// rendered twice -- once with the old coefficients (via a disposable
    /// clone, leaving `self.eq`'s continuous filter state untouched) and
    /// once with the new -- and linearly crossfaded sample by sample, so
    /// the frame ends exactly on the new target the way the broadband
    /// ramp does.
    pub fn apply(&mut self, params: &DirectPathParams, input: &[f32], output: &mut [f32]) -> AudioEffectState {
        let broadband_target = params.distance_attenuation_gain() * params.directivity.evaluate();
        self.broadband_ramp.set_target(broadband_target);

        output.copy_from_slice(&input[..output.len().min(input.len())]);
        self.broadband_ramp.apply_gain(output);

        let new_bands = params.band_gains();
        if new_bands == self.eq.gains() {
            self.eq.process_block(output);
        } else {
            let mut old_eq = self.eq.clone();
            let mut old_out = output.to_vec();
            old_eq.process_block(&mut old_out);

            self.eq.set_gains(new_bands);
            self.eq.process_block(output);

            let n = output.len().max(1) as f32;
            for (i, (sample, old)) in output.iter_mut().zip(old_out.iter()).enumerate() {
                let w = (i + 1) as f32 / n;
                *sample = old * (1.0 - w) + *sample * w;
            }
        }

        AudioEffectState::TailComplete
    }

    /// No tail: returns silence and reports `TailComplete`.
    pub fn tail(&mut self, output: &mut [f32]) -> AudioEffectState {
        aural_core::buffer::silence(output);
        AudioEffectState::TailComplete
    }

    pub fn num_tail_samples_remaining(&self) -> usize {
        0
    }

    pub fn reset(&mut self) {
        self.eq.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn physics_attenuation_matches_inverse_distance_curve() {
        let params_at = |distance: f32| DirectPathParams {
            distance,
            distance_attenuation: DistanceAttenuationModel::Physics { min_distance: 1.0 },
            air_absorption: AirAbsorptionModel::Disabled,
            directivity: DirectivityParams::OMNI,
            occlusion: 1.0,
            transmission: [1.0; 3],
        };
        assert!((params_at(2.0).distance_attenuation_gain() - 0.5).abs() < 1e-4);
        assert!((params_at(20.0).distance_attenuation_gain() - 0.05).abs() < 1e-4);
    }

    #[test]
    fn occlusion_one_passes_transmission_through_unmixed() {
        let params = DirectPathParams {
            distance: 1.0,
            distance_attenuation: DistanceAttenuationModel::Disabled,
            air_absorption: AirAbsorptionModel::Disabled,
            directivity: DirectivityParams::OMNI,
            occlusion: 1.0,
            transmission: [0.1, 0.2, 0.3],
        };
        assert_eq!(params.band_gains(), [1.0, 1.0, 1.0]);
    }

    #[test]
    fn occlusion_zero_uses_transmission_directly() {
        let params = DirectPathParams {
            distance: 1.0,
            distance_attenuation: DistanceAttenuationModel::Disabled,
            air_absorption: AirAbsorptionModel::Disabled,
            directivity: DirectivityParams::OMNI,
            occlusion: 0.0,
            transmission: [0.1, 0.2, 0.3],
        };
        assert_eq!(params.band_gains(), [0.1, 0.2, 0.3]);
    }

    #[test]
    fn band_gain_jump_crossfades_within_the_frame_instead_of_stepping() {
        let mut effect = DirectPathEffect::new(48000.0);
        let unoccluded = DirectPathParams {
            distance: 1.0,
            distance_attenuation: DistanceAttenuationModel::Disabled,
            air_absorption: AirAbsorptionModel::Disabled,
            directivity: DirectivityParams::OMNI,
            occlusion: 1.0,
            transmission: [0.0; 3],
        };
        let fully_occluded = DirectPathParams { occlusion: 0.0, transmission: [0.0; 3], ..unoccluded };

        let input = vec![1.0f32; 64];
        let mut output = vec![0.0f32; 64];
        effect.apply(&unoccluded, &input, &mut output);

        // Band gain target drops from 1.0 to 0.0 on this frame; the start of
        // the frame should still carry most of the old (unity) response
        // while the end has mostly crossfaded to the near-silent target, not
        // step everywhere at once.
        effect.apply(&fully_occluded, &input, &mut output);
        let first_quarter: f32 = output[..16].iter().map(|s| s.abs()).sum();
        let last_quarter: f32 = output[48..].iter().map(|s| s.abs()).sum();
        assert!(
            first_quarter > last_quarter,
            "early samples ({first_quarter}) should carry more signal than late samples ({last_quarter})"
        );
    }

    #[test]
    fn effect_never_reports_a_tail() {
        let mut effect = DirectPathEffect::new(48000.0);
        let params = DirectPathParams {
            distance: 5.0,
            distance_attenuation: DistanceAttenuationModel::Physics { min_distance: 1.0 },
            air_absorption: AirAbsorptionModel::Physics,
            directivity: DirectivityParams::OMNI,
            occlusion: 0.8,
            transmission: [0.5; 3],
        };
        let input = vec![1.0f32; 64];
        let mut output = vec![0.0f32; 64];
        let state = effect.apply(&params, &input, &mut output);
        assert_eq!(state, AudioEffectState::TailComplete);
        let mut tail_out = vec![1.0f32; 64];
        let tail_state = effect.tail(&mut tail_out);
        assert_eq!(tail_state, AudioEffectState::TailComplete);
        assert!(tail_out.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn band_centers_are_reused_from_dsp_crate() {
        assert_eq!(BAND_CENTERS_HZ.len(), 3);
    }
}
