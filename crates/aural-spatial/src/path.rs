//! Path effect (C8): reconstructs a binaural or speaker-panned signal from
//! per-path SH coefficients and a 3-band EQ, with HRTF blending.

use aural_core::{AudioBuffer, AudioEffectState, AudioSettings, CoordinateSpace3, SpeakerLayout};
use aural_dsp::{LinearRamp, ThreeBandEq};

use crate::ambisonic::{max_re_weight, AmbisonicPanner};
use crate::effect::{ConvolutionEffect, ConvolutionEffectSettings};
use crate::hrtf::HrtfDatabase;
use crate::sh::{self, SHRotation};

/// Per-frame input to the path effect.
pub struct PathParams<'a> {
    pub order: usize,
    pub eq_coeffs: [f32; 3],
    pub sh_coeffs: &'a [f32],
    pub listener_frame: CoordinateSpace3,
    pub binaural: bool,
    pub normalize_eq: bool,
}

fn normalized_gains(gains: [f32; 3], normalize: bool) -> [f32; 3] {
    if !normalize {
        return gains;
    }
    let sum: f32 = gains.iter().sum();
    if sum > 1.0 {
        gains.map(|g| g / sum)
    } else {
        gains
    }
}

fn inverse_flat_index(flat: usize) -> (u32, i32) {
    let l = (flat as f32).sqrt().floor() as u32;
    let m = flat as i32 - (l * (l + 1)) as i32;
    (l, m)
}

/// Owns the dry-signal EQ, the binaural convolver (2 ears), and the speaker
/// panning matrix; both output paths are built eagerly at construction so
/// `apply` never allocates a new convolver or matrix mid-stream.
pub struct PathEffect {
    order: usize,
    eq: ThreeBandEq,
    binaural_convolver: ConvolutionEffect,
    panner: AmbisonicPanner,
    gain_ramps: Vec<LinearRamp>,
}

impl PathEffect {
    pub fn new(audio_settings: AudioSettings, order: usize, layout: &SpeakerLayout, database: &HrtfDatabase) -> Self {
        let panner = AmbisonicPanner::new(order, layout);
        let gain_ramps = vec![LinearRamp::new(0.0); panner.num_speakers()];
        Self {
            order,
            eq: ThreeBandEq::new(audio_settings.sampling_rate as f32),
            binaural_convolver: ConvolutionEffect::new(
                audio_settings,
                ConvolutionEffectSettings { ir_size: database.num_samples(), num_ears: 2 },
            ),
            panner,
            gain_ramps,
        }
    }

    /// `dry` is the mono input for this frame; `output` must be sized 2
    /// channels (binaural) or `panner.num_speakers()` channels (panned) by
    /// the caller, matching `params.binaural`.
    pub fn apply(
        &mut self,
        params: &PathParams,
        database: &HrtfDatabase,
        dry: &[f32],
        output: &mut AudioBuffer,
    ) -> AudioEffectState {
        let mut eq_dry = vec![0.0f32; dry.len()];
        self.eq.set_gains(normalized_gains(params.eq_coeffs, params.normalize_eq));
        self.eq.process_into(dry, &mut eq_dry);

        let num_ch = sh::num_coeffs(params.order);
        let mut padded_input = vec![0.0f32; num_ch];
        let copy_len = params.sh_coeffs.len().min(num_ch);
        padded_input[..copy_len].copy_from_slice(&params.sh_coeffs[..copy_len]);

        let rotation = SHRotation::from_frame(params.order, &params.listener_frame);
        let mut rotated = vec![0.0f32; num_ch];
        rotation.apply(&padded_input, &mut rotated);

        if params.binaural {
            let weights: Vec<f32> = (0..num_ch)
                .map(|ch| max_re_weight(inverse_flat_index(ch).0, params.order) * rotated[ch])
                .collect();
            let (left_ir, right_ir) = database.composite_ambisonics_hrir(&weights);
            let mut scratch = vec![vec![0.0f32; eq_dry.len()]; 2];
            let state = self.binaural_convolver.apply(&eq_dry, &[&left_ir, &right_ir], &mut scratch);
            output.channel_mut(0).copy_from_slice(&scratch[0]);
            output.channel_mut(1).copy_from_slice(&scratch[1]);
            state
        } else {
            let gains = self.panner_gains(&rotated);
            for (s, &gain) in gains.iter().enumerate() {
                if s >= output.num_channels() {
                    break;
                }
                self.gain_ramps[s].set_target(gain);
                let out_ch = output.channel_mut(s);
                out_ch.copy_from_slice(&eq_dry);
                self.gain_ramps[s].apply_gain(out_ch);
            }
            AudioEffectState::TailComplete
        }
    }

    /// Projects a single (non-block) SH coefficient vector to per-speaker
    /// gains through the panning matrix's per-sample API.
    fn panner_gains(&self, sh_coeffs: &[f32]) -> Vec<f32> {
        let input = AudioBuffer::from_channels(sh_coeffs.iter().map(|&c| vec![c]).collect());
        let mut output = AudioBuffer::new(self.panner.num_speakers(), 1);
        self.panner.apply(&input, &mut output);
        (0..self.panner.num_speakers()).map(|s| output.channel(s)[0]).collect()
    }

    pub fn order(&self) -> usize {
        self.order
    }

    pub fn reset(&mut self) {
        self.eq.reset();
        self.binaural_convolver.reset();
    }
}
