//! Effect orchestrator (C14): per-source state machine chaining the direct
//! path, binaural/panned reflections decode, and pathing, with unified tail
//! draining.

use std::sync::Arc;

use aural_core::{AudioBuffer, AudioEffectState, AudioSettings, CoordinateSpace3, SpeakerLayout, Vector3};
use aural_dsp::LinearRamp;

use crate::ambisonic::{AmbisonicDecoder, AmbisonicPanner, DecodeMode};
use crate::direct::{DirectPathEffect, DirectPathParams};
use crate::effect::{ConvolutionEffect, ConvolutionEffectSettings};
use crate::handoff::PublishedSlot;
use crate::hrtf::HrtfDatabase;
use crate::path::{PathEffect, PathParams};
use crate::sh;

/// Per-frame configuration an orchestrator consumes; one instance is built
/// by the host per source per frame from whatever parameter model it keeps.
pub struct OrchestratorParams<'a> {
    pub direct: DirectPathParams,
    pub direct_level: f32,
    /// Source direction relative to the listener (engine convention:
    /// right=+x, up=+y, ahead=-z), used to spatialize the direct frame via
    /// C5 binaural convolution or C6 panning, per the orchestrator's
    /// configured `direct_decode_mode`.
    pub source_direction: Vector3,
    pub listener_frame: CoordinateSpace3,
    pub reflections_enabled: bool,
    pub reflections_mix_level: f32,
    pub reflections_sh_coeffs: Option<&'a [f32]>,
    pub pathing_enabled: bool,
    pub path_params: Option<PathParams<'a>>,
}

/// Owns one source's full effect chain: C7 direct gain, its own binaural
/// (C5) / panning (C6) spatializer, an Ambisonic decoder for reflections
/// (C6), and a path effect (C8). C13's published HRTF slot is snapshotted
/// once per tick rather than read field-by-field, so every subcomponent in
/// a frame sees the same database.
pub struct EffectOrchestrator {
    handle: u32,
    audio_settings: AudioSettings,
    order: usize,
    direct: DirectPathEffect,
    direct_ramp: LinearRamp,
    direct_mode: DecodeMode,
    direct_binaural: ConvolutionEffect,
    direct_panner: AmbisonicPanner,
    reflections_mix_ramp: LinearRamp,
    reflections_decoder: AmbisonicDecoder,
    path_effect: PathEffect,
    consecutive_tail_complete: u8,
}

impl EffectOrchestrator {
    pub fn new(
        handle: u32,
        audio_settings: AudioSettings,
        order: usize,
        layout: &SpeakerLayout,
        database: &HrtfDatabase,
    ) -> Self {
        Self {
            handle,
            audio_settings,
            order,
            direct: DirectPathEffect::new(audio_settings.sampling_rate as f32),
            direct_ramp: LinearRamp::new(1.0),
            direct_mode: DecodeMode::Panned,
            direct_binaural: ConvolutionEffect::new(
                audio_settings,
                ConvolutionEffectSettings { ir_size: database.num_samples(), num_ears: 2 },
            ),
            direct_panner: AmbisonicPanner::new(order, layout),
            reflections_mix_ramp: LinearRamp::new(1.0),
            reflections_decoder: AmbisonicDecoder::new(
                audio_settings,
                order,
                layout,
                database,
                DecodeMode::Panned,
            ),
            path_effect: PathEffect::new(audio_settings, order, layout, database),
            consecutive_tail_complete: 0,
        }
    }

    pub fn handle(&self) -> u32 {
        self.handle
    }

    pub fn set_reflections_decode_mode(&mut self, mode: DecodeMode) {
        self.reflections_decoder.set_mode(mode);
    }

    /// Selects binaural or panned spatialization for the direct path. On a
    /// mode switch, the now-disabled branch's state is reset before the
    /// next tick so its tail does not bleed, mirroring C6's own mode-switch
    /// contract (the panner is stateless, so only the convolver needs this).
    pub fn set_direct_decode_mode(&mut self, mode: DecodeMode) {
        if mode == self.direct_mode {
            return;
        }
        if self.direct_mode == DecodeMode::AmbisonicsBinaural {
            self.direct_binaural.reset();
        }
        self.direct_mode = mode;
    }

    /// True once the orchestrator has reported `TailComplete` on two
    /// consecutive ticks, signalling the host may stop calling `tick` for
    /// this source until new input arrives.
    pub fn should_stop_processing(&self) -> bool {
        self.consecutive_tail_complete >= 2
    }

    /// Runs one frame: direct path, optional reflections decode, optional
    /// pathing, summed into `output`. `hrtf_slot` is snapshotted once at the
    /// top of the tick (the C13 cross-thread handoff contract) so every
    /// subcomponent observes the same database even if a new one is
    /// published mid-frame.
    pub fn tick(
        &mut self,
        params: &OrchestratorParams,
        hrtf_slot: &PublishedSlot<HrtfDatabase>,
        input: &[f32],
        output: &mut AudioBuffer,
    ) -> AudioEffectState {
        let _span = tracing::trace_span!("orchestrator_tick", source = self.handle).entered();

        hrtf_slot.refresh();
        let Some(database) = hrtf_slot.current() else {
            output.silence();
            return self.finish_tick(AudioEffectState::TailComplete);
        };

        output.silence();
        let frame_size = output.num_samples();

        let mut direct_out = vec![0.0f32; frame_size];
        let mut state = self.direct.apply(&params.direct, input, &mut direct_out);

        self.direct_ramp.set_target(params.direct_level);
        self.direct_ramp.apply_gain(&mut direct_out);

        match self.direct_mode {
            DecodeMode::AmbisonicsBinaural => {
                let (left_ir, right_ir) = database.hrir_nearest(params.source_direction);
                let mut scratch = vec![vec![0.0f32; frame_size]; 2];
                let spatial_state = self.direct_binaural.apply(&direct_out, &[left_ir, right_ir], &mut scratch);
                state = state.combine(spatial_state);
                for (ch, ear) in scratch.iter().enumerate().take(output.num_channels()) {
                    aural_core::buffer::scale_accumulate(ear, 1.0, output.channel_mut(ch));
                }
            }
            DecodeMode::Panned => {
                let point_sh = sh::project_single_point(params.source_direction, self.order);
                let mut sh_input = AudioBuffer::new(point_sh.len(), frame_size);
                for (ch, &coeff) in point_sh.iter().enumerate() {
                    aural_core::buffer::scale(&direct_out, coeff, sh_input.channel_mut(ch));
                }
                let mut panned_out = AudioBuffer::new(self.direct_panner.num_speakers(), frame_size);
                self.direct_panner.apply(&sh_input, &mut panned_out);
                aural_core::buffer::mix(&panned_out, output);
            }
        }

        if params.reflections_enabled {
            if let Some(sh_coeffs) = params.reflections_sh_coeffs {
                let num_ch = sh_coeffs.len();
                let mut mono = vec![0.0f32; frame_size];
                aural_core::buffer::scale(input, 1.0, &mut mono);
                self.reflections_mix_ramp.set_target(params.reflections_mix_level);
                self.reflections_mix_ramp.apply_gain(&mut mono);

                let mut sh_input = AudioBuffer::new(num_ch, frame_size);
                for (ch, coeff) in sh_coeffs.iter().enumerate() {
                    aural_core::buffer::scale(&mono, *coeff, sh_input.channel_mut(ch));
                }
                let mut reflections_out = AudioBuffer::new(output.num_channels(), frame_size);
                let reflections_state = self.reflections_decoder.decode(
                    &params.listener_frame,
                    &database,
                    &sh_input,
                    &mut reflections_out,
                );
                state = state.combine(reflections_state);
                aural_core::buffer::mix(&reflections_out, output);
            }
        }

        if params.pathing_enabled {
            if let Some(path_params) = &params.path_params {
                let num_out_channels = if path_params.binaural { 2 } else { output.num_channels() };
                let mut path_out = AudioBuffer::new(num_out_channels, frame_size);
                let path_state = self.path_effect.apply(path_params, &database, input, &mut path_out);
                state = state.combine(path_state);
                aural_core::buffer::mix(&path_out, output);
            }
        }

        self.finish_tick(state)
    }

    fn finish_tick(&mut self, state: AudioEffectState) -> AudioEffectState {
        if state.is_complete() {
            self.consecutive_tail_complete = self.consecutive_tail_complete.saturating_add(1);
        } else {
            self.consecutive_tail_complete = 0;
        }
        state
    }

    pub fn audio_settings(&self) -> AudioSettings {
        self.audio_settings
    }

    pub fn order(&self) -> usize {
        self.order
    }

    pub fn reset(&mut self) {
        self.direct.reset();
        self.direct_binaural.reset();
        self.path_effect.reset();
        self.consecutive_tail_complete = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::direct::{AirAbsorptionModel, DirectivityParams, DistanceAttenuationModel};
    use aural_core::Vector3;

    fn make_orchestrator() -> (EffectOrchestrator, PublishedSlot<HrtfDatabase>, AudioSettings) {
        let audio_settings = AudioSettings::new(48000, 32);
        let order = 1;
        let layout = SpeakerLayout::Stereo;
        let database = HrtfDatabase::synthetic(audio_settings, 64, order);
        let slot = PublishedSlot::new();
        slot.publish(database.clone());
        slot.refresh();
        let orchestrator = EffectOrchestrator::new(0, audio_settings, order, &layout, &database);
        (orchestrator, slot, audio_settings)
    }

    fn direct_params() -> DirectPathParams {
        DirectPathParams {
            distance: 2.0,
            distance_attenuation: DistanceAttenuationModel::Physics { min_distance: 1.0 },
            air_absorption: AirAbsorptionModel::Disabled,
            directivity: DirectivityParams::OMNI,
            occlusion: 1.0,
            transmission: [1.0; 3],
        }
    }

    #[test]
    fn direct_only_tick_reports_tail_complete_immediately() {
        let (mut orchestrator, slot, audio_settings) = make_orchestrator();
        let params = OrchestratorParams {
            direct: direct_params(),
            direct_level: 1.0,
            source_direction: Vector3::new(0.0, 0.0, -1.0),
            listener_frame: CoordinateSpace3::canonical(Vector3::ZERO),
            reflections_enabled: false,
            reflections_mix_level: 0.0,
            reflections_sh_coeffs: None,
            pathing_enabled: false,
            path_params: None,
        };
        let input = vec![1.0f32; audio_settings.frame_size];
        let mut output = AudioBuffer::new(2, audio_settings.frame_size);
        let state = orchestrator.tick(&params, &slot, &input, &mut output);
        assert_eq!(state, AudioEffectState::TailComplete);
        assert!(output.channel(0).iter().any(|&s| s != 0.0));
    }

    #[test]
    fn missing_hrtf_publication_produces_silence() {
        let audio_settings = AudioSettings::new(48000, 32);
        let order = 1;
        let layout = SpeakerLayout::Stereo;
        let database = HrtfDatabase::synthetic(audio_settings, 64, order);
        let mut orchestrator = EffectOrchestrator::new(0, audio_settings, order, &layout, &database);
        let empty_slot: PublishedSlot<HrtfDatabase> = PublishedSlot::new();

        let params = OrchestratorParams {
            direct: direct_params(),
            direct_level: 1.0,
            source_direction: Vector3::new(0.0, 0.0, -1.0),
            listener_frame: CoordinateSpace3::canonical(Vector3::ZERO),
            reflections_enabled: false,
            reflections_mix_level: 0.0,
            reflections_sh_coeffs: None,
            pathing_enabled: false,
            path_params: None,
        };
        let input = vec![1.0f32; audio_settings.frame_size];
        let mut output = AudioBuffer::new(2, audio_settings.frame_size);
        let state = orchestrator.tick(&params, &empty_slot, &input, &mut output);
        assert_eq!(state, AudioEffectState::TailComplete);
        assert!(output.channel(0).iter().all(|&s| s == 0.0));
    }

    #[test]
    fn binaural_direct_path_spatializes_off_center_source() {
        let (mut orchestrator, slot, audio_settings) = make_orchestrator();
        orchestrator.set_direct_decode_mode(DecodeMode::AmbisonicsBinaural);
        let params = OrchestratorParams {
            direct: direct_params(),
            direct_level: 1.0,
            source_direction: Vector3::new(1.0, 1.0, 1.0).normalized(),
            listener_frame: CoordinateSpace3::canonical(Vector3::ZERO),
            reflections_enabled: false,
            reflections_mix_level: 0.0,
            reflections_sh_coeffs: None,
            pathing_enabled: false,
            path_params: None,
        };
        let input: Vec<f32> = (0..audio_settings.frame_size)
            .map(|i| (i as f32 / audio_settings.frame_size as f32 * std::f32::consts::TAU * 4.0).sin())
            .collect();
        let mut output = AudioBuffer::new(2, audio_settings.frame_size);
        orchestrator.tick(&params, &slot, &input, &mut output);
        let rms = |ch: &[f32]| (ch.iter().map(|&s| s * s).sum::<f32>() / ch.len() as f32).sqrt();
        let rms_left = rms(output.channel(0));
        let rms_right = rms(output.channel(1));
        assert!((rms_left - rms_right).abs() > 1e-6, "left/right RMS should differ for an off-center source");
    }

    #[test]
    fn reflections_branch_contributes_energy_when_enabled() {
        let (mut orchestrator, slot, audio_settings) = make_orchestrator();
        let sh_coeffs = vec![1.0, 0.0, 0.0, 0.0];
        let params = OrchestratorParams {
            direct: direct_params(),
            direct_level: 0.0,
            source_direction: Vector3::new(0.0, 0.0, -1.0),
            listener_frame: CoordinateSpace3::canonical(Vector3::ZERO),
            reflections_enabled: true,
            reflections_mix_level: 1.0,
            reflections_sh_coeffs: Some(&sh_coeffs),
            pathing_enabled: false,
            path_params: None,
        };
        let input = vec![1.0f32; audio_settings.frame_size];
        let mut output = AudioBuffer::new(2, audio_settings.frame_size);
        orchestrator.tick(&params, &slot, &input, &mut output);
        assert!(output.channel(0).iter().any(|&s| s != 0.0));
    }

    #[test]
    fn should_stop_processing_after_two_consecutive_tail_complete_ticks() {
        let (mut orchestrator, slot, audio_settings) = make_orchestrator();
        let params = OrchestratorParams {
            direct: direct_params(),
            direct_level: 1.0,
            source_direction: Vector3::new(0.0, 0.0, -1.0),
            listener_frame: CoordinateSpace3::canonical(Vector3::ZERO),
            reflections_enabled: false,
            reflections_mix_level: 0.0,
            reflections_sh_coeffs: None,
            pathing_enabled: false,
            path_params: None,
        };
        let input = vec![0.0f32; audio_settings.frame_size];
        let mut output = AudioBuffer::new(2, audio_settings.frame_size);
        assert!(!orchestrator.should_stop_processing());
        orchestrator.tick(&params, &slot, &input, &mut output);
        assert!(!orchestrator.should_stop_processing());
        orchestrator.tick(&params, &slot, &input, &mut output);
        assert!(orchestrator.should_stop_processing());
    }
}
