//! Overlap-add convolution effect (C5): single-source, multi-ear partitioned
//! FFT convolution with the `AudioEffectState`/tail contract.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use aural_core::{AudioEffectState, AudioSettings};
use aural_dsp::{FftPlan, IrSpectrum, PartitionedConvolver};

use crate::warn_once;

/// Settings fixed at construction: partitioned-convolution sizing.
#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
pub struct ConvolutionEffectSettings {
    pub ir_size: usize,
    pub num_ears: usize,
}

/// One [`PartitionedConvolver`] per ear, sharing an `FftPlan`. Produces one
/// frame of output per `apply`/`tail` call and reports `AudioEffectState`:
/// `TailRemaining` while convolved energy still lags the most recent
/// non-zero input.
pub struct ConvolutionEffect {
    plan: Arc<FftPlan>,
    convolvers: Vec<PartitionedConvolver>,
    mismatch_logged: AtomicBool,
}

impl ConvolutionEffect {
    pub fn new(audio_settings: AudioSettings, effect_settings: ConvolutionEffectSettings) -> Self {
        let plan = FftPlan::new(audio_settings.frame_size);
        let num_partitions = effect_settings.ir_size.div_ceil(audio_settings.frame_size).max(1);
        let convolvers = (0..effect_settings.num_ears.max(1))
            .map(|_| PartitionedConvolver::new(plan.clone(), num_partitions))
            .collect();
        Self { plan, convolvers, mismatch_logged: AtomicBool::new(false) }
    }

    pub fn num_ears(&self) -> usize {
        self.convolvers.len()
    }

    /// Convolves `input` (one `frame_size`-length mono block) against the
    /// frequency-domain IR for each ear, writing one output channel per ear
    /// into `outputs`.
    pub fn apply(&mut self, input: &[f32], irs: &[&IrSpectrum], outputs: &mut [Vec<f32>]) -> AudioEffectState {
        if irs.len() != self.convolvers.len() || outputs.len() != self.convolvers.len() {
            warn_once!(
                self.mismatch_logged,
                "ConvolutionEffect: ear count mismatch (expected {}, got {}/{})",
                self.convolvers.len(),
                irs.len(),
                outputs.len()
            );
            for out in outputs.iter_mut() {
                aural_core::buffer::silence(out);
            }
            return AudioEffectState::TailComplete;
        }

        let mut remaining = false;
        for ((convolver, ir), out) in self.convolvers.iter_mut().zip(irs.iter()).zip(outputs.iter_mut()) {
            remaining |= convolver.process_block(input, ir, out);
        }
        if remaining {
            AudioEffectState::TailRemaining
        } else {
            AudioEffectState::TailComplete
        }
    }

    /// Zero input, advance the delay line one frame; same return rule.
    pub fn tail(&mut self, irs: &[&IrSpectrum], outputs: &mut [Vec<f32>]) -> AudioEffectState {
        let frame_size = self.plan.frame_size();
        let silence = vec![0.0f32; frame_size];
        self.apply(&silence, irs, outputs)
    }

    /// Monotone-decreasing count of frames of tail remaining, assuming
    /// silent input from here on -- an upper bound derived from the FDL
    /// depth rather than a live re-simulation.
    pub fn num_tail_samples_remaining(&self) -> usize {
        self.convolvers
            .iter()
            .map(|c| c.frames_of_tail_remaining())
            .max()
            .unwrap_or(0)
            * self.plan.frame_size()
    }

    pub fn reset(&mut self) {
        for c in &mut self.convolvers {
            c.reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_tail_complete_after_impulse_drains() {
        let audio_settings = AudioSettings::new(48000, 64);
        let effect_settings = ConvolutionEffectSettings { ir_size: 128, num_ears: 1 };
        let mut effect = ConvolutionEffect::new(audio_settings, effect_settings);

        let plan = FftPlan::new(64);
        let ir = vec![1.0f32; 128];
        let spectrum = IrSpectrum::from_time_domain(&ir, &plan);

        let mut impulse = vec![0.0f32; 64];
        impulse[0] = 1.0;
        let mut outputs = vec![vec![0.0f32; 64]];
        let state = effect.apply(&impulse, &[&spectrum], &mut outputs);
        assert_eq!(state, AudioEffectState::TailRemaining);

        let mut frames = 0;
        loop {
            let state = effect.tail(&[&spectrum], &mut outputs);
            frames += 1;
            if state == AudioEffectState::TailComplete {
                break;
            }
            assert!(frames < 1000, "tail never completed");
        }
    }

    #[test]
    fn ear_count_mismatch_falls_back_to_silence() {
        let audio_settings = AudioSettings::new(48000, 64);
        let effect_settings = ConvolutionEffectSettings { ir_size: 128, num_ears: 2 };
        let mut effect = ConvolutionEffect::new(audio_settings, effect_settings);

        let plan = FftPlan::new(64);
        let ir = vec![1.0f32; 128];
        let spectrum = IrSpectrum::from_time_domain(&ir, &plan);

        let impulse = vec![0.0f32; 64];
        let mut outputs = vec![vec![0.0f32; 64]];
        let state = effect.apply(&impulse, &[&spectrum], &mut outputs);
        assert_eq!(state, AudioEffectState::TailComplete);
        assert!(outputs[0].iter().all(|&s| s == 0.0));
    }
}
