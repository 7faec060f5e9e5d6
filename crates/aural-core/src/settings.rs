//! Immutable value types shared by every effect and the simulator:
//! `AudioSettings`, `SpeakerLayout`, and `AudioEffectState`.

use serde::{Deserialize, Serialize};

use crate::math::Vector3;

/// Sampling rate and frame size. Fixed at effect construction; every
/// connected effect in a graph must agree on both fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioSettings {
    pub sampling_rate: u32,
    pub frame_size: usize,
}

impl AudioSettings {
    pub const fn new(sampling_rate: u32, frame_size: usize) -> Self {
        Self { sampling_rate, frame_size }
    }
}

/// A single speaker's position, as a unit direction from the listener.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpeakerPosition {
    pub direction: Vector3,
}

/// Fixed at construction: number of speakers and their positions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SpeakerLayout {
    Mono,
    Stereo,
    Quad,
    Surround5_1,
    Surround7_1,
    Custom(Vec<SpeakerPosition>),
}

impl SpeakerLayout {
    pub fn num_speakers(&self) -> usize {
        match self {
            SpeakerLayout::Mono => 1,
            SpeakerLayout::Stereo => 2,
            SpeakerLayout::Quad => 4,
            SpeakerLayout::Surround5_1 => 6,
            SpeakerLayout::Surround7_1 => 8,
            SpeakerLayout::Custom(positions) => positions.len(),
        }
    }

    /// The fixed, conventional direction for each speaker in this layout, in
    /// the engine's right-handed frame (right = +x, up = +y, ahead = -z).
    pub fn positions(&self) -> Vec<Vector3> {
        const FL: (f32, f32) = (-30.0, 0.0);
        const FR: (f32, f32) = (30.0, 0.0);
        const C: (f32, f32) = (0.0, 0.0);
        const LFE: (f32, f32) = (0.0, 0.0);
        const SL: (f32, f32) = (-110.0, 0.0);
        const SR: (f32, f32) = (110.0, 0.0);
        const BL: (f32, f32) = (-150.0, 0.0);
        const BR: (f32, f32) = (150.0, 0.0);

        let from_deg = |(az_deg, el_deg): (f32, f32)| {
            Vector3::from_polar(
                (-az_deg).to_radians() - std::f32::consts::FRAC_PI_2,
                el_deg.to_radians(),
            )
        };

        match self {
            SpeakerLayout::Mono => vec![Vector3::new(0.0, 0.0, -1.0)],
            SpeakerLayout::Stereo => vec![from_deg(FL), from_deg(FR)],
            SpeakerLayout::Quad => {
                vec![from_deg(FL), from_deg(FR), from_deg(BL), from_deg(BR)]
            }
            SpeakerLayout::Surround5_1 => {
                vec![from_deg(FL), from_deg(FR), from_deg(C), from_deg(LFE), from_deg(SL), from_deg(SR)]
            }
            SpeakerLayout::Surround7_1 => vec![
                from_deg(FL),
                from_deg(FR),
                from_deg(C),
                from_deg(LFE),
                from_deg(SL),
                from_deg(SR),
                from_deg(BL),
                from_deg(BR),
            ],
            SpeakerLayout::Custom(positions) => positions.iter().map(|p| p.direction).collect(),
        }
    }
}

/// The tail-drain state every effect reports from `apply`/`tail`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioEffectState {
    TailComplete,
    TailRemaining,
}

impl AudioEffectState {
    pub fn is_complete(self) -> bool {
        matches!(self, AudioEffectState::TailComplete)
    }

    /// Combines two subcomponents' states: remaining if either is remaining.
    pub fn combine(self, other: AudioEffectState) -> AudioEffectState {
        if self == AudioEffectState::TailRemaining || other == AudioEffectState::TailRemaining {
            AudioEffectState::TailRemaining
        } else {
            AudioEffectState::TailComplete
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn speaker_counts_match_layout() {
        assert_eq!(SpeakerLayout::Mono.num_speakers(), 1);
        assert_eq!(SpeakerLayout::Stereo.num_speakers(), 2);
        assert_eq!(SpeakerLayout::Surround5_1.num_speakers(), 6);
        assert_eq!(SpeakerLayout::Surround7_1.num_speakers(), 8);
    }

    #[test]
    fn combine_state_prefers_remaining() {
        use AudioEffectState::*;
        assert_eq!(TailComplete.combine(TailComplete), TailComplete);
        assert_eq!(TailComplete.combine(TailRemaining), TailRemaining);
        assert_eq!(TailRemaining.combine(TailComplete), TailRemaining);
    }
}
