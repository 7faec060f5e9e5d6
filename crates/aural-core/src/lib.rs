//! Math, audio buffers, and the shared data model underlying the aural
//! spatial audio engine.
//!
//! - [`math`]: vectors, 3x3 matrices, and the right-handed `CoordinateSpace3`.
//! - [`buffer`]: deinterleaved `AudioBuffer` and its array-math contract.
//! - [`settings`]: `AudioSettings`, `SpeakerLayout`, `AudioEffectState`.
//! - [`error`]: the shared construction-time error taxonomy.

pub mod buffer;
pub mod error;
pub mod math;
pub mod settings;

pub use buffer::AudioBuffer;
pub use error::{CoreError, CoreResult};
pub use math::{CoordinateSpace3, Matrix3x3, Vector3};
pub use settings::{AudioEffectState, AudioSettings, SpeakerLayout, SpeakerPosition};
