//! Real-time spatial audio core: HRTF binaural rendering, Ambisonic
//! rotate/pan/decode, direct-path gain modeling, reflection simulation, and
//! the orchestrator that ties one source's effect chain together.
//!
//! Module map:
//! - [`sh`]: real spherical harmonics basis, projection, rotation (C3).
//! - [`hrtf`]: per-direction and per-Ambisonic-channel HRTF database (C4).
//! - [`effect`]: partitioned-FFT convolution effect (C5).
//! - [`ambisonic`]: SH rotation, panning, and Ambisonics-binaural decode (C6).
//! - [`direct`]: direct-path gain chain (C7).
//! - [`path`]: pathing effect, binaural or panned (C8).
//! - [`job_graph`]: cancelable work-queue driving simulator batches (C9).
//! - [`material`], [`scene`]: acoustic materials and scene-query traits.
//! - [`energy_field`]: the simulator's output histogram and persistence.
//! - [`simulator`]: Monte-Carlo reflection simulator (C10).
//! - [`reconstruct`]: energy field to time-domain impulse response (C11).
//! - [`probe`]: probe mutual-visibility testing and graph (C12).
//! - [`handoff`]: cross-thread publication and source handle table (C13).
//! - [`orchestrator`]: per-source effect chain and tail-drain policy (C14).

pub mod ambisonic;
pub mod direct;
pub mod effect;
pub mod energy_field;
pub mod error;
pub mod handoff;
pub mod hrtf;
pub mod job_graph;
pub mod material;
pub mod orchestrator;
pub mod path;
pub mod probe;
pub mod reconstruct;
pub mod scene;
pub mod sh;
pub mod simulator;

pub use ambisonic::{AmbisonicDecoder, AmbisonicPanner, AmbisonicRotator, DecodeMode};
pub use direct::{DirectPathEffect, DirectPathParams};
pub use effect::ConvolutionEffect;
pub use energy_field::EnergyField;
pub use error::{SpatialError, SpatialResult};
pub use handoff::{PublishedSlot, SourceManager};
pub use hrtf::HrtfDatabase;
pub use job_graph::JobGraph;
pub use material::Material;
pub use orchestrator::{EffectOrchestrator, OrchestratorParams};
pub use path::{PathEffect, PathParams};
pub use probe::{Probe, ProbeVisibilityGraph, ProbeVisibilityTester, VisibilityRange};
pub use reconstruct::{ImpulseResponse, Reconstructor};
pub use scene::{BruteForceScene, Hit, Ray, Scene};
pub use simulator::{ListenerDescriptor, ReflectionSimulator, SourceDescriptor};
