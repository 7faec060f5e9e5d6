//! Reusable signal-processing primitives shared by the spatial-audio
//! effects: biquad band filters, per-frame parameter ramps, and the
//! partitioned-FFT convolution engine.

pub mod biquad;
pub mod convolution;
pub mod eq;
pub mod smoothing;

pub use biquad::{Biquad, BiquadCoeffs};
pub use convolution::{FftPlan, IrSpectrum, PartitionedConvolver};
pub use eq::{ThreeBandEq, BAND_CENTERS_HZ};
pub use smoothing::LinearRamp;
