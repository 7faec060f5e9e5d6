//! Partitioned frequency-domain convolution engine.
//!
//! Splits a long impulse response into `frameSize`-length blocks (uniform
//! partitioning) so that a single source's convolution can be produced one
//! `frameSize` block at a time with bounded per-frame latency: the classic
//! uniform-partitioned overlap-add (UPOLA) algorithm. This module owns only
//! the frequency-domain machinery; the tail/`AudioEffectState` contract
//! lives one layer up, in the effect that wraps this engine.

use std::collections::VecDeque;
use std::sync::Arc;

use realfft::{ComplexToReal, RealFftPlanner, RealToComplex};
use rustfft::num_complex::Complex32;

/// A forward/inverse real-FFT pair sized `2 * frame_size`, shared (via `Arc`)
/// across every convolver that uses the same frame size -- planning an FFT
/// is comparatively expensive and many per-source convolvers run with an
/// identical `AudioSettings::frame_size`.
pub struct FftPlan {
    frame_size: usize,
    forward: Arc<dyn RealToComplex<f32>>,
    inverse: Arc<dyn ComplexToReal<f32>>,
}

impl FftPlan {
    pub fn new(frame_size: usize) -> Arc<Self> {
        let mut planner = RealFftPlanner::<f32>::new();
        let fft_size = frame_size * 2;
        Arc::new(Self {
            frame_size,
            forward: planner.plan_fft_forward(fft_size),
            inverse: planner.plan_fft_inverse(fft_size),
        })
    }

    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    /// Number of complex bins produced by this plan's forward transform.
    pub fn num_spectrum_bins(&self) -> usize {
        self.frame_size + 1
    }
}

/// An impulse response, pre-partitioned into `frame_size`-length blocks and
/// transformed to the frequency domain once at construction.
#[derive(Clone)]
pub struct IrSpectrum {
    partitions: Vec<Vec<Complex32>>,
}

impl IrSpectrum {
    /// Builds partitions from a time-domain impulse response. The final
    /// partition is zero-padded if `ir.len()` is not a multiple of
    /// `plan.frame_size()`.
    pub fn from_time_domain(ir: &[f32], plan: &FftPlan) -> Self {
        let frame_size = plan.frame_size;
        let num_partitions = ir.len().div_ceil(frame_size).max(1);
        let mut partitions = Vec::with_capacity(num_partitions);

        let mut scratch_time = plan.forward.make_input_vec();
        for p in 0..num_partitions {
            scratch_time.fill(0.0);
            let start = p * frame_size;
            let end = (start + frame_size).min(ir.len());
            if start < ir.len() {
                scratch_time[..end - start].copy_from_slice(&ir[start..end]);
            }
            let mut spectrum = plan.forward.make_output_vec();
            plan.forward
                .process(&mut scratch_time, &mut spectrum)
                .expect("forward FFT shape mismatch is a construction-time programming error");
            partitions.push(spectrum);
        }

        Self { partitions }
    }

    /// Directly wraps already-transformed partitions, e.g. HRIRs shipped
    /// pre-baked into their frequency-domain form by the HRTF database.
    pub fn from_partitions(partitions: Vec<Vec<Complex32>>) -> Self {
        Self { partitions }
    }

    pub fn num_partitions(&self) -> usize {
        self.partitions.len()
    }

    pub fn partition(&self, index: usize) -> &[Complex32] {
        &self.partitions[index]
    }
}

/// Per-channel partitioned convolution state: the frequency-delay line (FDL)
/// of past input spectra, the output overlap tail, and FFT scratch buffers.
pub struct PartitionedConvolver {
    plan: Arc<FftPlan>,
    num_partitions: usize,
    fdl: VecDeque<Vec<Complex32>>,
    overlap: Vec<f32>,
    freq_accum: Vec<Complex32>,
    time_scratch_in: Vec<f32>,
    time_scratch_out: Vec<f32>,
    /// Frames since the last input block containing any non-zero sample;
    /// saturates at `num_partitions` once fully flushed.
    frames_since_nonzero_input: usize,
}

impl PartitionedConvolver {
    pub fn new(plan: Arc<FftPlan>, num_partitions: usize) -> Self {
        let frame_size = plan.frame_size();
        let bins = plan.num_spectrum_bins();
        let zero_spectrum = vec![Complex32::new(0.0, 0.0); bins];
        Self {
            fdl: VecDeque::from(vec![zero_spectrum.clone(); num_partitions.max(1)]),
            overlap: vec![0.0; frame_size],
            freq_accum: vec![Complex32::new(0.0, 0.0); bins],
            time_scratch_in: plan.forward.make_input_vec(),
            time_scratch_out: plan.inverse.make_output_vec(),
            num_partitions: num_partitions.max(1),
            plan,
            frames_since_nonzero_input: usize::MAX / 2,
        }
    }

    pub fn reset(&mut self) {
        for spectrum in &mut self.fdl {
            spectrum.fill(Complex32::new(0.0, 0.0));
        }
        self.overlap.fill(0.0);
        self.frames_since_nonzero_input = usize::MAX / 2;
    }

    /// Upper bound, in frames, on how much longer the tail can remain
    /// non-silent assuming all-silent input from here on.
    pub fn frames_of_tail_remaining(&self) -> usize {
        self.num_partitions.saturating_sub(self.frames_since_nonzero_input)
    }

    /// Convolves one `frame_size`-length input block against `ir`, writing
    /// `frame_size` output samples. Returns `true` while the FDL may still
    /// hold energy from a past non-silent input (tail remaining).
    pub fn process_block(&mut self, input: &[f32], ir: &IrSpectrum, output: &mut [f32]) -> bool {
        let frame_size = self.plan.frame_size();
        debug_assert_eq!(input.len(), frame_size);
        debug_assert_eq!(output.len(), frame_size);

        let is_silent = input.iter().all(|&s| s == 0.0);
        self.frames_since_nonzero_input = if is_silent {
            self.frames_since_nonzero_input.saturating_add(1)
        } else {
            0
        };

        self.time_scratch_in.fill(0.0);
        self.time_scratch_in[..frame_size].copy_from_slice(input);
        let mut new_spectrum = self.plan.forward.make_output_vec();
        self.plan
            .forward
            .process(&mut self.time_scratch_in, &mut new_spectrum)
            .expect("partitioned convolver: frame size mismatch");

        self.fdl.pop_back();
        self.fdl.push_front(new_spectrum);

        self.freq_accum.fill(Complex32::new(0.0, 0.0));
        let usable_partitions = ir.num_partitions().min(self.num_partitions);
        for (p, spectrum) in self.fdl.iter().take(usable_partitions).enumerate() {
            let ir_partition = ir.partition(p);
            for (acc, (&s, &h)) in self
                .freq_accum
                .iter_mut()
                .zip(spectrum.iter().zip(ir_partition.iter()))
            {
                *acc += s * h;
            }
        }

        self.plan
            .inverse
            .process(&mut self.freq_accum, &mut self.time_scratch_out)
            .expect("partitioned convolver: inverse FFT shape mismatch");

        // IFFT of an unnormalized real-FFT pair must be scaled by 1/fft_size.
        let fft_size = frame_size * 2;
        let norm = 1.0 / fft_size as f32;

        for i in 0..frame_size {
            output[i] = self.time_scratch_out[i] * norm + self.overlap[i];
        }
        for i in 0..frame_size {
            self.overlap[i] = self.time_scratch_out[frame_size + i] * norm;
        }

        self.frames_since_nonzero_input <= self.num_partitions
    }
}
