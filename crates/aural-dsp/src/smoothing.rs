//! Per-frame parameter ramping.
//!
//! The direct-path and path effects (C7/C8) must never step a gain
//! discontinuously within a frame: every parameter change ramps linearly
//! from the value applied to the previous frame to the newly requested
//! target, over the samples of the current frame.

/// A single ramped scalar parameter.
#[derive(Debug, Clone, Copy)]
pub struct LinearRamp {
    current: f32,
    target: f32,
}

impl LinearRamp {
    pub fn new(initial: f32) -> Self {
        Self { current: initial, target: initial }
    }

    pub fn set_target(&mut self, target: f32) {
        self.target = target;
    }

    pub fn current(&self) -> f32 {
        self.current
    }

    /// Fills `out` with `frame_len` linearly-interpolated values from the
    /// last applied value to the current target, and commits the target as
    /// the new current value for the next frame's ramp.
    pub fn ramp_into(&mut self, frame_len: usize, out: &mut [f32]) {
        let start = self.current;
        let end = self.target;
        if frame_len == 0 {
            self.current = end;
            return;
        }
        let step = (end - start) / frame_len as f32;
        for (i, o) in out.iter_mut().take(frame_len).enumerate() {
            *o = start + step * (i as f32 + 1.0);
        }
        self.current = end;
    }

    /// Applies the ramp as a per-sample gain multiply onto `samples`.
    pub fn apply_gain(&mut self, samples: &mut [f32]) {
        let start = self.current;
        let end = self.target;
        let n = samples.len();
        if n == 0 {
            self.current = end;
            return;
        }
        let step = (end - start) / n as f32;
        for (i, s) in samples.iter_mut().enumerate() {
            *s *= start + step * (i as f32 + 1.0);
        }
        self.current = end;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ramp_reaches_target_by_end_of_frame() {
        let mut ramp = LinearRamp::new(0.0);
        ramp.set_target(1.0);
        let mut out = vec![0.0; 8];
        ramp.ramp_into(8, &mut out);
        assert!((out[7] - 1.0).abs() < 1e-6);
        assert!(out[0] > 0.0 && out[0] < out[7]);
    }

    #[test]
    fn ramp_is_monotonic_towards_target() {
        let mut ramp = LinearRamp::new(2.0);
        ramp.set_target(0.0);
        let mut out = vec![0.0; 16];
        ramp.ramp_into(16, &mut out);
        for w in out.windows(2) {
            assert!(w[1] <= w[0] + 1e-6);
        }
    }
}
