//! Deinterleaved multichannel audio buffers and the array-math contract
//! (C2) that every DSP effect in this engine is built on.

use wide::f32x8;

/// A deinterleaved multichannel block of audio: `numChannels × numSamples`.
///
/// Owned and reused across callbacks by whichever effect or orchestrator
/// holds it; effects never resize a buffer they did not allocate themselves.
#[derive(Debug, Clone)]
pub struct AudioBuffer {
    channels: Vec<Vec<f32>>,
}

impl AudioBuffer {
    pub fn new(num_channels: usize, num_samples: usize) -> Self {
        Self {
            channels: vec![vec![0.0f32; num_samples]; num_channels],
        }
    }

    pub fn from_channels(channels: Vec<Vec<f32>>) -> Self {
        Self { channels }
    }

    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }

    pub fn num_samples(&self) -> usize {
        self.channels.first().map_or(0, |c| c.len())
    }

    pub fn channel(&self, index: usize) -> &[f32] {
        &self.channels[index]
    }

    pub fn channel_mut(&mut self, index: usize) -> &mut [f32] {
        &mut self.channels[index]
    }

    pub fn channels(&self) -> &[Vec<f32>] {
        &self.channels
    }

    pub fn channels_mut(&mut self) -> &mut [Vec<f32>] {
        &mut self.channels
    }

    /// Sets every sample in every channel to zero.
    pub fn silence(&mut self) {
        for ch in &mut self.channels {
            silence(ch);
        }
    }
}

/// Sets `dst` to all zeros.
pub fn silence(dst: &mut [f32]) {
    dst.fill(0.0);
}

/// `dst[i] = src[i] * k` for all i.
pub fn scale(src: &[f32], k: f32, dst: &mut [f32]) {
    let n = src.len().min(dst.len());
    let lanes = n / 8;
    let kv = f32x8::splat(k);
    for lane in 0..lanes {
        let i = lane * 8;
        let s = f32x8::from(<[f32; 8]>::try_from(&src[i..i + 8]).unwrap());
        let out = s * kv;
        dst[i..i + 8].copy_from_slice(&out.to_array());
    }
    for i in (lanes * 8)..n {
        dst[i] = src[i] * k;
    }
}

/// `dst[i] += k * src[i]` for all i.
pub fn scale_accumulate(src: &[f32], k: f32, dst: &mut [f32]) {
    let n = src.len().min(dst.len());
    let lanes = n / 8;
    let kv = f32x8::splat(k);
    for lane in 0..lanes {
        let i = lane * 8;
        let s = f32x8::from(<[f32; 8]>::try_from(&src[i..i + 8]).unwrap());
        let d = f32x8::from(<[f32; 8]>::try_from(&dst[i..i + 8]).unwrap());
        let out = d + s * kv;
        dst[i..i + 8].copy_from_slice(&out.to_array());
    }
    for i in (lanes * 8)..n {
        dst[i] += src[i] * k;
    }
}

/// `dst[i] += src[i]` over `min(numChannels)` channels of each buffer.
pub fn mix(src: &AudioBuffer, dst: &mut AudioBuffer) {
    let n = src.num_channels().min(dst.num_channels());
    for ch in 0..n {
        let src_ch = src.channel(ch);
        let dst_ch = dst.channel_mut(ch);
        let len = src_ch.len().min(dst_ch.len());
        for i in 0..len {
            dst_ch[i] += src_ch[i];
        }
    }
}

/// Averages all input channels down to a single mono channel.
pub fn downmix(src: &AudioBuffer, dst: &mut [f32]) {
    let num_channels = src.num_channels().max(1) as f32;
    silence(dst);
    for ch in src.channels() {
        let len = ch.len().min(dst.len());
        for i in 0..len {
            dst[i] += ch[i];
        }
    }
    scale(&dst.to_vec(), 1.0 / num_channels, dst);
}

/// Converts a deinterleaved buffer into packed (interleaved) samples.
pub fn interleave(src: &AudioBuffer, dst: &mut [f32]) {
    let num_channels = src.num_channels();
    let num_samples = src.num_samples();
    for s in 0..num_samples {
        for ch in 0..num_channels {
            let idx = s * num_channels + ch;
            if idx < dst.len() {
                dst[idx] = src.channel(ch)[s];
            }
        }
    }
}

/// Converts packed (interleaved) samples into a deinterleaved buffer.
pub fn deinterleave(src: &[f32], dst: &mut AudioBuffer) {
    let num_channels = dst.num_channels();
    let num_samples = dst.num_samples();
    for s in 0..num_samples {
        for ch in 0..num_channels {
            let idx = s * num_channels + ch;
            dst.channel_mut(ch)[s] = if idx < src.len() { src[idx] } else { 0.0 };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mix_with_zero_is_identity() {
        let mut a = AudioBuffer::from_channels(vec![vec![1.0, 2.0, 3.0]]);
        let zero = AudioBuffer::new(1, 3);
        mix(&zero, &mut a);
        assert_eq!(a.channel(0), &[1.0, 2.0, 3.0]);
    }

    #[test]
    fn scale_by_one_is_identity() {
        let src = vec![1.0, -2.0, 3.5, 0.0, 4.0, 9.0, -1.0, 2.0, 7.0];
        let mut dst = vec![0.0; src.len()];
        scale(&src, 1.0, &mut dst);
        assert_eq!(dst, src);
    }

    #[test]
    fn scale_accumulate_zero_is_identity_on_dst() {
        let src = vec![5.0, 6.0, 7.0, 8.0, 9.0, 10.0, 11.0, 12.0, 13.0];
        let mut dst = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0];
        let expected = dst.clone();
        scale_accumulate(&src, 0.0, &mut dst);
        assert_eq!(dst, expected);
    }

    #[test]
    fn downmix_averages_channels() {
        let src = AudioBuffer::from_channels(vec![vec![1.0, 1.0], vec![3.0, -1.0]]);
        let mut dst = vec![0.0; 2];
        downmix(&src, &mut dst);
        assert!((dst[0] - 2.0).abs() < 1e-6);
        assert!((dst[1] - 0.0).abs() < 1e-6);
    }

    #[test]
    fn interleave_deinterleave_round_trip() {
        let src = AudioBuffer::from_channels(vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]]);
        let mut packed = vec![0.0; 6];
        interleave(&src, &mut packed);
        assert_eq!(packed, vec![1.0, 4.0, 2.0, 5.0, 3.0, 6.0]);

        let mut back = AudioBuffer::new(2, 3);
        deinterleave(&packed, &mut back);
        assert_eq!(back.channel(0), src.channel(0));
        assert_eq!(back.channel(1), src.channel(1));
    }
}
