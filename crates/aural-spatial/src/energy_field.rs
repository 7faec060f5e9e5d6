//! `EnergyField` (C10 data model) and the `Persistable` serialization
//! contract shared with the probe visibility graph (C12).

use crate::error::{SpatialError, SpatialResult};

/// Fixed bin duration: 10 ms.
pub const BIN_DURATION_SECONDS: f32 = 0.010;

/// Fixed number of reflection bands (shared with the direct-path/path-effect
/// EQ bands).
pub const NUM_BANDS: usize = 3;

const FORMAT_VERSION: u32 = 1;

/// `numChannels (SH coeffs) x numBands (3) x numBins` float32 histogram.
/// Always non-negative; additive across sources/threads.
#[derive(Debug, Clone, PartialEq)]
pub struct EnergyField {
    num_channels: usize,
    num_bins: usize,
    data: Vec<f32>,
}

impl EnergyField {
    pub fn new(num_channels: usize, duration_seconds: f32) -> Self {
        let num_bins = (duration_seconds / BIN_DURATION_SECONDS).ceil().max(1.0) as usize;
        Self { num_channels, num_bins, data: vec![0.0; num_channels * NUM_BANDS * num_bins] }
    }

    pub fn num_channels(&self) -> usize {
        self.num_channels
    }

    pub fn num_bins(&self) -> usize {
        self.num_bins
    }

    fn index(&self, channel: usize, band: usize, bin: usize) -> usize {
        (channel * NUM_BANDS + band) * self.num_bins + bin
    }

    pub fn get(&self, channel: usize, band: usize, bin: usize) -> f32 {
        self.data[self.index(channel, band, bin)]
    }

    /// Adds non-negative `energy` into a bin, clamped into range rather than
    /// panicking on an out-of-bounds bin index (callers derive `bin` from a
    /// cumulative-time computation that is clamped separately, but this
    /// keeps the type's own invariant -- always non-negative, always
    /// in-bounds -- self-enforced).
    pub fn add(&mut self, channel: usize, band: usize, bin: usize, energy: f32) {
        let bin = bin.min(self.num_bins - 1);
        let idx = self.index(channel, band, bin);
        self.data[idx] += energy.max(0.0);
    }

    /// Element-wise accumulation of another field with identical dimensions,
    /// used to reduce per-thread scratch fields into the final output.
    pub fn accumulate(&mut self, other: &EnergyField) {
        debug_assert_eq!(self.num_channels, other.num_channels);
        debug_assert_eq!(self.num_bins, other.num_bins);
        for (dst, src) in self.data.iter_mut().zip(other.data.iter()) {
            *dst += src;
        }
    }

    /// Sum of all energy in band `b` across every bin and channel.
    pub fn total_band_energy(&self, band: usize) -> f32 {
        let mut total = 0.0;
        for channel in 0..self.num_channels {
            for bin in 0..self.num_bins {
                total += self.get(channel, band, bin);
            }
        }
        total
    }

    pub fn is_zero(&self) -> bool {
        self.data.iter().all(|&v| v == 0.0)
    }
}

/// Serialization contract for the entities this crate owns end-to-end
/// (`EnergyField`, `ProbeVisibilityGraph`); `Scene`/`StaticMesh`
/// serialization is the external collaborator's responsibility.
pub trait Persistable: Sized {
    fn serialized_size(&self) -> u64;
    fn serialize(&self, out: &mut Vec<u8>);
    fn deserialize(data: &[u8]) -> SpatialResult<Self>;
}

impl Persistable for EnergyField {
    fn serialized_size(&self) -> u64 {
        (4 + 8 + 8 + self.data.len() * 4) as u64
    }

    fn serialize(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        out.extend_from_slice(&(self.num_channels as u64).to_le_bytes());
        out.extend_from_slice(&(self.num_bins as u64).to_le_bytes());
        for &sample in &self.data {
            out.extend_from_slice(&sample.to_le_bytes());
        }
    }

    fn deserialize(data: &[u8]) -> SpatialResult<Self> {
        if data.len() < 20 {
            return Err(SpatialError::Deserialize("energy field header truncated".into()));
        }
        let version = u32::from_le_bytes(data[0..4].try_into().unwrap());
        if version != FORMAT_VERSION {
            return Err(SpatialError::Deserialize(format!("unsupported energy field version {version}")));
        }
        let num_channels = u64::from_le_bytes(data[4..12].try_into().unwrap()) as usize;
        let num_bins = u64::from_le_bytes(data[12..20].try_into().unwrap()) as usize;
        let expected_len = 20 + num_channels * NUM_BANDS * num_bins * 4;
        if data.len() != expected_len {
            return Err(SpatialError::Deserialize(format!(
                "energy field payload length mismatch: expected {expected_len}, got {}",
                data.len()
            )));
        }
        let mut field = EnergyField { num_channels, num_bins, data: vec![0.0; num_channels * NUM_BANDS * num_bins] };
        for (i, chunk) in data[20..].chunks_exact(4).enumerate() {
            field.data[i] = f32::from_le_bytes(chunk.try_into().unwrap());
        }
        Ok(field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_field_is_all_zero() {
        let field = EnergyField::new(4, 1.0);
        assert!(field.is_zero());
        assert_eq!(field.num_bins(), 100);
    }

    #[test]
    fn add_is_additive_and_never_negative() {
        let mut field = EnergyField::new(1, 0.1);
        field.add(0, 0, 0, 2.0);
        field.add(0, 0, 0, 3.0);
        field.add(0, 0, 0, -5.0);
        assert_eq!(field.get(0, 0, 0), 5.0);
    }

    #[test]
    fn accumulate_sums_matching_fields() {
        let mut a = EnergyField::new(2, 0.1);
        let mut b = EnergyField::new(2, 0.1);
        a.add(1, 2, 3, 4.0);
        b.add(1, 2, 3, 6.0);
        a.accumulate(&b);
        assert_eq!(a.get(1, 2, 3), 10.0);
    }

    #[test]
    fn serialize_deserialize_round_trip() {
        let mut field = EnergyField::new(4, 0.5);
        field.add(2, 1, 3, 7.5);
        let mut bytes = Vec::new();
        field.serialize(&mut bytes);
        assert_eq!(bytes.len() as u64, field.serialized_size());
        let back = EnergyField::deserialize(&bytes).unwrap();
        assert_eq!(back, field);
    }

    #[test]
    fn deserialize_rejects_truncated_payload() {
        let field = EnergyField::new(1, 0.1);
        let mut bytes = Vec::new();
        field.serialize(&mut bytes);
        bytes.truncate(bytes.len() - 4);
        assert!(EnergyField::deserialize(&bytes).is_err());
    }
}
