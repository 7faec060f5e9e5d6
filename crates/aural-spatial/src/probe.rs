//! Probe visibility (C12): mutual-visibility testing between probes and the
//! graph of visibility edges built from it, used by pathing to decide which
//! probes a source/listener can route through.

use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

use aural_core::Vector3;

use crate::energy_field::Persistable;
use crate::error::{SpatialError, SpatialResult};
use crate::scene::Scene;

const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy)]
pub struct Probe {
    pub position: Vector3,
    pub radius: f32,
}

/// Decides mutual visibility between two probes: a plain point-to-point
/// occlusion test when either probe has no volume (`radius <= 0`) or only a
/// single sample is requested, otherwise an O(numSamples^2) volumetric test
/// with early-exit once the unoccluded fraction clears `threshold`.
pub struct ProbeVisibilityTester {
    pub num_samples: usize,
    pub unoccluded_fraction_threshold: f32,
}

impl ProbeVisibilityTester {
    pub fn new(num_samples: usize, unoccluded_fraction_threshold: f32) -> Self {
        Self { num_samples, unoccluded_fraction_threshold }
    }

    pub fn is_visible(&self, scene: &dyn Scene, a: &Probe, b: &Probe, rng: &mut ChaCha8Rng) -> bool {
        if self.num_samples <= 1 || (a.radius <= 0.0 && b.radius <= 0.0) {
            return !scene.is_occluded(a.position, b.position);
        }

        let points_a = sample_sphere_points(a, self.num_samples, rng);
        let points_b = sample_sphere_points(b, self.num_samples, rng);
        let total = points_a.len() * points_b.len();
        if total == 0 {
            return !scene.is_occluded(a.position, b.position);
        }

        let mut unoccluded = 0usize;
        let mut tested = 0usize;
        'outer: for &pa in &points_a {
            for &pb in &points_b {
                tested += 1;
                if !scene.is_occluded(pa, pb) {
                    unoccluded += 1;
                }
                if unoccluded as f32 / total as f32 >= self.unoccluded_fraction_threshold {
                    break 'outer;
                }
            }
        }
        if tested == 0 {
            return false;
        }
        unoccluded as f32 / tested as f32 >= self.unoccluded_fraction_threshold
    }
}

fn sample_sphere_points(probe: &Probe, num_samples: usize, rng: &mut ChaCha8Rng) -> Vec<Vector3> {
    if probe.radius <= 0.0 {
        return vec![probe.position];
    }
    (0..num_samples)
        .map(|_| {
            let dir = Vector3::new(
                rng.random::<f32>() * 2.0 - 1.0,
                rng.random::<f32>() * 2.0 - 1.0,
                rng.random::<f32>() * 2.0 - 1.0,
            )
            .normalized();
            let r = probe.radius * rng.random::<f32>().cbrt();
            probe.position + dir * r
        })
        .collect()
}

/// Anisotropic visibility range: `vertical_scale` < 1 ignores (compresses)
/// the vertical component of the separation vector before comparing against
/// `horizontal`, so a tall/flat visibility volume can be expressed without a
/// full ellipsoid model.
#[derive(Debug, Clone, Copy)]
pub struct VisibilityRange {
    pub horizontal: f32,
    pub vertical_scale: f32,
}

impl VisibilityRange {
    pub fn isotropic(range: f32) -> Self {
        Self { horizontal: range, vertical_scale: 1.0 }
    }

    fn within(&self, delta: Vector3) -> bool {
        let scaled = Vector3::new(delta.x, delta.y * self.vertical_scale, delta.z);
        scaled.length() <= self.horizontal
    }
}

/// Mutual-visibility graph over a fixed set of probes. Adjacency is a
/// `Vec<Vec<u32>>`, sorted per row, so iteration and serialization order are
/// reproducible given identical inputs.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeVisibilityGraph {
    num_probes: usize,
    adjacency: Vec<Vec<u32>>,
}

impl ProbeVisibilityGraph {
    pub fn build(
        scene: &dyn Scene,
        probes: &[Probe],
        range: VisibilityRange,
        tester: &ProbeVisibilityTester,
        seed: u64,
    ) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let num_probes = probes.len();
        let mut adjacency = vec![Vec::new(); num_probes];

        for i in 0..num_probes {
            for j in (i + 1)..num_probes {
                let delta = probes[j].position - probes[i].position;
                if !range.within(delta) {
                    continue;
                }
                if tester.is_visible(scene, &probes[i], &probes[j], &mut rng) {
                    adjacency[i].push(j as u32);
                    adjacency[j].push(i as u32);
                }
            }
        }
        for row in &mut adjacency {
            row.sort_unstable();
        }
        Self { num_probes, adjacency }
    }

    pub fn num_probes(&self) -> usize {
        self.num_probes
    }

    pub fn neighbors(&self, probe: usize) -> &[u32] {
        &self.adjacency[probe]
    }

    pub fn is_connected(&self, a: usize, b: usize) -> bool {
        self.adjacency[a].binary_search(&(b as u32)).is_ok()
    }

    /// Removes every edge whose endpoints' separation exceeds `range`,
    /// reusing the probe positions passed in (the graph itself stores no
    /// positions).
    pub fn prune(&mut self, probes: &[Probe], range: VisibilityRange) {
        for (i, row) in self.adjacency.iter_mut().enumerate() {
            row.retain(|&j| range.within(probes[j as usize].position - probes[i].position));
        }
    }
}

impl Persistable for ProbeVisibilityGraph {
    fn serialized_size(&self) -> u64 {
        let edges: usize = self.adjacency.iter().map(Vec::len).sum();
        (4 + 8 + self.num_probes * 4 + edges * 4) as u64
    }

    fn serialize(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        out.extend_from_slice(&(self.num_probes as u64).to_le_bytes());
        for row in &self.adjacency {
            out.extend_from_slice(&(row.len() as u32).to_le_bytes());
            for &neighbor in row {
                out.extend_from_slice(&neighbor.to_le_bytes());
            }
        }
    }

    fn deserialize(data: &[u8]) -> SpatialResult<Self> {
        if data.len() < 12 {
            return Err(SpatialError::Deserialize("visibility graph header truncated".into()));
        }
        let version = u32::from_le_bytes(data[0..4].try_into().unwrap());
        if version != FORMAT_VERSION {
            return Err(SpatialError::Deserialize(format!("unsupported visibility graph version {version}")));
        }
        let num_probes = u64::from_le_bytes(data[4..12].try_into().unwrap()) as usize;
        let mut adjacency = Vec::with_capacity(num_probes);
        let mut cursor = 12usize;
        for _ in 0..num_probes {
            if cursor + 4 > data.len() {
                return Err(SpatialError::Deserialize("visibility graph row header truncated".into()));
            }
            let row_len = u32::from_le_bytes(data[cursor..cursor + 4].try_into().unwrap()) as usize;
            cursor += 4;
            let row_bytes = row_len * 4;
            if cursor + row_bytes > data.len() {
                return Err(SpatialError::Deserialize("visibility graph row body truncated".into()));
            }
            let row = data[cursor..cursor + row_bytes]
                .chunks_exact(4)
                .map(|c| u32::from_le_bytes(c.try_into().unwrap()))
                .collect();
            adjacency.push(row);
            cursor += row_bytes;
        }
        if cursor != data.len() {
            return Err(SpatialError::Deserialize("visibility graph trailing bytes".into()));
        }
        Ok(Self { num_probes, adjacency })
    }
}
