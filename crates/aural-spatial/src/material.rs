//! Acoustic material model shared by the scene traits and the reflection
//! simulator (C10): per-band absorption plus a scattering coefficient.

/// Absorption for the engine's 3 reflection bands (matching
/// [`aural_dsp::BAND_CENTERS_HZ`]) and a scattering coefficient in `[0,1]`
/// (0 = fully specular, 1 = fully diffuse/Lambertian).
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Material {
    absorption: [f32; 3],
    scattering: f32,
}

/// Reduces a 6 octave-band absorption table (125/250/500/1000/2000/4000 Hz)
/// onto this crate's 3 reflection bands by averaging adjacent pairs:
/// (125,250) -> low, (500,1000) -> mid, (2000,4000) -> high.
const fn reduce_octaves(octaves: [f32; 6]) -> [f32; 3] {
    [
        (octaves[0] + octaves[1]) * 0.5,
        (octaves[2] + octaves[3]) * 0.5,
        (octaves[4] + octaves[5]) * 0.5,
    ]
}

impl Material {
    pub const fn custom(absorption: [f32; 3], scattering: f32) -> Self {
        Self { absorption, scattering }
    }

    pub fn concrete() -> Self {
        Self { absorption: reduce_octaves([0.01, 0.01, 0.02, 0.02, 0.02, 0.03]), scattering: 0.05 }
    }

    pub fn drywall() -> Self {
        Self { absorption: reduce_octaves([0.29, 0.10, 0.05, 0.04, 0.07, 0.09]), scattering: 0.1 }
    }

    pub fn glass() -> Self {
        Self { absorption: reduce_octaves([0.35, 0.25, 0.18, 0.12, 0.07, 0.04]), scattering: 0.02 }
    }

    pub fn wood() -> Self {
        Self { absorption: reduce_octaves([0.42, 0.21, 0.10, 0.08, 0.06, 0.06]), scattering: 0.15 }
    }

    pub fn carpet() -> Self {
        Self { absorption: reduce_octaves([0.02, 0.06, 0.14, 0.37, 0.60, 0.65]), scattering: 0.6 }
    }

    pub fn foam() -> Self {
        Self { absorption: reduce_octaves([0.35, 0.51, 0.82, 0.98, 0.99, 0.99]), scattering: 0.9 }
    }

    pub fn absorption(&self) -> [f32; 3] {
        self.absorption
    }

    pub fn scattering(&self) -> f32 {
        self.scattering.clamp(0.0, 1.0)
    }

    /// Per-band throughput multiplier after one bounce off this material.
    pub fn reflectance(&self) -> [f32; 3] {
        self.absorption.map(|a| 1.0 - a.clamp(0.0, 1.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concrete_reflects_more_than_carpet() {
        let concrete_avg: f32 = Material::concrete().reflectance().iter().sum();
        let carpet_avg: f32 = Material::carpet().reflectance().iter().sum();
        assert!(concrete_avg > carpet_avg);
    }

    #[test]
    fn custom_material_round_trips_fields() {
        let m = Material::custom([0.1, 0.2, 0.3], 0.4);
        assert_eq!(m.absorption(), [0.1, 0.2, 0.3]);
        assert_eq!(m.scattering(), 0.4);
    }
}
