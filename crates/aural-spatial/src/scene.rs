//! Scene geometry traits (C10 external interface): `Scene`, `StaticMesh`,
//! `InstancedMesh` as capability sets rather than an inheritance hierarchy,
//! plus `BruteForceScene`, the one concrete, host-independent scene
//! implementation this crate supplies.

use aural_core::Vector3;

use crate::material::Material;

#[derive(Debug, Clone, Copy)]
pub struct Ray {
    pub origin: Vector3,
    pub direction: Vector3,
}

impl Ray {
    pub fn new(origin: Vector3, direction: Vector3) -> Self {
        Self { origin, direction: direction.normalized() }
    }

    pub fn at(&self, t: f32) -> Vector3 {
        self.origin + self.direction * t
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Hit {
    pub distance: f32,
    pub normal: Vector3,
    pub material: Material,
}

/// Capability set for ray queries against scene geometry. `Send + Sync` so a
/// scene may be shared across simulation worker threads.
pub trait Scene: Send + Sync {
    fn closest_hit(&self, ray: &Ray, t_min: f32, t_max: f32) -> Option<Hit>;

    fn any_hit(&self, ray: &Ray, t_min: f32, t_max: f32) -> bool {
        self.closest_hit(ray, t_min, t_max).is_some()
    }

    /// True if a straight segment between `from` and `to` is blocked by
    /// geometry strictly between the two endpoints.
    fn is_occluded(&self, from: Vector3, to: Vector3) -> bool {
        let delta = to - from;
        let distance = delta.length();
        if distance < 1e-6 {
            return false;
        }
        let ray = Ray::new(from, delta);
        self.any_hit(&ray, 1e-4, distance - 1e-3)
    }

    /// Recomputes any acceleration structure after geometry edits. A no-op
    /// for scenes with nothing to rebuild.
    fn commit(&mut self) {}

    /// Monotonically increases whenever meshes or instance transforms
    /// change, so callers can cache derived state.
    fn version(&self) -> u64;
}

/// A static triangle mesh contributed to a scene, in world space.
pub trait StaticMesh: Send + Sync {
    fn num_triangles(&self) -> usize;
    fn triangle(&self, index: usize) -> (Vector3, Vector3, Vector3);
    fn material(&self, triangle_index: usize) -> Material;
}

/// An instanced mesh: geometry defined once, placed multiple times via a
/// per-instance transform. Rays transform into subscene space for
/// intersection; hit distances transform back into world space since both
/// transforms are assumed rigid (rotation + translation, uniform scale).
pub trait InstancedMesh: Send + Sync {
    fn mesh(&self) -> &dyn StaticMesh;
    fn num_instances(&self) -> usize;
    fn instance_transform(&self, index: usize) -> aural_core::Matrix3x3;
    fn instance_translation(&self, index: usize) -> Vector3;
    fn instance_inverse_transform(&self, index: usize) -> aural_core::Matrix3x3;
}

struct Triangle {
    a: Vector3,
    b: Vector3,
    c: Vector3,
    material: Material,
}

/// A flat triangle-soup scene tester: `O(n)` per ray, no acceleration
/// structure. Sufficient for the "empty scene" and small-scene testable
/// properties without depending on an external ray-tracing backend.
pub struct BruteForceScene {
    triangles: Vec<Triangle>,
    version: u64,
}

impl BruteForceScene {
    pub fn new() -> Self {
        Self { triangles: Vec::new(), version: 0 }
    }

    pub fn add_triangle(&mut self, a: Vector3, b: Vector3, c: Vector3, material: Material) {
        self.triangles.push(Triangle { a, b, c, material });
        self.version += 1;
    }

    pub fn num_triangles(&self) -> usize {
        self.triangles.len()
    }
}

impl Default for BruteForceScene {
    fn default() -> Self {
        Self::new()
    }
}

/// Moller-Trumbore ray-triangle intersection.
fn intersect_triangle(ray: &Ray, tri: &Triangle, t_min: f32, t_max: f32) -> Option<(f32, Vector3)> {
    const EPSILON: f32 = 1e-7;
    let edge1 = tri.b - tri.a;
    let edge2 = tri.c - tri.a;
    let pvec = Vector3::cross(ray.direction, edge2);
    let det = Vector3::dot(edge1, pvec);
    if det.abs() < EPSILON {
        return None;
    }
    let inv_det = 1.0 / det;
    let tvec = ray.origin - tri.a;
    let u = Vector3::dot(tvec, pvec) * inv_det;
    if !(0.0..=1.0).contains(&u) {
        return None;
    }
    let qvec = Vector3::cross(tvec, edge1);
    let v = Vector3::dot(ray.direction, qvec) * inv_det;
    if v < 0.0 || u + v > 1.0 {
        return None;
    }
    let t = Vector3::dot(edge2, qvec) * inv_det;
    if t < t_min || t > t_max {
        return None;
    }
    let normal = Vector3::cross(edge1, edge2).normalized();
    Some((t, normal))
}

impl Scene for BruteForceScene {
    fn closest_hit(&self, ray: &Ray, t_min: f32, t_max: f32) -> Option<Hit> {
        let mut best: Option<Hit> = None;
        for tri in &self.triangles {
            if let Some((t, normal)) = intersect_triangle(ray, tri, t_min, t_max) {
                if best.as_ref().map_or(true, |h| t < h.distance) {
                    best = Some(Hit { distance: t, normal, material: tri.material });
                }
            }
        }
        best
    }

    fn any_hit(&self, ray: &Ray, t_min: f32, t_max: f32) -> bool {
        self.triangles.iter().any(|tri| intersect_triangle(ray, tri, t_min, t_max).is_some())
    }

    fn version(&self) -> u64 {
        self.version
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_scene_never_reports_a_hit() {
        let scene = BruteForceScene::new();
        let ray = Ray::new(Vector3::ZERO, Vector3::new(0.0, 0.0, -1.0));
        assert!(scene.closest_hit(&ray, 0.0, 1000.0).is_none());
        assert!(!scene.any_hit(&ray, 0.0, 1000.0));
        assert!(!scene.is_occluded(Vector3::ZERO, Vector3::new(0.0, 0.0, -10.0)));
    }

    #[test]
    fn ray_hits_triangle_facing_it() {
        let mut scene = BruteForceScene::new();
        scene.add_triangle(
            Vector3::new(-1.0, -1.0, -5.0),
            Vector3::new(1.0, -1.0, -5.0),
            Vector3::new(0.0, 1.0, -5.0),
            Material::concrete(),
        );
        let ray = Ray::new(Vector3::ZERO, Vector3::new(0.0, 0.0, -1.0));
        let hit = scene.closest_hit(&ray, 0.0, 1000.0);
        assert!(hit.is_some());
        assert!((hit.unwrap().distance - 5.0).abs() < 1e-3);
    }

    #[test]
    fn occlusion_test_detects_blocking_geometry() {
        let mut scene = BruteForceScene::new();
        scene.add_triangle(
            Vector3::new(-1.0, -1.0, -5.0),
            Vector3::new(1.0, -1.0, -5.0),
            Vector3::new(0.0, 1.0, -5.0),
            Material::concrete(),
        );
        assert!(scene.is_occluded(Vector3::ZERO, Vector3::new(0.0, 0.0, -10.0)));
        assert!(!scene.is_occluded(Vector3::ZERO, Vector3::new(0.0, 0.0, -2.0)));
    }

    #[test]
    fn adding_geometry_bumps_version() {
        let mut scene = BruteForceScene::new();
        let before = scene.version();
        scene.add_triangle(Vector3::ZERO, Vector3::new(1.0, 0.0, 0.0), Vector3::new(0.0, 1.0, 0.0), Material::wood());
        assert!(scene.version() > before);
    }
}
