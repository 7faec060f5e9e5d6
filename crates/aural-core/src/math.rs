//! Fixed-size math: 3-D vectors, 3x3 matrices, polar conversions, and the
//! engine's right-handed coordinate space.

use std::ops::{Add, Mul, Sub};

/// A 3-D vector of `f32`s.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Vector3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vector3 {
    pub const ZERO: Vector3 = Vector3 { x: 0.0, y: 0.0, z: 0.0 };

    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn dot(a: Vector3, b: Vector3) -> f32 {
        a.x * b.x + a.y * b.y + a.z * b.z
    }

    pub fn cross(a: Vector3, b: Vector3) -> Vector3 {
        Vector3::new(
            a.y * b.z - a.z * b.y,
            a.z * b.x - a.x * b.z,
            a.x * b.y - a.y * b.x,
        )
    }

    pub fn length(self) -> f32 {
        Vector3::dot(self, self).sqrt()
    }

    /// Returns a unit vector in the same direction. Degenerate (near-zero
    /// length) inputs return the zero vector rather than NaN.
    pub fn normalized(self) -> Vector3 {
        let len = self.length();
        if len < 1e-9 {
            Vector3::ZERO
        } else {
            self * (1.0 / len)
        }
    }

    /// Converts to spherical coordinates `(azimuth, elevation)` in radians,
    /// azimuth measured from +x towards +y (engine's right-handed convention
    /// before any library-frame conversion), elevation from the x-y plane.
    pub fn to_polar(self) -> (f32, f32) {
        let azimuth = self.y.atan2(self.x);
        let elevation = self.z.atan2((self.x * self.x + self.y * self.y).sqrt());
        (azimuth, elevation)
    }

    pub fn from_polar(azimuth: f32, elevation: f32) -> Vector3 {
        let (sa, ca) = azimuth.sin_cos();
        let (se, ce) = elevation.sin_cos();
        Vector3::new(ca * ce, sa * ce, se)
    }
}

impl Add for Vector3 {
    type Output = Vector3;
    fn add(self, rhs: Vector3) -> Vector3 {
        Vector3::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Vector3 {
    type Output = Vector3;
    fn sub(self, rhs: Vector3) -> Vector3 {
        Vector3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f32> for Vector3 {
    type Output = Vector3;
    fn mul(self, rhs: f32) -> Vector3 {
        Vector3::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

/// A row-major 3x3 matrix.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix3x3 {
    pub rows: [[f32; 3]; 3],
}

impl Matrix3x3 {
    pub const IDENTITY: Matrix3x3 = Matrix3x3 {
        rows: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
    };

    pub fn from_rows(r0: Vector3, r1: Vector3, r2: Vector3) -> Self {
        Self {
            rows: [[r0.x, r0.y, r0.z], [r1.x, r1.y, r1.z], [r2.x, r2.y, r2.z]],
        }
    }

    pub fn transform(&self, v: Vector3) -> Vector3 {
        Vector3::new(
            self.rows[0][0] * v.x + self.rows[0][1] * v.y + self.rows[0][2] * v.z,
            self.rows[1][0] * v.x + self.rows[1][1] * v.y + self.rows[1][2] * v.z,
            self.rows[2][0] * v.x + self.rows[2][1] * v.y + self.rows[2][2] * v.z,
        )
    }
}

/// A right-handed 3-D coordinate space: `right = cross(ahead, up)`, `ahead`
/// is local -z. Mirrors the engine's listener/source orientation convention.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoordinateSpace3 {
    pub right: Vector3,
    pub up: Vector3,
    pub ahead: Vector3,
    pub origin: Vector3,
}

impl CoordinateSpace3 {
    /// Canonical space: right = +x, up = +y, ahead = -z, origin at `origin`.
    pub fn canonical(origin: Vector3) -> Self {
        Self {
            right: Vector3::new(1.0, 0.0, 0.0),
            up: Vector3::new(0.0, 1.0, 0.0),
            ahead: Vector3::new(0.0, 0.0, -1.0),
            origin,
        }
    }

    /// Builds a space from two (expected mutually perpendicular) vectors.
    /// `right` is derived as `cross(ahead, up)`.
    pub fn from_ahead_up(ahead: Vector3, up: Vector3, origin: Vector3) -> Self {
        Self {
            right: Vector3::cross(ahead, up),
            up,
            ahead,
            origin,
        }
    }

    /// Builds an orthonormal frame from a single `ahead` vector. A lone
    /// vector does not uniquely define a frame, so this uses the
    /// Hughes-Moller heuristic to pick a stable `right`/`up` pair that avoids
    /// the degenerate case where `ahead` is parallel to an arbitrarily-chosen
    /// "up".
    pub fn from_ahead(ahead: Vector3, origin: Vector3) -> Self {
        let right = if ahead.x.abs() > ahead.z.abs() {
            Vector3::new(-ahead.y, ahead.x, 0.0).normalized()
        } else {
            Vector3::new(0.0, -ahead.z, ahead.y).normalized()
        };
        let up = Vector3::cross(right, ahead);
        Self { right, up, ahead, origin }
    }

    /// The 3x3 matrix transforming world-space directions into this frame:
    /// rows are `{right, up, -ahead}`.
    pub fn to_rotation_matrix(&self) -> Matrix3x3 {
        Matrix3x3::from_rows(self.right, self.up, self.ahead * -1.0)
    }

    pub fn world_to_local(&self, direction: Vector3) -> Vector3 {
        Vector3::new(
            Vector3::dot(direction, self.right),
            Vector3::dot(direction, self.up),
            -Vector3::dot(direction, self.ahead),
        )
    }

    pub fn local_to_world(&self, direction: Vector3) -> Vector3 {
        self.right * direction.x + self.up * direction.y - self.ahead * direction.z
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_is_orthonormal() {
        let space = CoordinateSpace3::canonical(Vector3::ZERO);
        assert!((Vector3::dot(space.right, space.up)).abs() < 1e-6);
        assert!((Vector3::dot(space.right, space.ahead)).abs() < 1e-6);
        assert!((Vector3::dot(space.up, space.ahead)).abs() < 1e-6);
    }

    #[test]
    fn from_ahead_up_right_is_cross_product() {
        let ahead = Vector3::new(0.0, 0.0, -1.0);
        let up = Vector3::new(0.0, 1.0, 0.0);
        let space = CoordinateSpace3::from_ahead_up(ahead, up, Vector3::ZERO);
        assert_eq!(space.right, Vector3::cross(ahead, up));
    }

    #[test]
    fn from_ahead_handles_parallel_up_degenerate_case() {
        // ahead parallel to the canonical up: exercises the Hughes-Moller
        // branch rather than dividing by a near-zero cross product.
        let ahead = Vector3::new(0.0, 1.0, 0.0);
        let space = CoordinateSpace3::from_ahead(ahead, Vector3::ZERO);
        assert!((space.right.length() - 1.0).abs() < 1e-5);
        assert!((space.up.length() - 1.0).abs() < 1e-5);
        assert!(Vector3::dot(space.right, space.up).abs() < 1e-5);
        assert!(Vector3::dot(space.right, space.ahead).abs() < 1e-5);
    }

    #[test]
    fn polar_round_trip() {
        let v = Vector3::new(0.3, 0.5, 0.2).normalized();
        let (az, el) = v.to_polar();
        let back = Vector3::from_polar(az, el);
        assert!((back.x - v.x).abs() < 1e-5);
        assert!((back.y - v.y).abs() < 1e-5);
        assert!((back.z - v.z).abs() < 1e-5);
    }
}
