//! Real spherical harmonics (C3): evaluation, projection, and the
//! Ivanic-Ruedenberg rotation recurrence.
//!
//! All directions passed to this module are in the engine's right-handed
//! convention (`right = +x, up = +y, ahead = -z`, see [`aural_core::math`]);
//! `evaluate`/`project_single_point` convert internally to the conventional
//! SH basis frame (`+x forward, +y left, +z up`) before evaluating basis
//! functions.

use aural_core::Vector3;

/// Number of SH coefficients for a given Ambisonic order: `(order+1)^2`.
pub const fn num_coeffs(order: usize) -> usize {
    (order + 1) * (order + 1)
}

/// Flattened index for band `l`, degree `m`: `l*(l+1)+m`.
pub const fn flat_index(l: i32, m: i32) -> usize {
    (l * (l + 1) + m) as usize
}

/// Legendre polynomial `P_n(x)` by upward recurrence.
pub fn legendre(n: u32, x: f32) -> f32 {
    if n == 0 {
        return 1.0;
    }
    if n == 1 {
        return x;
    }
    let mut p0 = 1.0f32;
    let mut p1 = x;
    for k in 1..n {
        let p2 = ((2 * k + 1) as f32 * x * p1 - k as f32 * p0) / (k + 1) as f32;
        p0 = p1;
        p1 = p2;
    }
    p1
}

/// Converts an engine-convention direction to the library's SH convention:
/// `x_lib = -z_engine` (forward), `y_lib = -x_engine` (left), `z_lib = y_engine` (up).
fn to_sh_convention(dir: Vector3) -> Vector3 {
    Vector3::new(-dir.z, -dir.x, dir.y)
}

/// Associated Legendre polynomial `P_l^m(x)` (`m >= 0`), without the
/// Condon-Shortley phase, by the standard three-term recurrence.
fn associated_legendre(l: u32, m: u32, x: f32) -> f32 {
    // P_m^m
    let mut pmm = 1.0f32;
    if m > 0 {
        let somx2 = ((1.0 - x) * (1.0 + x)).max(0.0).sqrt();
        let mut fact = 1.0f32;
        for _ in 0..m {
            pmm *= fact * somx2;
            fact += 2.0;
        }
    }
    if l == m {
        return pmm;
    }
    let pmm1 = x * (2 * m + 1) as f32 * pmm;
    if l == m + 1 {
        return pmm1;
    }
    let mut pll_2 = pmm;
    let mut pll_1 = pmm1;
    let mut pll = 0.0;
    for ll in (m + 2)..=l {
        pll = (x * (2 * ll - 1) as f32 * pll_1 - (ll + m - 1) as f32 * pll_2) / (ll - m) as f32;
        pll_2 = pll_1;
        pll_1 = pll;
    }
    pll
}

fn factorial_ratio(l: u32, m: u32) -> f32 {
    // (l-m)! / (l+m)!
    let mut ratio = 1.0f32;
    let (lo, hi) = ((l - m) + 1, l + m);
    for k in lo..=hi {
        ratio /= k as f32;
    }
    ratio
}

/// Hard-coded closed forms for l <= 4, in the Cartesian (x,y,z) SH convention
/// -- the same constants used throughout the ambisonics literature.
fn evaluate_hardcoded(l: u32, m: i32, x: f32, y: f32, z: f32) -> Option<f32> {
    let v = match (l, m) {
        (0, 0) => 0.282095,
        (1, -1) => 0.488603 * y,
        (1, 0) => 0.488603 * z,
        (1, 1) => 0.488603 * x,
        (2, -2) => 1.092548 * x * y,
        (2, -1) => 1.092548 * y * z,
        (2, 0) => 0.315392 * (3.0 * z * z - 1.0),
        (2, 1) => 1.092548 * x * z,
        (2, 2) => 0.546274 * (x * x - y * y),
        (3, -3) => 0.590044 * y * (3.0 * x * x - y * y),
        (3, -2) => 2.890611 * x * y * z,
        (3, -1) => 0.457046 * y * (4.0 * z * z - x * x - y * y),
        (3, 0) => 0.373176 * z * (2.0 * z * z - 3.0 * x * x - 3.0 * y * y),
        (3, 1) => 0.457046 * x * (4.0 * z * z - x * x - y * y),
        (3, 2) => 1.445306 * z * (x * x - y * y),
        (3, 3) => 0.590044 * x * (x * x - 3.0 * y * y),
        (4, -4) => 2.503343 * x * y * (x * x - y * y),
        (4, -3) => 1.770131 * y * z * (3.0 * x * x - y * y),
        (4, -2) => 0.946175 * x * y * (7.0 * z * z - 1.0),
        (4, -1) => 0.669047 * y * z * (7.0 * z * z - 3.0),
        (4, 0) => 0.105786 * (35.0 * z.powi(4) - 30.0 * z * z + 3.0),
        (4, 1) => 0.669047 * x * z * (7.0 * z * z - 3.0),
        (4, 2) => 0.473087 * (x * x - y * y) * (7.0 * z * z - 1.0),
        (4, 3) => 1.770131 * x * z * (x * x - 3.0 * y * y),
        (4, 4) => 0.625836 * (x * x * (x * x - 3.0 * y * y) - y * y * (3.0 * x * x - y * y)),
        _ => return None,
    };
    Some(v)
}

/// Evaluates real SH basis function `(l, m)` at direction `dir` (engine
/// convention). Uses hard-coded closed forms for `l <= 4` and the Legendre
/// recurrence above that.
pub fn evaluate(l: u32, m: i32, dir: Vector3) -> f32 {
    let sh_dir = to_sh_convention(dir).normalized();
    let (x, y, z) = (sh_dir.x, sh_dir.y, sh_dir.z);

    if let Some(v) = evaluate_hardcoded(l, m, x, y, z) {
        return v;
    }

    let theta_cos = z;
    let phi = y.atan2(x);
    let am = m.unsigned_abs();
    let norm = ((2 * l + 1) as f32 / (4.0 * std::f32::consts::PI) * factorial_ratio(l, am)).sqrt();
    let plm = associated_legendre(l, am, theta_cos);

    if m == 0 {
        norm * plm
    } else if m > 0 {
        std::f32::consts::SQRT_2 * norm * plm * (am as f32 * phi).cos()
    } else {
        std::f32::consts::SQRT_2 * norm * plm * (am as f32 * phi).sin()
    }
}

/// Projects a single direction onto the full dense SH coefficient vector for
/// `order`, i.e. `coeffs[flat_index(l,m)] = evaluate(l, m, dir)`.
pub fn project_single_point(dir: Vector3, order: usize) -> Vec<f32> {
    let mut coeffs = vec![0.0f32; num_coeffs(order)];
    for l in 0..=order as u32 {
        for m in -(l as i32)..=(l as i32) {
            coeffs[flat_index(l as i32, m)] = evaluate(l, m, dir);
        }
    }
    coeffs
}

/// A single band's (2l+1)x(2l+1) rotation block, indexed by `(row, col)`
/// each ranging over `-l..=l` via [`Band::get`]/[`Band::set`].
#[derive(Clone)]
struct Band {
    l: i32,
    data: Vec<f32>,
}

impl Band {
    fn zeroed(l: i32) -> Self {
        let dim = (2 * l + 1) as usize;
        Self { l, data: vec![0.0; dim * dim] }
    }

    fn dim(&self) -> usize {
        (2 * self.l + 1) as usize
    }

    fn idx(&self, row: i32, col: i32) -> usize {
        let dim = self.dim() as i32;
        ((row + self.l) * dim + (col + self.l)) as usize
    }

    fn get(&self, row: i32, col: i32) -> f32 {
        if row.abs() > self.l || col.abs() > self.l {
            return 0.0;
        }
        self.data[self.idx(row, col)]
    }

    fn set(&mut self, row: i32, col: i32, v: f32) {
        let i = self.idx(row, col);
        self.data[i] = v;
    }
}

/// A block-diagonal SH rotation matrix built from a listener orientation,
/// one block per band 0..=order. `apply` rotates a dense coefficient vector
/// band-by-band, linear in `num_coeffs(order)`.
pub struct SHRotation {
    order: usize,
    bands: Vec<Band>,
}

impl SHRotation {
    /// Builds the rotation from a right-handed `CoordinateSpace3`'s rotation
    /// matrix (rows `{right, up, -ahead}`).
    pub fn from_frame(order: usize, frame: &aural_core::CoordinateSpace3) -> Self {
        let r = frame.to_rotation_matrix();
        Self::from_matrix_rows(order, r.rows)
    }

    /// `rows`/`cols` are in the engine's (x=right, y=up, z=-ahead) basis.
    fn from_matrix_rows(order: usize, rows: [[f32; 3]; 3]) -> Self {
        let mut bands = Vec::with_capacity(order + 1);
        // Band 0: identity.
        let mut b0 = Band::zeroed(0);
        b0.set(0, 0, 1.0);
        bands.push(b0);

        if order >= 1 {
            // Band 1 operates on (y, z, x) order -- the standard permutation
            // used by the Ivanic-Ruedenberg recurrence, since SH degrees
            // m=-1,0,1 correspond to the engine's y, z, x axes respectively.
            let mut b1 = Band::zeroed(1);
            // rows[i][j] rotates engine-axis j into engine-axis i; remap both
            // axes through the (y,z,x) <-> (0,1,2) permutation.
            let perm = [1usize, 2, 0]; // m=-1 -> y(1), m=0 -> z(2), m=1 -> x(0)
            for (out_m, &out_axis) in perm.iter().enumerate() {
                for (in_m, &in_axis) in perm.iter().enumerate() {
                    b1.set(out_m as i32 - 1, in_m as i32 - 1, rows[out_axis][in_axis]);
                }
            }
            bands.push(b1);
        }

        for l in 2..=(order as i32) {
            let band1 = &bands[1];
            let prev = &bands[(l - 1) as usize];
            let mut band = Band::zeroed(l);
            for m in -l..=l {
                for n in -l..=l {
                    band.set(m, n, compute_band_element(l, m, n, band1, prev));
                }
            }
            bands.push(band);
        }

        Self { order, bands }
    }

    pub fn order(&self) -> usize {
        self.order
    }

    /// Rotates a dense coefficient vector in place (via an internal scratch
    /// copy per band), band-by-band.
    pub fn apply(&self, input: &[f32], output: &mut [f32]) {
        debug_assert!(input.len() >= num_coeffs(self.order));
        debug_assert!(output.len() >= num_coeffs(self.order));
        for band in &self.bands {
            let l = band.l;
            for row in -l..=l {
                let mut acc = 0.0f32;
                for col in -l..=l {
                    acc += band.get(row, col) * input[flat_index(l, col)];
                }
                output[flat_index(l, row)] = acc;
            }
        }
    }
}

fn centered(band1: &Band, i: i32, j: i32) -> f32 {
    band1.get(i, j)
}

fn p_func(i: i32, a: i32, b: i32, l: i32, band1: &Band, prev: &Band) -> f32 {
    if b == -l {
        centered(band1, i, 1) * prev.get(a, -(l - 1)) + centered(band1, i, -1) * prev.get(a, l - 1)
    } else if b == l {
        centered(band1, i, 1) * prev.get(a, l - 1) - centered(band1, i, -1) * prev.get(a, -(l - 1))
    } else {
        centered(band1, i, 0) * prev.get(a, b)
    }
}

fn u_func(l: i32, m: i32, n: i32, band1: &Band, prev: &Band) -> f32 {
    p_func(0, m, n, l, band1, prev)
}

fn v_func(l: i32, m: i32, n: i32, band1: &Band, prev: &Band) -> f32 {
    if m == 0 {
        p_func(1, 1, n, l, band1, prev) + p_func(-1, -1, n, l, band1, prev)
    } else if m > 0 {
        let d = if m == 1 { 1.0 } else { 0.0 };
        p_func(1, m - 1, n, l, band1, prev) * (1.0 + d).sqrt()
            - p_func(-1, -m + 1, n, l, band1, prev) * (1.0 - d)
    } else {
        let d = if m == -1 { 1.0 } else { 0.0 };
        p_func(1, m + 1, n, l, band1, prev) * (1.0 - d)
            + p_func(-1, -m - 1, n, l, band1, prev) * (1.0 + d).sqrt()
    }
}

fn w_func(l: i32, m: i32, n: i32, band1: &Band, prev: &Band) -> f32 {
    if m == 0 {
        0.0
    } else if m > 0 {
        p_func(1, m + 1, n, l, band1, prev) + p_func(-1, -m - 1, n, l, band1, prev)
    } else {
        p_func(1, m - 1, n, l, band1, prev) - p_func(-1, -m + 1, n, l, band1, prev)
    }
}

fn uvw_denominator(l: i32, n: i32) -> f32 {
    if n.abs() == l {
        (2 * l * (2 * l - 1)) as f32
    } else {
        ((l + n) * (l - n)) as f32
    }
}

fn u_coeff(l: i32, m: i32, n: i32) -> f32 {
    (((l + m) * (l - m)) as f32 / uvw_denominator(l, n)).sqrt()
}

fn v_coeff(l: i32, m: i32, n: i32) -> f32 {
    let am = m.abs();
    let denom = uvw_denominator(l, n);
    if m == 0 {
        2.0 * (((l - 1) * l) as f32 / denom).sqrt()
    } else {
        let sign = if m < 0 { -1.0 } else { 1.0 };
        0.5 * sign * (((l + am - 1) * (l + am)) as f32 / denom).sqrt()
    }
}

fn w_coeff(l: i32, m: i32, n: i32) -> f32 {
    let am = m.abs();
    let denom = uvw_denominator(l, n);
    -0.5 * (((l - am - 1) * (l - am)) as f32 / denom).sqrt()
}

/// One entry `M_l(m,n)` of band `l`'s rotation matrix via the
/// Ivanic-Ruedenberg recurrence, built from band 1 and band `l-1`.
fn compute_band_element(l: i32, m: i32, n: i32, band1: &Band, prev: &Band) -> f32 {
    let u = u_coeff(l, m, n);
    let v = v_coeff(l, m, n);
    let w = w_coeff(l, m, n);
    let mut acc = 0.0;
    if u.abs() > 1e-12 {
        acc += u * u_func(l, m, n, band1, prev);
    }
    if v.abs() > 1e-12 {
        acc += v * v_func(l, m, n, band1, prev);
    }
    if w.abs() > 1e-12 {
        acc += w * w_func(l, m, n, band1, prev);
    }
    acc
}

#[cfg(test)]
mod tests {
    use super::*;
    use aural_core::CoordinateSpace3;

    #[test]
    fn num_coeffs_matches_closed_form() {
        for order in 0..8 {
            assert_eq!(num_coeffs(order), (order + 1) * (order + 1));
        }
    }

    #[test]
    fn identity_rotation_is_bit_identical() {
        let order = 3;
        let frame = CoordinateSpace3::canonical(Vector3::ZERO);
        let rotation = SHRotation::from_frame(order, &frame);
        let input: Vec<f32> = (0..num_coeffs(order)).map(|i| (i as f32) * 0.37 - 1.0).collect();
        let mut output = vec![0.0f32; num_coeffs(order)];
        rotation.apply(&input, &mut output);
        for (a, b) in input.iter().zip(output.iter()) {
            assert_eq!(a, b);
        }
    }

    #[test]
    fn band_zero_is_always_identity() {
        let frame = CoordinateSpace3::from_ahead(Vector3::new(1.0, 1.0, 1.0).normalized(), Vector3::ZERO);
        let rotation = SHRotation::from_frame(2, &frame);
        let input = vec![5.0f32; num_coeffs(2)];
        let mut output = vec![0.0f32; num_coeffs(2)];
        rotation.apply(&input, &mut output);
        assert_eq!(output[0], 5.0);
    }

    #[test]
    fn rotation_preserves_l2_norm_per_band() {
        // An orthonormal-frame rotation is an isometry within each band.
        let frame = CoordinateSpace3::from_ahead(Vector3::new(0.2, 0.9, -0.3).normalized(), Vector3::ZERO);
        let order = 3;
        let rotation = SHRotation::from_frame(order, &frame);
        let input = vec![1.0f32; num_coeffs(order)];
        let mut output = vec![0.0f32; num_coeffs(order)];
        rotation.apply(&input, &mut output);

        for l in 0..=order as i32 {
            let mut in_norm = 0.0f32;
            let mut out_norm = 0.0f32;
            for m in -l..=l {
                let idx = flat_index(l, m);
                in_norm += input[idx] * input[idx];
                out_norm += output[idx] * output[idx];
            }
            assert!((in_norm - out_norm).abs() < 1e-2, "band {l}: {in_norm} vs {out_norm}");
        }
    }
}
