use nalgebra::Matrix3;

pub type Tensor3 = Matrix3<f64>;

/// Determinant by cofactor expansion along the first row.
#[inline]
pub fn det(a: &Tensor3) -> f64 {
    a.m11 * (a.m22 * a.m33 - a.m23 * a.m32) - a.m12 * (a.m21 * a.m33 - a.m23 * a.m31)
        + a.m13 * (a.m21 * a.m32 - a.m22 * a.m31)
}

/// Inverse together with the determinant of `a`.
///
/// No check is made on the determinant. A singular input yields infinite or NaN entries
/// and the caller is expected to test the returned determinant.
#[inline]
pub fn inverse_with_det(a: &Tensor3) -> (Tensor3, f64) {
    let c11 = a.m22 * a.m33 - a.m23 * a.m32;
    let c12 = a.m23 * a.m31 - a.m21 * a.m33;
    let c13 = a.m21 * a.m32 - a.m22 * a.m31;
    let det = a.m11 * c11 + a.m12 * c12 + a.m13 * c13;
    let inv_det = 1.0 / det;
    let inv = Tensor3::new(
        c11 * inv_det,
        (a.m13 * a.m32 - a.m12 * a.m33) * inv_det,
        (a.m12 * a.m23 - a.m13 * a.m22) * inv_det,
        c12 * inv_det,
        (a.m11 * a.m33 - a.m13 * a.m31) * inv_det,
        (a.m13 * a.m21 - a.m11 * a.m23) * inv_det,
        c13 * inv_det,
        (a.m12 * a.m31 - a.m11 * a.m32) * inv_det,
        (a.m11 * a.m22 - a.m12 * a.m21) * inv_det,
    );
    (inv, det)
}

#[inline]
pub fn inverse(a: &Tensor3) -> Tensor3 {
    inverse_with_det(a).0
}

/// `A·B`
#[inline]
pub fn ab(a: &Tensor3, b: &Tensor3) -> Tensor3 {
    a * b
}

/// `Aᵗ·B`
#[inline]
pub fn atb(a: &Tensor3, b: &Tensor3) -> Tensor3 {
    a.tr_mul(b)
}

/// `A·Bᵗ`
#[inline]
pub fn abt(a: &Tensor3, b: &Tensor3) -> Tensor3 {
    let mut out = Tensor3::zeros();
    for i in 0..3 {
        for j in 0..3 {
            out[(i, j)] = a[(i, 0)] * b[(j, 0)] + a[(i, 1)] * b[(j, 1)] + a[(i, 2)] * b[(j, 2)];
        }
    }
    out
}

/// Congruence transform `Q·A·Qᵗ`.
#[inline]
pub fn rotate(q: &Tensor3, a: &Tensor3) -> Tensor3 {
    abt(&ab(q, a), q)
}

#[inline]
pub fn trace(a: &Tensor3) -> f64 {
    a.m11 + a.m22 + a.m33
}

#[inline]
pub fn symmetric_part(a: &Tensor3) -> Tensor3 {
    0.5 * (a + a.transpose())
}

#[inline]
pub fn skew_part(a: &Tensor3) -> Tensor3 {
    0.5 * (a - a.transpose())
}

/// Rotation about a unit axis by `angle` (Rodrigues formula).
pub fn axis_angle_rotation(axis: [f64; 3], angle: f64) -> Tensor3 {
    let norm = (axis[0] * axis[0] + axis[1] * axis[1] + axis[2] * axis[2]).sqrt();
    let (x, y, z) = (axis[0] / norm, axis[1] / norm, axis[2] / norm);
    let k = Tensor3::new(0.0, -z, y, z, 0.0, -x, -y, x, 0.0);
    Tensor3::identity() + angle.sin() * k + (1.0 - angle.cos()) * (k * k)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn sample() -> Tensor3 {
        Tensor3::new(2.0, 0.3, -0.1, 0.5, 1.5, 0.2, -0.4, 0.1, 3.0)
    }

    #[test]
    fn determinant_matches_nalgebra() {
        let a = sample();
        assert_relative_eq!(det(&a), a.determinant(), epsilon = 1e-13);
    }

    #[test]
    fn inverse_is_inverse() {
        let a = sample();
        let (inv, d) = inverse_with_det(&a);
        assert_relative_eq!(d, det(&a), epsilon = 1e-14);
        assert_relative_eq!(a * inv, Tensor3::identity(), epsilon = 1e-13);
        assert_relative_eq!(inv * a, Tensor3::identity(), epsilon = 1e-13);
    }

    #[test]
    fn singular_inverse_is_not_finite() {
        let a = Tensor3::new(1.0, 2.0, 3.0, 2.0, 4.0, 6.0, 0.0, 1.0, 1.0);
        let (inv, d) = inverse_with_det(&a);
        assert_eq!(d, 0.0);
        assert!(inv.iter().any(|v| !v.is_finite()));
    }

    #[test]
    fn transposed_products() {
        let a = sample();
        let b = Tensor3::new(1.0, -2.0, 0.5, 0.0, 1.0, 4.0, 3.0, 0.2, -1.0);
        assert_relative_eq!(ab(&a, &b), a * b, epsilon = 1e-14);
        assert_relative_eq!(atb(&a, &b), a.transpose() * b, epsilon = 1e-14);
        assert_relative_eq!(abt(&a, &b), a * b.transpose(), epsilon = 1e-14);
    }

    #[test]
    fn axis_angle_is_orthogonal() {
        let q = axis_angle_rotation([1.0, 2.0, -0.5], 0.7);
        assert_relative_eq!(q * q.transpose(), Tensor3::identity(), epsilon = 1e-14);
        assert_relative_eq!(det(&q), 1.0, epsilon = 1e-14);
    }

    #[test]
    fn split_recombines() {
        let a = sample();
        assert_relative_eq!(symmetric_part(&a) + skew_part(&a), a, epsilon = 1e-15);
        assert_relative_eq!(trace(&skew_part(&a)), 0.0);
    }
}
