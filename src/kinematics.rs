//! Finite-strain kinematics at one quadrature point.
//!
//! Given nodal displacements `u` (start of step), increments `uhat` and reference gradients
//! `dN/dX`, computes
//!
//! ```text
//! F_mid = I + dU/dX + 0.5 dUhat/dX
//! L     = (dUhat/dX / dt) · F_mid⁻¹
//! F     = I + dU/dX + dUhat/dX
//! ```
//!
//! and splits `L` with the Hughes–Winget incremental rotation
//!
//! ```text
//! D    = sym(L),  W = skew(L)
//! Rot  = (I - dt/2 W)⁻¹ (I + dt/2 W)
//! Dadt = D dt
//! ```
//!
//! `L` is the velocity gradient in the mid-step configuration, so `Dadt` is already expressed in
//! the mid-step frame. The stress is brought forward by `Rot` in the constitutive stage.
//!
//! Nothing here checks `det(F)`. An inverted element yields a non-positive `det_f` that the
//! caller must detect. An inverted or singular `F_mid` has no velocity gradient: such a point
//! gets a zero strain increment and an identity rotation, so its stress is held, and it is
//! reported through `det_f_mid`.

use crate::layout::LocalVectors;
use crate::tensor::{ab, inverse, inverse_with_det, skew_part, symmetric_part, Tensor3};

/// Kinematic quantities handed from the kinematics stage to the constitutive and
/// integration stages.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointKinematics {
    pub det_f: f64,
    /// `det(F_mid)`.
    pub det_f_mid: f64,
    pub f_inv: Tensor3,
    /// Incremental strain `D·dt`.
    pub dadt: Tensor3,
    /// Incremental rotation.
    pub rot: Tensor3,
    /// Magnitude of the rotation increment, `|W|·dt` with `|W|` the axial-vector norm.
    pub rotation_increment: f64,
}

impl Default for PointKinematics {
    fn default() -> Self {
        Self {
            det_f: 1.0,
            det_f_mid: 1.0,
            f_inv: Tensor3::identity(),
            dadt: Tensor3::zeros(),
            rot: Tensor3::identity(),
            rotation_increment: 0.0,
        }
    }
}

/// `Σ_a v_a ⊗ ∇N_a`
#[inline]
pub fn gradient(values: &LocalVectors, dndx: &LocalVectors) -> Tensor3 {
    let mut g = Tensor3::zeros();
    for (v, d) in values.iter().zip(dndx) {
        g += v * d.transpose();
    }
    g
}

/// Hughes–Winget split of the velocity gradient over a step of length `dt`.
///
/// Returns `(rot, dadt)`.
#[inline]
pub fn hughes_winget(l: &Tensor3, dt: f64) -> (Tensor3, Tensor3) {
    let dadt = symmetric_part(l) * dt;
    let half_spin = skew_part(l) * (0.5 * dt);
    let identity = Tensor3::identity();
    let rot = ab(&inverse(&(identity - half_spin)), &(identity + half_spin));
    (rot, dadt)
}

/// Axial-vector norm of the spin increment `W·dt`.
#[inline]
pub fn spin_magnitude(l: &Tensor3, dt: f64) -> f64 {
    let w = skew_part(l);
    (w.m32 * w.m32 + w.m13 * w.m13 + w.m21 * w.m21).sqrt() * dt.abs()
}

/// Kinematics at one quadrature point.
#[inline]
pub fn point_kinematics(
    u: &LocalVectors,
    uhat: &LocalVectors,
    dndx: &LocalVectors,
    dt: f64,
) -> PointKinematics {
    let du_dx = gradient(u, dndx);
    let duhat_dx = gradient(uhat, dndx);
    let identity = Tensor3::identity();

    let f_mid = identity + du_dx + 0.5 * duhat_dx;
    let (f_mid_inv, det_f_mid) = inverse_with_det(&f_mid);
    let l = ab(&(duhat_dx * (1.0 / dt)), &f_mid_inv);
    // non-finite input still reaches the constitutive model
    let held = det_f_mid <= 0.0 || (det_f_mid.is_finite() && !l.iter().all(|v| v.is_finite()));
    let l = if held {
        Tensor3::zeros()
    } else {
        l
    };

    let f = identity + du_dx + duhat_dx;
    let (f_inv, det_f) = inverse_with_det(&f);

    let (rot, dadt) = hughes_winget(&l, dt);
    PointKinematics {
        det_f,
        det_f_mid,
        f_inv,
        dadt,
        rot,
        rotation_increment: spin_magnitude(&l, dt),
    }
}
