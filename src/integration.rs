//! Nodal internal forces from the updated Cauchy stress.
//!
//! With reference gradients `∇_X N_a`, the current-configuration gradient is
//! `∇_x N_a = F⁻ᵗ ∇_X N_a` and the current volume element is `detF·detJ`, so
//!
//! ```text
//! f_a -= detJ detF σ F⁻ᵗ ∇_X N_a
//! ```
//!
//! summed over quadrature points. `detJ detF σ F⁻ᵗ` is the first Piola–Kirchhoff stress
//! times the reference volume weight.

use crate::layout::LocalVectors;
use crate::tensor::{abt, Tensor3};

/// Adds the contribution of one quadrature point to the element-local forces.
#[inline]
pub fn integrate(
    forces: &mut LocalVectors,
    det_j: f64,
    det_f: f64,
    f_inv: &Tensor3,
    stress: &Tensor3,
    dndx: &LocalVectors,
) {
    let p = abt(stress, f_inv) * (-det_j * det_f);
    for (f, d) in forces.iter_mut().zip(dndx) {
        *f += p * d;
    }
}
