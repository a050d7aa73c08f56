use crate::error::ConstitutiveError;
use crate::interfaces::{check_finite, elastic_moduli, StressUpdater};
use crate::stress_strain::{decomposition, tensor_to_packed, StressState};
use crate::tensor::{rotate, Tensor3};
use nalgebra::SMatrix;
use std::collections::HashMap;

/// Linear hypoelastic law with a deviatoric/volumetric split.
///
/// ```text
/// p += K tr(Dadt)
/// s += 2G (Dadt - tr(Dadt)/3 I)
/// s  = Rot s Rotᵗ
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Hypoelastic {
    shear_modulus: f64,
    bulk_modulus: f64,
}

impl Hypoelastic {
    pub fn new(parameters: &HashMap<String, f64>) -> Result<Self, ConstitutiveError> {
        let (shear_modulus, bulk_modulus) = elastic_moduli(parameters)?;
        Ok(Self {
            shear_modulus,
            bulk_modulus,
        })
    }

    pub fn from_moduli(shear_modulus: f64, bulk_modulus: f64) -> Result<Self, ConstitutiveError> {
        Self::new(&HashMap::from([
            ("shear_modulus".to_string(), shear_modulus),
            ("bulk_modulus".to_string(), bulk_modulus),
        ]))
    }

    pub fn shear_modulus(&self) -> f64 {
        self.shear_modulus
    }

    pub fn bulk_modulus(&self) -> f64 {
        self.bulk_modulus
    }

    /// Tangent in packed components `[xx, yx, yy, zx, zy, zz]`.
    ///
    /// A shear entry is the response to a symmetric perturbation of both off-diagonal strain
    /// components, hence `2G` on the shear diagonal.
    pub fn tangent(&self) -> SMatrix<f64, 6, 6> {
        let mu = self.shear_modulus;
        let lambda = self.bulk_modulus - 2.0 / 3.0 * mu;
        let c1 = lambda + 2.0 * mu;
        let c2 = 2.0 * mu;
        SMatrix::<f64, 6, 6>::from_row_slice(&[
            c1, 0.0, lambda, 0.0, 0.0, lambda, //
            0.0, c2, 0.0, 0.0, 0.0, 0.0, //
            lambda, 0.0, c1, 0.0, 0.0, lambda, //
            0.0, 0.0, 0.0, c2, 0.0, 0.0, //
            0.0, 0.0, 0.0, 0.0, c2, 0.0, //
            lambda, 0.0, lambda, 0.0, 0.0, c1,
        ])
    }
}

impl StressUpdater for Hypoelastic {
    fn update(
        &self,
        strain_increment: &Tensor3,
        rotation_increment: &Tensor3,
        point: usize,
        stress: &StressState,
        _history: &mut [f64],
    ) -> Result<StressState, ConstitutiveError> {
        check_finite(strain_increment, rotation_increment, point)?;
        let (vol, dev_inc) = decomposition(strain_increment);
        let mean = stress.mean + 3.0 * vol * self.bulk_modulus;
        let dev = stress.dev_tensor() + 2.0 * self.shear_modulus * dev_inc;
        let dev = rotate(rotation_increment, &dev);
        Ok(StressState::new(tensor_to_packed(&dev), mean))
    }

    fn parameters(&self) -> HashMap<String, f64> {
        HashMap::from([
            ("shear_modulus".to_string(), self.shear_modulus),
            ("bulk_modulus".to_string(), self.bulk_modulus),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stress_strain::{packed_to_tensor, Packed};
    use crate::tensor::axis_angle_rotation;
    use approx::assert_relative_eq;

    fn model() -> Hypoelastic {
        Hypoelastic::from_moduli(10.0, 20.0).unwrap()
    }

    #[test]
    fn volumetric_and_deviatoric_parts() {
        let d = Tensor3::new(1e-3, 2e-4, 0.0, 2e-4, -5e-4, 0.0, 0.0, 0.0, 1e-4);
        let out = model()
            .update(&d, &Tensor3::identity(), 0, &StressState::default(), &mut [])
            .unwrap();
        assert_relative_eq!(out.mean, 20.0 * 6e-4, epsilon = 1e-15);
        assert_relative_eq!(out.dev[0], 20.0 * (1e-3 - 2e-4), epsilon = 1e-15);
        assert_relative_eq!(out.dev[1], 20.0 * 2e-4, epsilon = 1e-15);
        assert_relative_eq!(out.dev[0] + out.dev[2] + out.dev[5], 0.0, epsilon = 1e-15);
    }

    #[test]
    fn rotation_is_applied_after_the_increment() {
        let rot = axis_angle_rotation([0.0, 0.0, 1.0], std::f64::consts::FRAC_PI_2);
        let stress = StressState::new(Packed::new(2.0, 0.0, -1.0, 0.0, 0.0, -1.0), 3.0);
        let out = model()
            .update(&Tensor3::zeros(), &rot, 0, &stress, &mut [])
            .unwrap();
        assert_relative_eq!(out.mean, 3.0);
        assert_relative_eq!(out.dev[0], -1.0, epsilon = 1e-14);
        assert_relative_eq!(out.dev[2], 2.0, epsilon = 1e-14);
        assert_relative_eq!(
            packed_to_tensor(&out.dev),
            rot * stress.dev_tensor() * rot.transpose(),
            epsilon = 1e-14
        );
    }

    #[test]
    fn tangent_matches_update() {
        let m = model();
        let c = m.tangent();
        let d = Tensor3::new(1e-4, 3e-5, -2e-5, 3e-5, 2e-4, 1e-5, -2e-5, 1e-5, -4e-5);
        let out = m
            .update(&d, &Tensor3::identity(), 0, &StressState::default(), &mut [])
            .unwrap();
        let total = tensor_to_packed(&out.total());
        assert_relative_eq!(total, c * tensor_to_packed(&d), epsilon = 1e-15);
    }

    #[test]
    fn rejects_nan() {
        let mut d = Tensor3::zeros();
        d.m33 = f64::INFINITY;
        let err = model()
            .update(&d, &Tensor3::identity(), 7, &StressState::default(), &mut [])
            .unwrap_err();
        assert_eq!(err, ConstitutiveError::NonFiniteIncrement { point: 7 });
    }
}
