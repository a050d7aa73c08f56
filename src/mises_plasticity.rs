use crate::error::ConstitutiveError;
use crate::interfaces::{check_finite, elastic_moduli, required, StressUpdater};
use crate::stress_strain::{decomposition, equivalent, tensor_to_packed, StressState};
use crate::tensor::{rotate, Tensor3};
use std::collections::HashMap;

const DEFAULT_TOLERANCE: f64 = 1e-10;
const DEFAULT_MAX_ITERATIONS: usize = 50;

/// J2 plasticity with radial return in the rotated frame.
///
/// Yield stress as a function of the equivalent plastic strain `κ`:
///
/// ```text
/// σ_y(κ) = yield_stress + hardening κ + saturation_stress (1 - exp(-saturation_rate κ))
/// ```
///
/// The volumetric response is elastic. History slot 0 holds `κ`.
#[derive(Debug, Clone, PartialEq)]
pub struct MisesPlasticity {
    mu: f64,
    kappa: f64,
    sigma_y: f64,
    h: f64,
    saturation_stress: f64,
    saturation_rate: f64,
    tolerance: f64,
    max_iterations: usize,
}

impl MisesPlasticity {
    pub fn new(parameters: &HashMap<String, f64>) -> Result<Self, ConstitutiveError> {
        let (mu, kappa) = elastic_moduli(parameters)?;
        let get = |name: &str, default: f64| parameters.get(name).copied().unwrap_or(default);
        let model = Self {
            mu,
            kappa,
            sigma_y: required(parameters, "yield_stress")?,
            h: get("hardening", 0.0),
            saturation_stress: get("saturation_stress", 0.0),
            saturation_rate: get("saturation_rate", 0.0),
            tolerance: get("tolerance", DEFAULT_TOLERANCE),
            max_iterations: get("max_iterations", DEFAULT_MAX_ITERATIONS as f64) as usize,
        };
        if !(model.sigma_y > 0.0) {
            return Err(ConstitutiveError::InvalidParameter(format!(
                "yield stress must be positive, got {}",
                model.sigma_y
            )));
        }
        if model.h < 0.0 || model.saturation_stress < 0.0 || model.saturation_rate < 0.0 {
            return Err(ConstitutiveError::InvalidParameter(
                "hardening parameters must be non-negative".to_string(),
            ));
        }
        if !(model.tolerance > 0.0) || model.max_iterations == 0 {
            return Err(ConstitutiveError::InvalidParameter(
                "return mapping needs a positive tolerance and at least one iteration".to_string(),
            ));
        }
        Ok(model)
    }

    pub fn yield_stress(&self, kappa: f64) -> f64 {
        self.sigma_y
            + self.h * kappa
            + self.saturation_stress * (1.0 - (-self.saturation_rate * kappa).exp())
    }

    fn hardening_slope(&self, kappa: f64) -> f64 {
        self.h + self.saturation_stress * self.saturation_rate * (-self.saturation_rate * kappa).exp()
    }

    /// Newton iteration on the plastic multiplier for a trial equivalent stress `s_tr_eq`.
    fn plastic_multiplier(
        &self,
        s_tr_eq: f64,
        kappa_0: f64,
        point: usize,
    ) -> Result<f64, ConstitutiveError> {
        let scale = self.yield_stress(kappa_0);
        let mut del_lambda = 0.0;
        let mut residual = s_tr_eq - scale;
        for iteration in 1..=self.max_iterations {
            let slope = 3.0 * self.mu + self.hardening_slope(kappa_0 + del_lambda);
            del_lambda += residual / slope;
            residual =
                s_tr_eq - 3.0 * self.mu * del_lambda - self.yield_stress(kappa_0 + del_lambda);
            if !residual.is_finite() {
                return Err(ConstitutiveError::ReturnMappingFailed {
                    point,
                    iterations: iteration,
                    residual,
                });
            }
            if residual.abs() <= self.tolerance * scale {
                return Ok(del_lambda);
            }
        }
        Err(ConstitutiveError::ReturnMappingFailed {
            point,
            iterations: self.max_iterations,
            residual,
        })
    }
}

impl StressUpdater for MisesPlasticity {
    fn history_size(&self) -> usize {
        1
    }

    fn update(
        &self,
        strain_increment: &Tensor3,
        rotation_increment: &Tensor3,
        point: usize,
        stress: &StressState,
        history: &mut [f64],
    ) -> Result<StressState, ConstitutiveError> {
        check_finite(strain_increment, rotation_increment, point)?;
        let (vol, dev_inc) = decomposition(strain_increment);
        let mean = stress.mean + 3.0 * vol * self.kappa;

        let s_tr = stress.dev_tensor() + 2.0 * self.mu * dev_inc;
        let s_tr_eq = equivalent(&s_tr);
        let kappa_0 = history[0];

        let s_1 = if s_tr_eq > self.yield_stress(kappa_0) {
            let del_lambda = self.plastic_multiplier(s_tr_eq, kappa_0, point)?;
            history[0] = kappa_0 + del_lambda;
            s_tr * (1.0 - 3.0 * self.mu * del_lambda / s_tr_eq)
        } else {
            s_tr
        };
        let s_1 = rotate(rotation_increment, &s_1);
        Ok(StressState::new(tensor_to_packed(&s_1), mean))
    }

    fn parameters(&self) -> HashMap<String, f64> {
        HashMap::from([
            ("shear_modulus".to_string(), self.mu),
            ("bulk_modulus".to_string(), self.kappa),
            ("yield_stress".to_string(), self.sigma_y),
            ("hardening".to_string(), self.h),
            ("saturation_stress".to_string(), self.saturation_stress),
            ("saturation_rate".to_string(), self.saturation_rate),
            ("tolerance".to_string(), self.tolerance),
            ("max_iterations".to_string(), self.max_iterations as f64),
        ])
    }
}
