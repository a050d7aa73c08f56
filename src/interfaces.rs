use crate::error::ConstitutiveError;
use crate::stress_strain::StressState;
use crate::tensor::Tensor3;
use std::collections::HashMap;

/// A rate-form constitutive model advancing the stress at one material point.
///
/// The kernels call [`StressUpdater::update`] exactly once per material point per kernel call, after
/// the kinematics stage and before integration. Everything downstream depends only on the
/// returned stress, so any path-dependent model can be plugged in.
pub trait StressUpdater: Send + Sync {
    /// Number of internal variables persisted per material point besides the stress.
    fn history_size(&self) -> usize {
        0
    }

    /// Writes the initial internal variables of one material point.
    fn init_history(&self, history: &mut [f64]) {
        history.fill(0.0);
    }

    /// Advances `stress` by the incremental strain `D·dt` and rotation increment `rot`.
    ///
    /// `history` is the material point's internal state and may only be written when the
    /// update succeeds.
    fn update(
        &self,
        strain_increment: &Tensor3,
        rotation_increment: &Tensor3,
        point: usize,
        stress: &StressState,
        history: &mut [f64],
    ) -> Result<StressState, ConstitutiveError>;

    /// Returns the parameters the model was built from.
    fn parameters(&self) -> HashMap<String, f64>;
}

pub(crate) fn check_finite(
    strain_increment: &Tensor3,
    rotation_increment: &Tensor3,
    point: usize,
) -> Result<(), ConstitutiveError> {
    if strain_increment.iter().all(|v| v.is_finite())
        && rotation_increment.iter().all(|v| v.is_finite())
    {
        Ok(())
    } else {
        Err(ConstitutiveError::NonFiniteIncrement { point })
    }
}

pub(crate) fn required(
    parameters: &HashMap<String, f64>,
    name: &str,
) -> Result<f64, ConstitutiveError> {
    parameters
        .get(name)
        .copied()
        .ok_or_else(|| ConstitutiveError::InvalidParameter(format!("missing parameter `{name}`")))
}

/// Reads `shear_modulus`/`bulk_modulus`, or derives them from `E` and `nu`.
pub(crate) fn elastic_moduli(
    parameters: &HashMap<String, f64>,
) -> Result<(f64, f64), ConstitutiveError> {
    let (shear, bulk) = match (parameters.get("shear_modulus"), parameters.get("bulk_modulus")) {
        (Some(&g), Some(&k)) => (g, k),
        _ => {
            let e = required(parameters, "E")?;
            let nu = required(parameters, "nu")?;
            if !(-1.0 < nu && nu < 0.5) {
                return Err(ConstitutiveError::InvalidParameter(format!(
                    "Poisson ratio {nu} outside (-1, 0.5)"
                )));
            }
            (e / (2.0 * (1.0 + nu)), e / (3.0 * (1.0 - 2.0 * nu)))
        }
    };
    if !(shear > 0.0 && bulk > 0.0) {
        return Err(ConstitutiveError::InvalidParameter(format!(
            "moduli must be positive, got shear {shear} and bulk {bulk}"
        )));
    }
    Ok((shear, bulk))
}
