//! Setup-time selection of the constitutive model.

use crate::error::ConstitutiveError;
use crate::hypoelasticity::Hypoelastic;
use crate::interfaces::StressUpdater;
use crate::mises_plasticity::MisesPlasticity;
use crate::stress_strain::StressState;
use crate::tensor::Tensor3;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use strum_macros::{Display, EnumIter, EnumString};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MaterialKind {
    Hypoelastic,
    MisesPlasticity,
}

/// The available models behind one [`StressUpdater`].
#[derive(Debug, Clone, PartialEq)]
pub enum Material {
    Hypoelastic(Hypoelastic),
    MisesPlasticity(MisesPlasticity),
}

impl Material {
    pub fn from_parameters(
        kind: MaterialKind,
        parameters: &HashMap<String, f64>,
    ) -> Result<Self, ConstitutiveError> {
        let material = match kind {
            MaterialKind::Hypoelastic => Material::Hypoelastic(Hypoelastic::new(parameters)?),
            MaterialKind::MisesPlasticity => {
                Material::MisesPlasticity(MisesPlasticity::new(parameters)?)
            }
        };
        log::debug!("material {kind} with parameters {:?}", material.parameters());
        Ok(material)
    }

    pub fn kind(&self) -> MaterialKind {
        match self {
            Material::Hypoelastic(_) => MaterialKind::Hypoelastic,
            Material::MisesPlasticity(_) => MaterialKind::MisesPlasticity,
        }
    }
}

impl StressUpdater for Material {
    fn history_size(&self) -> usize {
        match self {
            Material::Hypoelastic(m) => m.history_size(),
            Material::MisesPlasticity(m) => m.history_size(),
        }
    }

    fn init_history(&self, history: &mut [f64]) {
        match self {
            Material::Hypoelastic(m) => m.init_history(history),
            Material::MisesPlasticity(m) => m.init_history(history),
        }
    }

    #[inline]
    fn update(
        &self,
        strain_increment: &Tensor3,
        rotation_increment: &Tensor3,
        point: usize,
        stress: &StressState,
        history: &mut [f64],
    ) -> Result<StressState, ConstitutiveError> {
        match self {
            Material::Hypoelastic(m) => {
                m.update(strain_increment, rotation_increment, point, stress, history)
            }
            Material::MisesPlasticity(m) => {
                m.update(strain_increment, rotation_increment, point, stress, history)
            }
        }
    }

    fn parameters(&self) -> HashMap<String, f64> {
        match self {
            Material::Hypoelastic(m) => m.parameters(),
            Material::MisesPlasticity(m) => m.parameters(),
        }
    }
}

/// Serializable description of a material, as it appears in a caller's configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialConfig {
    pub kind: MaterialKind,
    pub parameters: HashMap<String, f64>,
}

impl MaterialConfig {
    pub fn build(&self) -> Result<Material, ConstitutiveError> {
        Material::from_parameters(self.kind, &self.parameters)
    }
}
