//! Element kernels for explicit Lagrangian solid mechanics on trilinear hexahedra.
//!
//! A kernel call gathers nodal displacements, computes finite-strain kinematics with the
//! Hughes–Winget incremental rotation, advances the stress through a [`StressUpdater`] and adds
//! the internal forces into a shared [`ForceAccumulator`]. See [`kernel`] for the fused and staged
//! compositions.

pub mod dispatch;
pub mod error;
pub mod hypoelasticity;
pub mod integration;
pub mod interfaces;
pub mod kernel;
pub mod kinematics;
pub mod layout;
pub mod material;
pub mod mises_plasticity;
pub mod shape;
pub mod state;
pub mod stress_strain;
pub mod tensor;
pub mod time_integration;
pub mod topology;

#[cfg(feature = "python")]
mod python;

pub use dispatch::{Dispatcher, ExecutionPolicy, StepReport};
pub use error::{ConstitutiveError, KernelError, Result};
pub use hypoelasticity::Hypoelastic;
pub use interfaces::StressUpdater;
pub use kernel::{KernelConfig, KernelForm, SolidMechanicsKernel};
pub use kinematics::PointKinematics;
pub use layout::{ForceAccumulator, Interleaved, Layout, NodalAccess, Separated};
pub use material::{Material, MaterialConfig, MaterialKind};
pub use mises_plasticity::MisesPlasticity;
pub use shape::{GradientProvider, GradientTable, OnTheFly};
pub use state::{KinematicScratch, MaterialState};
pub use stress_strain::StressState;
pub use tensor::Tensor3;
pub use topology::{structured_coordinates, ElementSet, MaterialMap, Topology};
