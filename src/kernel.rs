//! The solid mechanics update kernel.
//!
//! One call advances the stress of every material point reached from an element set and adds
//! the resulting internal forces into a [`ForceAccumulator`]. Two compositions of the same
//! stages are available:
//!
//! * **fused**: per element, gather → kinematics → constitutive → integration → scatter.
//! * **staged**: kinematics for all elements into a [`KinematicScratch`], then the constitutive
//!   update for all material points, then integration for all elements.
//!
//! Both run the same arithmetic in the same order for every quadrature point, so stresses agree
//! bit for bit. Nodal forces agree up to the summation order of the atomic scatter-add.

use crate::dispatch::{Dispatcher, ExecutionPolicy, StepReport};
use crate::error::{KernelError, Result};
use crate::integration::integrate;
use crate::interfaces::StressUpdater;
use crate::kinematics::point_kinematics;
use crate::layout::{gather, ForceAccumulator, NodalAccess};
use crate::shape::GradientProvider;
use crate::state::{KinematicScratch, MaterialState};
use crate::topology::{ElementSet, MaterialMap, Topology, NODES_PER_ELEM, QUAD_POINTS};
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString, EnumIter, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum KernelForm {
    #[default]
    Fused,
    Staged,
}

/// Kernel settings chosen once at setup.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct KernelConfig {
    pub policy: ExecutionPolicy,
    pub form: KernelForm,
    /// Bound on the rotation increment `|W|·dt` beyond which the Hughes–Winget approximation is
    /// considered inaccurate. Exceeding points are counted in [`StepReport::large_rotations`].
    pub max_rotation_increment: Option<f64>,
}

/// Element kernels over one mesh, gradient provider and constitutive model.
pub struct SolidMechanicsKernel<'a, G: GradientProvider + ?Sized, M: StressUpdater + ?Sized> {
    topology: &'a Topology,
    gradients: &'a G,
    material_map: &'a MaterialMap,
    model: &'a M,
    dispatcher: Dispatcher,
    config: KernelConfig,
    scratch: KinematicScratch,
}

impl<'a, G, M> SolidMechanicsKernel<'a, G, M>
where
    G: GradientProvider + ?Sized,
    M: StressUpdater + ?Sized,
{
    pub fn new(
        topology: &'a Topology,
        gradients: &'a G,
        material_map: &'a MaterialMap,
        model: &'a M,
        config: KernelConfig,
    ) -> Result<Self> {
        KernelError::check_len(
            "material map elements",
            topology.num_elements(),
            material_map.num_elements(),
        )?;
        gradients.check(topology)?;
        if let Some(bound) = config.max_rotation_increment {
            if !(bound > 0.0) {
                return Err(KernelError::InvalidParameter(format!(
                    "max_rotation_increment must be positive, got {bound}"
                )));
            }
        }
        let dispatcher = Dispatcher::new(config.policy)?;
        let scratch = match config.form {
            KernelForm::Staged => KinematicScratch::new(topology.num_elements()),
            KernelForm::Fused => KinematicScratch::default(),
        };
        log::debug!(
            "{} kernel over {} elements, {} material points",
            config.form,
            topology.num_elements(),
            material_map.num_points()
        );
        Ok(Self {
            topology,
            gradients,
            material_map,
            model,
            dispatcher,
            config,
            scratch,
        })
    }

    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    /// Kinematics written by the last staged [`step`](Self::step).
    pub fn scratch(&self) -> &KinematicScratch {
        &self.scratch
    }

    /// Runs the configured form, using the kernel's own scratch buffer for the staged one.
    ///
    /// # Errors
    /// Size and parameter checks run before anything is written. A constitutive failure aborts
    /// the call part-way: material points and nodal forces of elements already processed stay
    /// updated. To retry the step, restore a clone of `state` taken beforehand and
    /// [`reset`](ForceAccumulator::reset) or rebuild `forces`.
    pub fn step<A: NodalAccess + ?Sized>(
        &mut self,
        elements: &ElementSet,
        dt: f64,
        u: &A,
        uhat: &A,
        state: &mut MaterialState,
        forces: &ForceAccumulator,
    ) -> Result<StepReport> {
        match self.config.form {
            KernelForm::Fused => self.fused(elements, dt, u, uhat, state, forces),
            KernelForm::Staged => {
                let mut scratch = std::mem::take(&mut self.scratch);
                let report = self.staged(elements, dt, u, uhat, state, &mut scratch, forces);
                self.scratch = scratch;
                report
            }
        }
    }

    /// Gather, kinematics, constitutive update, integration and scatter, element by element.
    ///
    /// # Errors
    /// Size and parameter checks run before anything is written. A constitutive failure aborts
    /// the call part-way: material points and nodal forces of elements already processed stay
    /// updated. To retry the step, restore a clone of `state` taken beforehand and
    /// [`reset`](ForceAccumulator::reset) or rebuild `forces`.
    pub fn fused<A: NodalAccess + ?Sized>(
        &self,
        elements: &ElementSet,
        dt: f64,
        u: &A,
        uhat: &A,
        state: &mut MaterialState,
        forces: &ForceAccumulator,
    ) -> Result<StepReport> {
        self.check_fields(elements, dt, u, uhat)?;
        self.check_state(state)?;
        self.check_forces(forces)?;
        log::trace!(
            "fused update of {} elements, dt = {dt:e}, {} policy",
            elements.len(),
            self.dispatcher.policy()
        );

        let bound = self.config.max_rotation_increment;
        let shared = state.shared();
        let report = self.dispatcher.for_each_element(elements, |k| {
            let nodes = self.topology.element_nodes(k);
            let grads = self.gradients.element_gradients(k, &nodes);
            let u_local = gather(u, &nodes);
            let uhat_local = gather(uhat, &nodes);

            let mut local = [Vector3::zeros(); NODES_PER_ELEM];
            let mut report = StepReport::default();
            for q in 0..QUAD_POINTS {
                let kin = point_kinematics(&u_local, &uhat_local, &grads.dndx[q], dt);
                report.record(k, q, &kin, bound);
                let m = self.material_map.point(k, q);
                // SAFETY: element indices are unique and the material map is injective, so no
                // other worker touches material point m.
                let stress = unsafe { shared.update_point(self.model, m, &kin) }?;
                integrate(
                    &mut local,
                    grads.det_j[q],
                    kin.det_f,
                    &kin.f_inv,
                    &stress.total(),
                    &grads.dndx[q],
                );
            }
            forces.scatter_add(&nodes, &local);
            Ok(report)
        })?;
        self.warn_rotations(&report);
        Ok(report)
    }

    /// Kinematics of every quadrature point of `elements`, written into `scratch`.
    pub fn kinematics_stage<A: NodalAccess + ?Sized>(
        &self,
        elements: &ElementSet,
        dt: f64,
        u: &A,
        uhat: &A,
        scratch: &mut KinematicScratch,
    ) -> Result<StepReport> {
        self.check_fields(elements, dt, u, uhat)?;
        self.check_scratch(scratch)?;
        log::trace!("kinematics stage over {} elements", elements.len());

        let bound = self.config.max_rotation_increment;
        let shared = scratch.shared();
        self.dispatcher.for_each_element(elements, |k| {
            let nodes = self.topology.element_nodes(k);
            let grads = self.gradients.element_gradients(k, &nodes);
            let u_local = gather(u, &nodes);
            let uhat_local = gather(uhat, &nodes);
            // SAFETY: element indices are unique, chunk k belongs to this worker alone.
            let points = unsafe { shared.chunk_mut(k, QUAD_POINTS) };
            let mut report = StepReport::default();
            for (q, point) in points.iter_mut().enumerate() {
                *point = point_kinematics(&u_local, &uhat_local, &grads.dndx[q], dt);
                report.record(k, q, point, bound);
            }
            Ok(report)
        })
    }

    /// Constitutive update of every material point reached from `elements`.
    ///
    /// Iterates material points rather than elements, so the update is scheduled independently
    /// of the mesh.
    ///
    /// A constitutive failure leaves the points updated before it in their new state.
    pub fn constitutive_stage(
        &self,
        elements: &ElementSet,
        scratch: &KinematicScratch,
        state: &mut MaterialState,
    ) -> Result<()> {
        elements.check_within(self.topology.num_elements())?;
        self.check_scratch(scratch)?;
        self.check_state(state)?;
        log::trace!("constitutive stage over {} elements", elements.len());

        let owners = self.material_map.inverse(elements);
        let shared = state.shared();
        let points = ElementSet::range(0..owners.len());
        self.dispatcher.for_each_element(&points, |m| {
            if let Some((k, q)) = owners[m] {
                // SAFETY: each material point index is visited once.
                unsafe { shared.update_point(self.model, m, scratch.get(k, q)) }?;
            }
            Ok(StepReport::default())
        })?;
        Ok(())
    }

    /// Internal forces from the stored kinematics and updated stresses.
    pub fn integration_stage(
        &self,
        elements: &ElementSet,
        scratch: &KinematicScratch,
        state: &MaterialState,
        forces: &ForceAccumulator,
    ) -> Result<()> {
        elements.check_within(self.topology.num_elements())?;
        self.check_scratch(scratch)?;
        self.check_state(state)?;
        self.check_forces(forces)?;
        log::trace!("integration stage over {} elements", elements.len());

        self.dispatcher.for_each_element(elements, |k| {
            let nodes = self.topology.element_nodes(k);
            let grads = self.gradients.element_gradients(k, &nodes);
            let mut local = [Vector3::zeros(); NODES_PER_ELEM];
            for q in 0..QUAD_POINTS {
                let kin = scratch.get(k, q);
                let stress = state.stress(self.material_map.point(k, q));
                integrate(
                    &mut local,
                    grads.det_j[q],
                    kin.det_f,
                    &kin.f_inv,
                    &stress.total(),
                    &grads.dndx[q],
                );
            }
            forces.scatter_add(&nodes, &local);
            Ok(StepReport::default())
        })?;
        Ok(())
    }

    /// The three stages in sequence, sharing `scratch`.
    ///
    /// # Errors
    /// Size and parameter checks run before anything is written. A constitutive failure aborts
    /// the call part-way: material points and nodal forces of elements already processed stay
    /// updated. To retry the step, restore a clone of `state` taken beforehand and
    /// [`reset`](ForceAccumulator::reset) or rebuild `forces`.
    #[allow(clippy::too_many_arguments)]
    pub fn staged<A: NodalAccess + ?Sized>(
        &self,
        elements: &ElementSet,
        dt: f64,
        u: &A,
        uhat: &A,
        state: &mut MaterialState,
        scratch: &mut KinematicScratch,
        forces: &ForceAccumulator,
    ) -> Result<StepReport> {
        // checked up front so that a size error leaves the state untouched
        self.check_state(state)?;
        self.check_forces(forces)?;
        let report = self.kinematics_stage(elements, dt, u, uhat, scratch)?;
        self.constitutive_stage(elements, scratch, state)?;
        self.integration_stage(elements, scratch, state, forces)?;
        self.warn_rotations(&report);
        Ok(report)
    }

    fn check_fields<A: NodalAccess + ?Sized>(
        &self,
        elements: &ElementSet,
        dt: f64,
        u: &A,
        uhat: &A,
    ) -> Result<()> {
        if !dt.is_finite() || dt == 0.0 {
            return Err(KernelError::InvalidParameter(format!(
                "time step must be finite and nonzero, got {dt}"
            )));
        }
        elements.check_within(self.topology.num_elements())?;
        KernelError::check_len("displacement nodes", self.topology.num_nodes(), u.num_nodes())?;
        KernelError::check_len(
            "displacement increment nodes",
            self.topology.num_nodes(),
            uhat.num_nodes(),
        )
    }

    fn check_state(&self, state: &MaterialState) -> Result<()> {
        KernelError::check_len(
            "material points",
            self.material_map.num_points(),
            state.num_points(),
        )?;
        KernelError::check_len(
            "history size",
            self.model.history_size(),
            state.history_size(),
        )
    }

    fn check_forces(&self, forces: &ForceAccumulator) -> Result<()> {
        KernelError::check_len("force nodes", self.topology.num_nodes(), forces.num_nodes())
    }

    fn check_scratch(&self, scratch: &KinematicScratch) -> Result<()> {
        KernelError::check_len(
            "scratch elements",
            self.topology.num_elements(),
            scratch.num_elements(),
        )
    }

    fn warn_rotations(&self, report: &StepReport) {
        if report.large_rotations > 0 {
            log::warn!(
                "{} quadrature points exceeded the rotation increment bound {:?} (max {:e})",
                report.large_rotations,
                self.config.max_rotation_increment,
                report.max_rotation_increment
            );
        }
    }
}
