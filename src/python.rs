use crate::dispatch::ExecutionPolicy;
use crate::hypoelasticity::Hypoelastic;
use crate::interfaces::StressUpdater;
use crate::kernel::{KernelConfig, SolidMechanicsKernel};
use crate::layout::{ForceAccumulator, Interleaved, Layout};
use crate::shape::OnTheFly;
use crate::state::MaterialState;
use crate::stress_strain::{Packed, StressState};
use crate::tensor::Tensor3;
use crate::topology::{ElementSet, MaterialMap, Topology, QUAD_POINTS};
use numpy::{PyReadonlyArray1, PyReadwriteArray1};
use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use std::collections::HashMap;

fn value_error<E: std::fmt::Display>(error: E) -> PyErr {
    PyValueError::new_err(error.to_string())
}

/// Hypoelastic material for python. Tensors are passed as flat row-major 3x3 blocks, deviatoric
/// stresses as packed `[xx, yx, yy, zx, zy, zz]` blocks.
#[pyclass(name = "Hypoelastic")]
struct PyHypoelastic {
    model: Hypoelastic,
}

#[pymethods]
impl PyHypoelastic {
    #[new]
    fn new(parameters: HashMap<String, f64>) -> PyResult<Self> {
        Ok(Self {
            model: Hypoelastic::new(&parameters).map_err(value_error)?,
        })
    }

    fn update(
        &self,
        strain_increment: PyReadonlyArray1<f64>,
        rotation_increment: PyReadonlyArray1<f64>,
        mut dev_stress: PyReadwriteArray1<f64>,
        mut mean_stress: PyReadwriteArray1<f64>,
    ) -> PyResult<()> {
        let strain = strain_increment.as_slice().map_err(value_error)?;
        let rotation = rotation_increment.as_slice().map_err(value_error)?;
        let dev = dev_stress.as_slice_mut().map_err(value_error)?;
        let mean = mean_stress.as_slice_mut().map_err(value_error)?;
        let n = mean.len();
        if strain.len() != 9 * n || rotation.len() != 9 * n || dev.len() != 6 * n {
            return Err(PyValueError::new_err(format!(
                "expected {} tensor and {} deviatoric stress entries for {n} points",
                9 * n,
                6 * n
            )));
        }
        for m in 0..n {
            let stress = StressState::new(Packed::from_row_slice(&dev[6 * m..6 * m + 6]), mean[m]);
            let updated = self
                .model
                .update(
                    &Tensor3::from_row_slice(&strain[9 * m..9 * m + 9]),
                    &Tensor3::from_row_slice(&rotation[9 * m..9 * m + 9]),
                    m,
                    &stress,
                    &mut [],
                )
                .map_err(value_error)?;
            dev[6 * m..6 * m + 6].copy_from_slice(updated.dev.as_slice());
            mean[m] = updated.mean;
        }
        Ok(())
    }

    fn parameters(&self) -> HashMap<String, f64> {
        self.model.parameters()
    }
}

/// Runs the fused kernel over all elements of an explicit hexahedron mesh.
///
/// Nodal arrays are interleaved. Stresses are updated and forces accumulated in place. Returns
/// the number of inverted quadrature points.
#[pyfunction]
#[allow(clippy::too_many_arguments)]
fn fused_update(
    connectivity: Vec<usize>,
    coordinates: PyReadonlyArray1<f64>,
    u: PyReadonlyArray1<f64>,
    uhat: PyReadonlyArray1<f64>,
    dt: f64,
    material: PyRef<'_, PyHypoelastic>,
    mut dev_stress: PyReadwriteArray1<f64>,
    mut mean_stress: PyReadwriteArray1<f64>,
    mut forces: PyReadwriteArray1<f64>,
) -> PyResult<usize> {
    let coordinates = coordinates.as_slice().map_err(value_error)?;
    let num_nodes = coordinates.len() / 3;
    let topology = Topology::explicit(connectivity, num_nodes).map_err(value_error)?;
    let coords = Interleaved::new(coordinates).map_err(value_error)?;
    let gradients = OnTheFly::new(&coords);
    let map = MaterialMap::identity(topology.num_elements());
    let config = KernelConfig {
        policy: ExecutionPolicy::Threaded,
        ..KernelConfig::default()
    };
    let kernel = SolidMechanicsKernel::new(&topology, &gradients, &map, &material.model, config)
        .map_err(value_error)?;

    let dev = dev_stress.as_slice_mut().map_err(value_error)?;
    let mean = mean_stress.as_slice_mut().map_err(value_error)?;
    let num_points = topology.num_elements() * QUAD_POINTS;
    if dev.len() != 6 * num_points || mean.len() != num_points {
        return Err(PyValueError::new_err(format!(
            "expected stresses for {num_points} quadrature points"
        )));
    }
    let mut state = MaterialState::new(num_points, &material.model);
    for m in 0..num_points {
        let stress = StressState::new(Packed::from_row_slice(&dev[6 * m..6 * m + 6]), mean[m]);
        state.set_stress(m, stress);
    }

    let forces = forces.as_slice_mut().map_err(value_error)?;
    let accumulator =
        ForceAccumulator::from_values(Layout::Interleaved, forces).map_err(value_error)?;
    let report = kernel
        .fused(
            &ElementSet::all(&topology),
            dt,
            &Interleaved::new(u.as_slice().map_err(value_error)?).map_err(value_error)?,
            &Interleaved::new(uhat.as_slice().map_err(value_error)?).map_err(value_error)?,
            &mut state,
            &accumulator,
        )
        .map_err(value_error)?;

    for m in 0..num_points {
        let stress = state.stress(m);
        dev[6 * m..6 * m + 6].copy_from_slice(stress.dev.as_slice());
        mean[m] = stress.mean;
    }
    forces.copy_from_slice(&accumulator.values());
    Ok(report.inverted)
}

#[pymodule]
fn lagfe(_py: Python, m: &PyModule) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(fused_update, m)?)?;
    m.add_class::<PyHypoelastic>()?;
    Ok(())
}
