//! Shared mesh and field builders for the integration tests.
#![allow(dead_code)]

use lagfe::{
    structured_coordinates, ElementSet, ForceAccumulator, GradientProvider, KernelConfig, Layout,
    MaterialMap, MaterialState, NodalAccess, SolidMechanicsKernel, StepReport, StressUpdater,
    Topology,
};
use nalgebra::Vector3;

/// A structured block with slightly distorted interior geometry.
pub struct Block {
    pub topology: Topology,
    /// Interleaved reference coordinates.
    pub coords: Vec<f64>,
    pub map: MaterialMap,
}

impl Block {
    pub fn new(nx: usize, ny: usize, nz: usize) -> Self {
        let topology = Topology::structured(nx, ny, nz).unwrap();
        let coords = structured_coordinates(nx, ny, nz, [1.0, 0.8, 1.2]);
        let coords = sample(&coords, |x| {
            x + 0.05 * Vector3::new((2.0 * x.y).sin(), (1.5 * x.z).sin(), (x.x * x.y).sin())
        });
        let map = MaterialMap::identity(topology.num_elements());
        Self {
            topology,
            coords,
            map,
        }
    }

    /// Unit cube with the reference hexahedron numbering.
    pub fn unit_cube() -> Self {
        let topology = Topology::structured(2, 2, 2).unwrap();
        let coords = structured_coordinates(2, 2, 2, [1.0, 1.0, 1.0]);
        Self {
            map: MaterialMap::identity(1),
            topology,
            coords,
        }
    }

    pub fn num_points(&self) -> usize {
        self.map.num_points()
    }

    pub fn num_nodes(&self) -> usize {
        self.topology.num_nodes()
    }

    pub fn all(&self) -> ElementSet {
        ElementSet::all(&self.topology)
    }
}

/// Evaluates `f` at every interleaved position.
pub fn sample(coords: &[f64], f: impl Fn(Vector3<f64>) -> Vector3<f64>) -> Vec<f64> {
    coords
        .chunks_exact(3)
        .flat_map(|x| {
            let v = f(Vector3::new(x[0], x[1], x[2]));
            [v.x, v.y, v.z]
        })
        .collect()
}

/// A smooth displacement field at the start of the step.
pub fn displacement(coords: &[f64]) -> Vec<f64> {
    sample(coords, |x| {
        0.01 * Vector3::new(x.y.sin() + 0.5 * x.x, x.x * x.z, x.x.cos() - 1.0 + 0.2 * x.z)
    })
}

/// A smooth, non-homogeneous displacement increment.
pub fn increment(coords: &[f64]) -> Vec<f64> {
    sample(coords, |x| {
        1e-3 * Vector3::new(
            x.x + 0.3 * x.y * x.y,
            -0.2 * x.z + 0.5 * x.x * x.y,
            0.4 * x.y + 0.1 * x.z * x.z,
        )
    })
}

/// Splits an interleaved array into component arrays.
pub fn separate(values: &[f64]) -> [Vec<f64>; 3] {
    [0, 1, 2].map(|c| values.iter().skip(c).step_by(3).copied().collect())
}

/// Runs the configured kernel form once over all elements with fresh forces.
#[allow(clippy::too_many_arguments)]
pub fn step<G, A>(
    block: &Block,
    gradients: &G,
    model: &dyn StressUpdater,
    config: KernelConfig,
    dt: f64,
    u: &A,
    uhat: &A,
    state: &mut MaterialState,
    layout: Layout,
) -> lagfe::Result<(StepReport, ForceAccumulator)>
where
    G: GradientProvider + ?Sized,
    A: NodalAccess + ?Sized,
{
    let mut kernel = SolidMechanicsKernel::new(&block.topology, gradients, &block.map, model, config)?;
    let forces = ForceAccumulator::new(layout, block.num_nodes());
    let report = kernel.step(&block.all(), dt, u, uhat, state, &forces)?;
    Ok((report, forces))
}

/// Largest componentwise difference relative to the largest magnitude in `a`.
pub fn relative_difference(a: &[f64], b: &[f64]) -> f64 {
    assert_eq!(a.len(), b.len());
    let scale = a.iter().fold(0.0f64, |m, v| m.max(v.abs()));
    let diff = a
        .iter()
        .zip(b)
        .fold(0.0f64, |m, (x, y)| m.max((x - y).abs()));
    if scale == 0.0 {
        diff
    } else {
        diff / scale
    }
}
