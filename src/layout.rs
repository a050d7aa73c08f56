//! Nodal field layouts, element gather and the atomic scatter-add accumulator.
//!
//! Nodal vectors are stored either separated by cartesian component
//!
//! ```text
//! u_x = [x_0, x_1, x_2, ...]
//! u_y = [y_0, y_1, y_2, ...]
//! u_z = [z_0, z_1, z_2, ...]
//! ```
//!
//! or interleaved
//!
//! ```text
//! u = [x_0, y_0, z_0, x_1, y_1, z_1, ...]
//! ```
//!
//! The kernels only see a field through [`NodalAccess`], so the element math is written once.

use crate::error::{KernelError, Result};
use crate::topology::{NodeList, DIM, NODES_PER_ELEM};
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use strum_macros::{Display, EnumIter, EnumString};

pub type LocalVectors = [Vector3<f64>; NODES_PER_ELEM];

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Layout {
    Separated,
    Interleaved,
}

impl Layout {
    /// Flat index of component `c` of entry `i` in an array of `n` vectors.
    #[inline]
    pub fn index(self, n: usize, i: usize, c: usize) -> usize {
        match self {
            Layout::Separated => c * n + i,
            Layout::Interleaved => DIM * i + c,
        }
    }
}

/// Read access to one vector per node.
pub trait NodalAccess: Sync {
    fn num_nodes(&self) -> usize;

    fn node(&self, n: usize) -> Vector3<f64>;
}

/// Component-separated nodal field.
#[derive(Debug, Clone, Copy)]
pub struct Separated<'a> {
    x: &'a [f64],
    y: &'a [f64],
    z: &'a [f64],
}

impl<'a> Separated<'a> {
    pub fn new(x: &'a [f64], y: &'a [f64], z: &'a [f64]) -> Result<Self> {
        KernelError::check_len("separated y component", x.len(), y.len())?;
        KernelError::check_len("separated z component", x.len(), z.len())?;
        Ok(Self { x, y, z })
    }
}

impl NodalAccess for Separated<'_> {
    #[inline]
    fn num_nodes(&self) -> usize {
        self.x.len()
    }

    #[inline]
    fn node(&self, n: usize) -> Vector3<f64> {
        Vector3::new(self.x[n], self.y[n], self.z[n])
    }
}

/// Interleaved nodal field.
#[derive(Debug, Clone, Copy)]
pub struct Interleaved<'a> {
    data: &'a [f64],
}

impl<'a> Interleaved<'a> {
    pub fn new(data: &'a [f64]) -> Result<Self> {
        if data.len() % DIM != 0 {
            return Err(KernelError::SizeMismatch {
                what: "interleaved nodal field",
                expected: DIM * (data.len() / DIM + 1),
                found: data.len(),
            });
        }
        Ok(Self { data })
    }
}

impl NodalAccess for Interleaved<'_> {
    #[inline]
    fn num_nodes(&self) -> usize {
        self.data.len() / DIM
    }

    #[inline]
    fn node(&self, n: usize) -> Vector3<f64> {
        Vector3::new(
            self.data[DIM * n],
            self.data[DIM * n + 1],
            self.data[DIM * n + 2],
        )
    }
}

/// Copies the element's nodal vectors into a stack-local buffer.
///
/// Panics on an out-of-range node index.
#[inline]
pub fn gather<A: NodalAccess + ?Sized>(field: &A, nodes: &NodeList) -> LocalVectors {
    let mut local = [Vector3::zeros(); NODES_PER_ELEM];
    for (dst, &n) in local.iter_mut().zip(nodes) {
        *dst = field.node(n);
    }
    local
}

/// Shared nodal force accumulator.
///
/// Elements sharing a node add into it concurrently. Each component is an `AtomicU64`
/// holding the bits of an `f64`, and every update is an atomic add; there is no plain store.
#[derive(Debug)]
pub struct ForceAccumulator {
    layout: Layout,
    num_nodes: usize,
    data: Vec<AtomicU64>,
}

impl ForceAccumulator {
    pub fn new(layout: Layout, num_nodes: usize) -> Self {
        let data = (0..DIM * num_nodes)
            .map(|_| AtomicU64::new(0.0f64.to_bits()))
            .collect();
        Self {
            layout,
            num_nodes,
            data,
        }
    }

    /// Starts from existing values given in this accumulator's layout.
    pub fn from_values(layout: Layout, values: &[f64]) -> Result<Self> {
        if values.len() % DIM != 0 {
            return Err(KernelError::SizeMismatch {
                what: "force accumulator",
                expected: DIM * (values.len() / DIM + 1),
                found: values.len(),
            });
        }
        Ok(Self {
            layout,
            num_nodes: values.len() / DIM,
            data: values.iter().map(|v| AtomicU64::new(v.to_bits())).collect(),
        })
    }

    pub fn layout(&self) -> Layout {
        self.layout
    }

    pub fn num_nodes(&self) -> usize {
        self.num_nodes
    }

    #[inline]
    pub fn add(&self, node: usize, component: usize, value: f64) {
        atomic_add(
            &self.data[self.layout.index(self.num_nodes, node, component)],
            value,
        );
    }

    /// Adds element-local nodal forces into the shared accumulator.
    #[inline]
    pub fn scatter_add(&self, nodes: &NodeList, forces: &LocalVectors) {
        for (&n, f) in nodes.iter().zip(forces) {
            for c in 0..DIM {
                self.add(n, c, f[c]);
            }
        }
    }

    pub fn node(&self, n: usize) -> Vector3<f64> {
        Vector3::from_fn(|c, _| {
            f64::from_bits(
                self.data[self.layout.index(self.num_nodes, n, c)].load(Ordering::Relaxed),
            )
        })
    }

    pub fn reset(&mut self) {
        for v in self.data.iter_mut() {
            *v.get_mut() = 0.0f64.to_bits();
        }
    }

    /// Values in the accumulator's own layout.
    pub fn values(&self) -> Vec<f64> {
        self.data
            .iter()
            .map(|v| f64::from_bits(v.load(Ordering::Relaxed)))
            .collect()
    }

    pub fn to_interleaved(&self) -> Vec<f64> {
        (0..self.num_nodes)
            .flat_map(|n| {
                let f = self.node(n);
                [f.x, f.y, f.z]
            })
            .collect()
    }

    pub fn to_separated(&self) -> [Vec<f64>; DIM] {
        let nodes: Vec<Vector3<f64>> = (0..self.num_nodes).map(|n| self.node(n)).collect();
        [0, 1, 2].map(|c| nodes.iter().map(|f| f[c]).collect())
    }
}

#[inline]
fn atomic_add(cell: &AtomicU64, value: f64) {
    let mut current = cell.load(Ordering::Relaxed);
    loop {
        let updated = (f64::from_bits(current) + value).to_bits();
        match cell.compare_exchange_weak(current, updated, Ordering::Relaxed, Ordering::Relaxed) {
            Ok(_) => return,
            Err(actual) => current = actual,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rayon::prelude::*;
    use strum::IntoEnumIterator;

    #[test]
    fn layouts_gather_the_same_vectors() {
        let x = [0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0];
        let y: Vec<f64> = x.iter().map(|v| 10.0 + v).collect();
        let z: Vec<f64> = x.iter().map(|v| -v).collect();
        let interleaved: Vec<f64> = (0..9).flat_map(|i| [x[i], y[i], z[i]]).collect();

        let sep = Separated::new(&x, &y, &z).unwrap();
        let int = Interleaved::new(&interleaved).unwrap();
        let nodes = [8, 0, 3, 2, 7, 5, 6, 1];
        let a = gather(&sep, &nodes);
        let b = gather(&int, &nodes);
        assert_eq!(a, b);
        assert_eq!(a[0], Vector3::new(8.0, 18.0, -8.0));
        assert_eq!(sep.num_nodes(), int.num_nodes());
    }

    #[test]
    fn mismatched_fields_are_rejected() {
        assert!(Separated::new(&[0.0; 3], &[0.0; 3], &[0.0; 2]).is_err());
        assert!(Interleaved::new(&[0.0; 4]).is_err());
        assert!(ForceAccumulator::from_values(Layout::Interleaved, &[0.0; 5]).is_err());
    }

    #[test]
    #[should_panic]
    fn gather_out_of_range_panics() {
        let data = [0.0; 6];
        let field = Interleaved::new(&data).unwrap();
        gather(&field, &[0, 1, 2, 0, 1, 0, 1, 0]);
    }

    #[test]
    fn layout_names_parse() {
        assert_eq!("separated".parse::<Layout>().unwrap(), Layout::Separated);
        assert_eq!(Layout::Interleaved.to_string(), "interleaved");
        assert_eq!(Layout::iter().count(), 2);
    }

    #[test]
    fn concurrent_scatter_add_is_race_free() {
        for layout in Layout::iter() {
            let acc = ForceAccumulator::new(layout, 3);
            let nodes = [0, 1, 2, 0, 1, 2, 0, 1];
            let forces = [Vector3::new(1.0, 2.0, 0.5); NODES_PER_ELEM];
            (0..1000).into_par_iter().for_each(|_| acc.scatter_add(&nodes, &forces));
            assert_relative_eq!(acc.node(0), Vector3::new(3000.0, 6000.0, 1500.0));
            assert_relative_eq!(acc.node(2), Vector3::new(2000.0, 4000.0, 1000.0));
        }
    }

    #[test]
    fn layout_conversions_agree() {
        let sep = ForceAccumulator::new(Layout::Separated, 2);
        let int = ForceAccumulator::new(Layout::Interleaved, 2);
        for acc in [&sep, &int] {
            acc.add(0, 1, 2.0);
            acc.add(1, 2, -1.0);
        }
        assert_eq!(sep.values(), vec![0.0, 0.0, 2.0, 0.0, 0.0, -1.0]);
        assert_eq!(int.values(), vec![0.0, 2.0, 0.0, 0.0, 0.0, -1.0]);
        assert_eq!(sep.to_interleaved(), int.values());
        assert_eq!(int.to_separated(), sep.to_separated());

        let mut int = int;
        int.reset();
        assert!(int.values().iter().all(|&v| v == 0.0));
    }
}
