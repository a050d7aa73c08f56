//! Trilinear hexahedron shape-function gradients at the 2×2×2 Gauss points.
//!
//! Node numbering and natural coordinates:
//!
//! ```text
//!        7-------6
//!       /|      /|
//!      / |     / |
//!     4-------5  |
//!     |  3----|--2
//!     | /     | /
//!     |/      |/
//!     0-------1
//! ```
//!
//! Gradients are either precomputed into a [`GradientTable`] once after mesh construction, or
//! evaluated on every call by [`OnTheFly`] from the nodal reference coordinates. Both go through
//! [`GradientProvider`].

use crate::error::{KernelError, Result};
use crate::layout::{gather, Layout, LocalVectors, NodalAccess};
use crate::tensor::{inverse_with_det, Tensor3};
use crate::topology::{NodeList, Topology, DIM, NODES_PER_ELEM, QUAD_POINTS};
use nalgebra::Vector3;

const XI: [f64; NODES_PER_ELEM] = [-1.0, 1.0, 1.0, -1.0, -1.0, 1.0, 1.0, -1.0];
const ETA: [f64; NODES_PER_ELEM] = [-1.0, -1.0, 1.0, 1.0, -1.0, -1.0, 1.0, 1.0];
const ZETA: [f64; NODES_PER_ELEM] = [-1.0, -1.0, -1.0, -1.0, 1.0, 1.0, 1.0, 1.0];

/// 1/sqrt(3)
const GAUSS: f64 = 0.5773502691896258;
const GAUSS_WEIGHT: f64 = 1.0;

/// Natural coordinates of quadrature point `q`; point `q` lies nearest node `q`.
pub fn quadrature_point(q: usize) -> [f64; 3] {
    [GAUSS * XI[q], GAUSS * ETA[q], GAUSS * ZETA[q]]
}

#[cfg(test)]
fn shape_functions(xi: [f64; 3]) -> [f64; NODES_PER_ELEM] {
    let mut n = [0.0; NODES_PER_ELEM];
    for a in 0..NODES_PER_ELEM {
        n[a] = 0.125 * (1.0 + XI[a] * xi[0]) * (1.0 + ETA[a] * xi[1]) * (1.0 + ZETA[a] * xi[2]);
    }
    n
}

/// Derivatives of the shape functions with respect to natural coordinates.
pub fn parent_derivatives(xi: [f64; 3]) -> LocalVectors {
    let mut dn = [Vector3::zeros(); NODES_PER_ELEM];
    for (a, d) in dn.iter_mut().enumerate() {
        let fx = 1.0 + XI[a] * xi[0];
        let fy = 1.0 + ETA[a] * xi[1];
        let fz = 1.0 + ZETA[a] * xi[2];
        *d = 0.125 * Vector3::new(XI[a] * fy * fz, fx * ETA[a] * fz, fx * fy * ZETA[a]);
    }
    dn
}

/// Spatial gradients of every nodal shape function at every quadrature point of one element.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ElementGradients {
    pub dndx: [LocalVectors; QUAD_POINTS],
    /// Jacobian determinant times quadrature weight.
    pub det_j: [f64; QUAD_POINTS],
}

/// Supplies [`ElementGradients`] for an element.
pub trait GradientProvider: Sync {
    fn element_gradients(&self, k: usize, nodes: &NodeList) -> ElementGradients;

    /// Fails unless the provider covers every element of `topology`.
    fn check(&self, topology: &Topology) -> Result<()>;
}

/// Parent derivatives evaluated once at all quadrature points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParentGradients {
    dn_dxi: [LocalVectors; QUAD_POINTS],
}

impl ParentGradients {
    pub fn hex8() -> Self {
        let mut dn_dxi = [[Vector3::zeros(); NODES_PER_ELEM]; QUAD_POINTS];
        for (q, d) in dn_dxi.iter_mut().enumerate() {
            *d = parent_derivatives(quadrature_point(q));
        }
        Self { dn_dxi }
    }

    /// Maps parent derivatives to spatial gradients for the given nodal coordinates.
    pub fn element_gradients(&self, coords: &LocalVectors) -> ElementGradients {
        let mut out = ElementGradients {
            dndx: [[Vector3::zeros(); NODES_PER_ELEM]; QUAD_POINTS],
            det_j: [0.0; QUAD_POINTS],
        };
        for q in 0..QUAD_POINTS {
            let dn = &self.dn_dxi[q];
            // J_ij = dx_i / dxi_j
            let mut jac = Tensor3::zeros();
            for a in 0..NODES_PER_ELEM {
                jac += coords[a] * dn[a].transpose();
            }
            let (jinv, det) = inverse_with_det(&jac);
            for a in 0..NODES_PER_ELEM {
                out.dndx[q][a] = jinv.tr_mul(&dn[a]);
            }
            out.det_j[q] = det * GAUSS_WEIGHT;
        }
        out
    }
}

/// Recomputes gradients from nodal coordinates on every call.
#[derive(Debug, Clone)]
pub struct OnTheFly<'a, A: NodalAccess> {
    coords: &'a A,
    parent: ParentGradients,
}

impl<'a, A: NodalAccess> OnTheFly<'a, A> {
    pub fn new(coords: &'a A) -> Self {
        Self {
            coords,
            parent: ParentGradients::hex8(),
        }
    }
}

impl<A: NodalAccess> GradientProvider for OnTheFly<'_, A> {
    #[inline]
    fn element_gradients(&self, _k: usize, nodes: &NodeList) -> ElementGradients {
        self.parent.element_gradients(&gather(self.coords, nodes))
    }

    fn check(&self, topology: &Topology) -> Result<()> {
        KernelError::check_len(
            "coordinate nodes",
            topology.num_nodes(),
            self.coords.num_nodes(),
        )
    }
}

/// Gradients and `detJ` precomputed for every element, stored in either layout.
#[derive(Debug, Clone, PartialEq)]
pub struct GradientTable {
    layout: Layout,
    num_elements: usize,
    dndx: Vec<f64>,
    det_j: Vec<f64>,
}

impl GradientTable {
    pub fn precompute<A: NodalAccess + ?Sized>(
        topology: &Topology,
        coords: &A,
        layout: Layout,
    ) -> Self {
        let parent = ParentGradients::hex8();
        let num_elements = topology.num_elements();
        let entries = num_elements * QUAD_POINTS * NODES_PER_ELEM;
        let mut dndx = vec![0.0; DIM * entries];
        let mut det_j = vec![0.0; num_elements * QUAD_POINTS];
        for k in 0..num_elements {
            let grads = parent.element_gradients(&gather(coords, &topology.element_nodes(k)));
            for q in 0..QUAD_POINTS {
                det_j[k * QUAD_POINTS + q] = grads.det_j[q];
                for a in 0..NODES_PER_ELEM {
                    let e = (k * QUAD_POINTS + q) * NODES_PER_ELEM + a;
                    for c in 0..DIM {
                        dndx[layout.index(entries, e, c)] = grads.dndx[q][a][c];
                    }
                }
            }
        }
        log::debug!(
            "precomputed {layout} gradient table for {num_elements} elements ({} values)",
            dndx.len()
        );
        Self {
            layout,
            num_elements,
            dndx,
            det_j,
        }
    }

    pub fn layout(&self) -> Layout {
        self.layout
    }

    pub fn num_elements(&self) -> usize {
        self.num_elements
    }

    #[inline]
    pub fn gradient(&self, k: usize, q: usize, a: usize) -> Vector3<f64> {
        let entries = self.num_elements * QUAD_POINTS * NODES_PER_ELEM;
        let e = (k * QUAD_POINTS + q) * NODES_PER_ELEM + a;
        Vector3::from_fn(|c, _| self.dndx[self.layout.index(entries, e, c)])
    }

    #[inline]
    pub fn det_j(&self, k: usize, q: usize) -> f64 {
        self.det_j[k * QUAD_POINTS + q]
    }
}

impl GradientProvider for GradientTable {
    #[inline]
    fn element_gradients(&self, k: usize, _nodes: &NodeList) -> ElementGradients {
        let mut out = ElementGradients {
            dndx: [[Vector3::zeros(); NODES_PER_ELEM]; QUAD_POINTS],
            det_j: [0.0; QUAD_POINTS],
        };
        for q in 0..QUAD_POINTS {
            out.det_j[q] = self.det_j(k, q);
            for a in 0..NODES_PER_ELEM {
                out.dndx[q][a] = self.gradient(k, q, a);
            }
        }
        out
    }

    fn check(&self, topology: &Topology) -> Result<()> {
        KernelError::check_len(
            "gradient table elements",
            topology.num_elements(),
            self.num_elements,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::Interleaved;
    use crate::topology::structured_coordinates;
    use approx::assert_relative_eq;

    fn unit_cube() -> LocalVectors {
        [
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(1.0, 0.0, 0.0),
            Vector3::new(1.0, 1.0, 0.0),
            Vector3::new(0.0, 1.0, 0.0),
            Vector3::new(0.0, 0.0, 1.0),
            Vector3::new(1.0, 0.0, 1.0),
            Vector3::new(1.0, 1.0, 1.0),
            Vector3::new(0.0, 1.0, 1.0),
        ]
    }

    #[test]
    fn shape_functions_partition_unity() {
        for q in 0..QUAD_POINTS {
            let n = shape_functions(quadrature_point(q));
            assert_relative_eq!(n.iter().sum::<f64>(), 1.0, epsilon = 1e-14);
        }
        for a in 0..NODES_PER_ELEM {
            let n = shape_functions([XI[a], ETA[a], ZETA[a]]);
            assert_relative_eq!(n[a], 1.0);
        }
    }

    #[test]
    fn gradients_sum_to_zero_and_reproduce_linear_fields() {
        let mut coords = unit_cube();
        coords[6] += Vector3::new(0.2, 0.1, -0.1);
        let grads = ParentGradients::hex8().element_gradients(&coords);
        for q in 0..QUAD_POINTS {
            let sum: Vector3<f64> = grads.dndx[q].iter().sum();
            assert_relative_eq!(sum, Vector3::zeros(), epsilon = 1e-13);
            // grad of x is identity
            let mut g = Tensor3::zeros();
            for a in 0..NODES_PER_ELEM {
                g += coords[a] * grads.dndx[q][a].transpose();
            }
            assert_relative_eq!(g, Tensor3::identity(), epsilon = 1e-13);
        }
    }

    #[test]
    fn unit_cube_volume() {
        let mut coords = unit_cube();
        for c in coords.iter_mut() {
            *c *= 2.0;
        }
        let grads = ParentGradients::hex8().element_gradients(&coords);
        assert_relative_eq!(grads.det_j.iter().sum::<f64>(), 8.0, epsilon = 1e-13);
        // x = 1 + xi, so spatial and parent derivatives coincide
        let expected = -0.125 * (1.0 + GAUSS).powi(2);
        assert_relative_eq!(
            grads.dndx[0][0],
            Vector3::new(expected, expected, expected),
            epsilon = 1e-14
        );
    }

    #[test]
    fn table_layouts_agree_with_on_the_fly() {
        let coords = structured_coordinates(3, 3, 2, [0.5, 1.0, 0.25]);
        let field = Interleaved::new(&coords).unwrap();
        let topology = Topology::structured(3, 3, 2).unwrap();
        let sep = GradientTable::precompute(&topology, &field, Layout::Separated);
        let int = GradientTable::precompute(&topology, &field, Layout::Interleaved);
        let fly = OnTheFly::new(&field);
        for k in 0..topology.num_elements() {
            let nodes = topology.element_nodes(k);
            let a = sep.element_gradients(k, &nodes);
            let b = int.element_gradients(k, &nodes);
            let c = fly.element_gradients(k, &nodes);
            assert_eq!(a, b);
            for q in 0..QUAD_POINTS {
                assert_relative_eq!(a.det_j[q], c.det_j[q], epsilon = 1e-14);
                for n in 0..NODES_PER_ELEM {
                    assert_relative_eq!(a.dndx[q][n], c.dndx[q][n], epsilon = 1e-14);
                }
            }
        }
    }
}
