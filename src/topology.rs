//! Element connectivity, element sets and the element-to-material-point map.

use crate::error::{KernelError, Result};
use std::ops::Range;

pub const DIM: usize = 3;
pub const NODES_PER_ELEM: usize = 8;
pub const QUAD_POINTS: usize = 8;

pub type NodeList = [usize; NODES_PER_ELEM];

/// Element-to-node connectivity.
///
/// Resolved once at setup time; [`Topology::element_nodes`] is the only way the kernels
/// look up nodes.
#[derive(Debug, Clone, PartialEq)]
pub enum Topology {
    /// `NODES_PER_ELEM` node indices per element, element-major.
    Explicit {
        connectivity: Vec<usize>,
        num_nodes: usize,
    },
    /// Regular grid with `nx × ny × nz` nodes, numbered x fastest.
    StructuredGrid { nx: usize, ny: usize, nz: usize },
}

impl Topology {
    /// Validates explicit connectivity: a whole number of elements, node indices below
    /// `num_nodes`, and distinct nodes within each element.
    pub fn explicit(connectivity: Vec<usize>, num_nodes: usize) -> Result<Self> {
        if connectivity.len() % NODES_PER_ELEM != 0 {
            return Err(KernelError::InvalidTopology(format!(
                "connectivity length {} is not a multiple of {}",
                connectivity.len(),
                NODES_PER_ELEM
            )));
        }
        for (k, nodes) in connectivity.chunks_exact(NODES_PER_ELEM).enumerate() {
            for (a, &node) in nodes.iter().enumerate() {
                if node >= num_nodes {
                    return Err(KernelError::InvalidTopology(format!(
                        "element {k} references node {node}, mesh has {num_nodes} nodes"
                    )));
                }
                if nodes[..a].contains(&node) {
                    return Err(KernelError::InvalidTopology(format!(
                        "element {k} references node {node} twice"
                    )));
                }
            }
        }
        log::debug!(
            "explicit topology: {} elements, {} nodes",
            connectivity.len() / NODES_PER_ELEM,
            num_nodes
        );
        Ok(Topology::Explicit {
            connectivity,
            num_nodes,
        })
    }

    /// Regular grid with `nx`, `ny`, `nz` nodes per direction (at least two each).
    pub fn structured(nx: usize, ny: usize, nz: usize) -> Result<Self> {
        if nx < 2 || ny < 2 || nz < 2 {
            return Err(KernelError::InvalidTopology(format!(
                "structured grid needs at least 2 nodes per direction, got ({nx}, {ny}, {nz})"
            )));
        }
        log::debug!(
            "structured topology: {} elements, {} nodes",
            (nx - 1) * (ny - 1) * (nz - 1),
            nx * ny * nz
        );
        Ok(Topology::StructuredGrid { nx, ny, nz })
    }

    pub fn num_elements(&self) -> usize {
        match self {
            Topology::Explicit { connectivity, .. } => connectivity.len() / NODES_PER_ELEM,
            Topology::StructuredGrid { nx, ny, nz } => (nx - 1) * (ny - 1) * (nz - 1),
        }
    }

    pub fn num_nodes(&self) -> usize {
        match self {
            Topology::Explicit { num_nodes, .. } => *num_nodes,
            Topology::StructuredGrid { nx, ny, nz } => nx * ny * nz,
        }
    }

    /// Node indices of element `k` in hexahedron order.
    #[inline]
    pub fn element_nodes(&self, k: usize) -> NodeList {
        match self {
            Topology::Explicit { connectivity, .. } => {
                let mut nodes = [0; NODES_PER_ELEM];
                nodes.copy_from_slice(&connectivity[NODES_PER_ELEM * k..NODES_PER_ELEM * (k + 1)]);
                nodes
            }
            Topology::StructuredGrid { nx, ny, nz } => structured_element_nodes(k, *nx, *ny, *nz),
        }
    }

    /// Converts to explicit connectivity.
    pub fn to_explicit(&self) -> Topology {
        match self {
            Topology::Explicit { .. } => self.clone(),
            Topology::StructuredGrid { .. } => {
                let connectivity = (0..self.num_elements())
                    .flat_map(|k| self.element_nodes(k))
                    .collect();
                Topology::Explicit {
                    connectivity,
                    num_nodes: self.num_nodes(),
                }
            }
        }
    }
}

#[inline]
fn structured_element_nodes(k: usize, nx: usize, ny: usize, nz: usize) -> NodeList {
    let ex = nx - 1;
    let ey = ny - 1;
    debug_assert!(k < ex * ey * (nz - 1));
    let i = k % ex;
    let j = (k / ex) % ey;
    let l = k / (ex * ey);
    let node = |i: usize, j: usize, l: usize| i + nx * (j + ny * l);
    [
        node(i, j, l),
        node(i + 1, j, l),
        node(i + 1, j + 1, l),
        node(i, j + 1, l),
        node(i, j, l + 1),
        node(i + 1, j, l + 1),
        node(i + 1, j + 1, l + 1),
        node(i, j + 1, l + 1),
    ]
}

/// Reference coordinates for a structured grid, interleaved `[x0, y0, z0, x1, ...]`.
pub fn structured_coordinates(nx: usize, ny: usize, nz: usize, spacing: [f64; 3]) -> Vec<f64> {
    let mut coords = Vec::with_capacity(DIM * nx * ny * nz);
    for l in 0..nz {
        for j in 0..ny {
            for i in 0..nx {
                coords.push(i as f64 * spacing[0]);
                coords.push(j as f64 * spacing[1]);
                coords.push(l as f64 * spacing[2]);
            }
        }
    }
    coords
}

/// The elements a kernel call processes: a contiguous range or an explicit list of distinct
/// element indices.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementSet(pub(crate) Indices);

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Indices {
    Range(Range<usize>),
    List(Vec<usize>),
}

impl ElementSet {
    pub fn all(topology: &Topology) -> Self {
        Self::range(0..topology.num_elements())
    }

    pub fn range(range: Range<usize>) -> Self {
        ElementSet(Indices::Range(range))
    }

    /// Validates an explicit subset: indices below `num_elements`, no repeats.
    pub fn from_indices(indices: Vec<usize>, num_elements: usize) -> Result<Self> {
        let mut seen = vec![false; num_elements];
        for &k in &indices {
            if k >= num_elements {
                return Err(KernelError::InvalidElementSet(format!(
                    "element {k} out of range, mesh has {num_elements} elements"
                )));
            }
            if std::mem::replace(&mut seen[k], true) {
                return Err(KernelError::InvalidElementSet(format!(
                    "element {k} listed twice"
                )));
            }
        }
        Ok(ElementSet(Indices::List(indices)))
    }

    pub fn len(&self) -> usize {
        match &self.0 {
            Indices::Range(r) => r.len(),
            Indices::List(l) => l.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn check_within(&self, num_elements: usize) -> Result<()> {
        let out_of_range = match &self.0 {
            Indices::Range(r) => r.end > num_elements,
            Indices::List(l) => l.iter().any(|&k| k >= num_elements),
        };
        if out_of_range {
            return Err(KernelError::InvalidElementSet(format!(
                "element set exceeds the {num_elements} mesh elements"
            )));
        }
        Ok(())
    }

    pub fn iter(&self) -> Box<dyn Iterator<Item = usize> + '_> {
        match &self.0 {
            Indices::Range(r) => Box::new(r.clone()),
            Indices::List(l) => Box::new(l.iter().copied()),
        }
    }
}

/// Maps each (element, quadrature point) to a material point index.
#[derive(Debug, Clone, PartialEq)]
pub struct MaterialMap {
    points: Vec<usize>,
    num_points: usize,
}

impl MaterialMap {
    /// One material point per quadrature point, `m = k·QUAD_POINTS + q`.
    pub fn identity(num_elements: usize) -> Self {
        Self {
            points: (0..num_elements * QUAD_POINTS).collect(),
            num_points: num_elements * QUAD_POINTS,
        }
    }

    /// `points[k·QUAD_POINTS + q]` is the material point of quadrature point `q` of element `k`.
    ///
    /// The kernels update every mapped point once per call, so the map must be injective. A
    /// repeated point is refused with [`KernelError::SharedMaterialPoint`].
    pub fn new(points: Vec<usize>, num_points: usize) -> Result<Self> {
        if points.len() % QUAD_POINTS != 0 {
            return Err(KernelError::InvalidMaterialMap(format!(
                "map length {} is not a multiple of {}",
                points.len(),
                QUAD_POINTS
            )));
        }
        let mut owner = vec![usize::MAX; num_points];
        for (i, &m) in points.iter().enumerate() {
            if m >= num_points {
                return Err(KernelError::InvalidMaterialMap(format!(
                    "material point {m} out of range, state has {num_points} points"
                )));
            }
            if owner[m] != usize::MAX {
                return Err(KernelError::SharedMaterialPoint {
                    point: m,
                    first: owner[m],
                    second: i,
                });
            }
            owner[m] = i;
        }
        Ok(Self { points, num_points })
    }

    #[inline]
    pub fn point(&self, k: usize, q: usize) -> usize {
        self.points[k * QUAD_POINTS + q]
    }

    pub fn num_elements(&self) -> usize {
        self.points.len() / QUAD_POINTS
    }

    pub fn num_points(&self) -> usize {
        self.num_points
    }

    /// Material point to `(element, quadrature point)` for the elements of `set`.
    pub fn inverse(&self, set: &ElementSet) -> Vec<Option<(usize, usize)>> {
        let mut inverse = vec![None; self.num_points];
        for k in set.iter() {
            for q in 0..QUAD_POINTS {
                inverse[self.point(k, q)] = Some((k, q));
            }
        }
        inverse
    }
}
