//! One-point explicit updates of nodal fields, `y += dx·dy/dx`.
//!
//! The outer time loop uses these to advance velocities and displacements between kernel calls.
//! Plain routines take both arrays in the same layout and work entry by entry. The `_components`
//! variants cross layouts: separated rates into an interleaved field, or an interleaved rate into
//! separated increments and fields.

use crate::error::{KernelError, Result};
use crate::layout::Layout;
use crate::topology::DIM;
use rayon::prelude::*;

/// `y += dx·dydx`, both arrays in the same layout.
pub fn advance(dydx: &[f64], y: &mut [f64], dx: f64) -> Result<()> {
    KernelError::check_len("rate", y.len(), dydx.len())?;
    y.par_iter_mut()
        .zip(dydx.par_iter())
        .for_each(|(y, r)| *y += dx * r);
    Ok(())
}

/// `y += dx·dydx` on the listed nodes only.
///
/// `nodes` must be distinct and below the node count of `y`.
pub fn advance_subset(
    layout: Layout,
    dydx: &[f64],
    y: &mut [f64],
    dx: f64,
    nodes: &[usize],
) -> Result<()> {
    KernelError::check_len("rate", y.len(), dydx.len())?;
    let num_nodes = y.len() / DIM;
    KernelError::check_len("nodal field", DIM * num_nodes, y.len())?;
    let mut selected = vec![false; num_nodes];
    for &n in nodes {
        if n >= num_nodes {
            return Err(KernelError::InvalidParameter(format!(
                "node {n} out of range, field has {num_nodes} nodes"
            )));
        }
        if std::mem::replace(&mut selected[n], true) {
            return Err(KernelError::InvalidParameter(format!("node {n} listed twice")));
        }
    }
    y.par_iter_mut()
        .zip(dydx.par_iter())
        .enumerate()
        .filter(|(i, _)| {
            let node = match layout {
                Layout::Separated => i % num_nodes,
                Layout::Interleaved => i / DIM,
            };
            selected[node]
        })
        .for_each(|(_, (y, r))| *y += dx * r);
    Ok(())
}

/// `y += dx·dydx` with the rate given as three component arrays and `y` interleaved.
pub fn advance_components(dydx: [&[f64]; DIM], y: &mut [f64], dx: f64) -> Result<()> {
    let num_nodes = dydx[0].len();
    for r in &dydx[1..] {
        KernelError::check_len("rate component", num_nodes, r.len())?;
    }
    KernelError::check_len("interleaved field", DIM * num_nodes, y.len())?;
    y.par_chunks_exact_mut(DIM)
        .enumerate()
        .for_each(|(n, y)| {
            for c in 0..DIM {
                y[c] += dx * dydx[c][n];
            }
        });
    Ok(())
}

/// `dy = dx·dydx` and `y += dy`, all three arrays in the same layout.
pub fn advance_with_increment(dydx: &[f64], dy: &mut [f64], y: &mut [f64], dx: f64) -> Result<()> {
    KernelError::check_len("rate", y.len(), dydx.len())?;
    KernelError::check_len("increment", y.len(), dy.len())?;
    y.par_iter_mut()
        .zip(dy.par_iter_mut())
        .zip(dydx.par_iter())
        .for_each(|((y, dy), r)| {
            *dy = r * dx;
            *y += *dy;
        });
    Ok(())
}

/// `dy = dx·dydx` and `y += dy` with an interleaved rate and separated `dy` and `y`.
pub fn advance_with_increment_components(
    dydx: &[f64],
    dy: [&mut [f64]; DIM],
    y: [&mut [f64]; DIM],
    dx: f64,
) -> Result<()> {
    if dydx.len() % DIM != 0 {
        return Err(KernelError::SizeMismatch {
            what: "interleaved rate",
            expected: DIM * (dydx.len() / DIM + 1),
            found: dydx.len(),
        });
    }
    let num_nodes = dydx.len() / DIM;
    for (c, (dy, y)) in dy.into_iter().zip(y).enumerate() {
        KernelError::check_len("increment component", num_nodes, dy.len())?;
        KernelError::check_len("field component", num_nodes, y.len())?;
        y.par_iter_mut()
            .zip(dy.par_iter_mut())
            .enumerate()
            .for_each(|(n, (y, dy))| {
                *dy = dydx[DIM * n + c] * dx;
                *y += *dy;
            });
    }
    Ok(())
}
