//! Persistent constitutive state and the per-step kinematic scratch buffers.

use crate::error::ConstitutiveError;
use crate::interfaces::StressUpdater;
use crate::kinematics::PointKinematics;
use crate::stress_strain::{Packed, StressState};
use crate::topology::QUAD_POINTS;
use std::marker::PhantomData;

/// Stress history of every material point.
///
/// `dev_stress` holds the packed deviatoric stress `[xx, yx, yy, zx, zy, zz]`, `mean_stress`
/// the mean stress, and `history` the model's internal variables, `history_size` per point.
#[derive(Debug, Clone, PartialEq)]
pub struct MaterialState {
    dev_stress: Vec<Packed>,
    mean_stress: Vec<f64>,
    history: Vec<f64>,
    history_size: usize,
}

impl MaterialState {
    pub fn new<M: StressUpdater + ?Sized>(num_points: usize, model: &M) -> Self {
        let history_size = model.history_size();
        let mut history = vec![0.0; num_points * history_size];
        if history_size > 0 {
            for chunk in history.chunks_exact_mut(history_size) {
                model.init_history(chunk);
            }
        }
        Self {
            dev_stress: vec![Packed::zeros(); num_points],
            mean_stress: vec![0.0; num_points],
            history,
            history_size,
        }
    }

    pub fn num_points(&self) -> usize {
        self.mean_stress.len()
    }

    pub fn history_size(&self) -> usize {
        self.history_size
    }

    pub fn stress(&self, m: usize) -> StressState {
        StressState::new(self.dev_stress[m], self.mean_stress[m])
    }

    pub fn set_stress(&mut self, m: usize, stress: StressState) {
        self.dev_stress[m] = stress.dev;
        self.mean_stress[m] = stress.mean;
    }

    pub fn dev_stress(&self) -> &[Packed] {
        &self.dev_stress
    }

    pub fn mean_stress(&self) -> &[f64] {
        &self.mean_stress
    }

    pub fn history(&self, m: usize) -> &[f64] {
        &self.history[m * self.history_size..(m + 1) * self.history_size]
    }

    pub(crate) fn shared(&mut self) -> SharedState<'_> {
        SharedState {
            dev_stress: DisjointSlice::new(&mut self.dev_stress),
            mean_stress: DisjointSlice::new(&mut self.mean_stress),
            history: DisjointSlice::new(&mut self.history),
            history_size: self.history_size,
        }
    }
}

/// [`MaterialState`] viewed for concurrent per-point updates.
pub(crate) struct SharedState<'a> {
    dev_stress: DisjointSlice<'a, Packed>,
    mean_stress: DisjointSlice<'a, f64>,
    history: DisjointSlice<'a, f64>,
    history_size: usize,
}

impl SharedState<'_> {
    /// Runs the constitutive update of material point `m` and stores the result.
    ///
    /// # Safety
    /// No other thread may access point `m` during the call.
    #[inline]
    pub unsafe fn update_point<M: StressUpdater + ?Sized>(
        &self,
        model: &M,
        m: usize,
        kinematics: &PointKinematics,
    ) -> Result<StressState, ConstitutiveError> {
        let dev = self.dev_stress.get_mut(m);
        let mean = self.mean_stress.get_mut(m);
        let history = self.history.chunk_mut(m, self.history_size);
        let updated = model.update(
            &kinematics.dadt,
            &kinematics.rot,
            m,
            &StressState::new(*dev, *mean),
            history,
        )?;
        *dev = updated.dev;
        *mean = updated.mean;
        Ok(updated)
    }
}

/// Kinematics of every quadrature point, written by the kinematics stage and read by the
/// constitutive and integration stages of the same step.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KinematicScratch {
    points: Vec<PointKinematics>,
}

impl KinematicScratch {
    pub fn new(num_elements: usize) -> Self {
        Self {
            points: vec![PointKinematics::default(); num_elements * QUAD_POINTS],
        }
    }

    pub fn num_elements(&self) -> usize {
        self.points.len() / QUAD_POINTS
    }

    #[inline]
    pub fn get(&self, k: usize, q: usize) -> &PointKinematics {
        &self.points[k * QUAD_POINTS + q]
    }

    pub(crate) fn shared(&mut self) -> DisjointSlice<'_, PointKinematics> {
        DisjointSlice::new(&mut self.points)
    }
}

/// A mutable slice handed to several threads that promise to touch disjoint indices.
pub(crate) struct DisjointSlice<'a, T> {
    ptr: *mut T,
    len: usize,
    _marker: PhantomData<&'a mut [T]>,
}

unsafe impl<T: Send> Send for DisjointSlice<'_, T> {}
unsafe impl<T: Send> Sync for DisjointSlice<'_, T> {}

impl<'a, T> DisjointSlice<'a, T> {
    pub fn new(slice: &'a mut [T]) -> Self {
        Self {
            ptr: slice.as_mut_ptr(),
            len: slice.len(),
            _marker: PhantomData,
        }
    }

    /// # Safety
    /// No other live reference to index `i` may exist.
    #[inline]
    #[allow(clippy::mut_from_ref)]
    pub unsafe fn get_mut(&self, i: usize) -> &'a mut T {
        assert!(i < self.len, "index {i} out of range for length {}", self.len);
        &mut *self.ptr.add(i)
    }

    /// Chunk `i` of width `width`.
    ///
    /// # Safety
    /// No other live reference into the chunk may exist.
    #[inline]
    #[allow(clippy::mut_from_ref)]
    pub unsafe fn chunk_mut(&self, i: usize, width: usize) -> &'a mut [T] {
        assert!(
            (i + 1) * width <= self.len,
            "chunk {i} of width {width} out of range for length {}",
            self.len
        );
        std::slice::from_raw_parts_mut(self.ptr.add(i * width), width)
    }
}
