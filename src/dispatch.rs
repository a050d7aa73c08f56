//! Execution policies for the element loops and the per-call step report.

use crate::error::{KernelError, Result};
use crate::kinematics::PointKinematics;
use crate::topology::{ElementSet, Indices};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use strum_macros::Display;

/// How a kernel iterates its element set. No ordering between elements is implied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ExecutionPolicy {
    #[default]
    Sequential,
    /// Rayon's global pool.
    Threaded,
    /// A dedicated rayon pool with a fixed number of threads.
    ThreadPool { threads: usize },
}

/// Summary of the kinematics seen during one kernel call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepReport {
    /// Quadrature points processed.
    pub points: usize,
    pub min_det_f: f64,
    /// Quadrature points with `det(F) <= 0` or `det(F_mid) <= 0`.
    pub inverted: usize,
    /// Lowest `(element, quadrature point, determinant)` among the inverted points. The
    /// determinant is `det(F)` unless only `F_mid` is inverted.
    pub first_inverted: Option<(usize, usize, f64)>,
    pub max_rotation_increment: f64,
    /// Quadrature points whose rotation increment exceeded the configured bound.
    pub large_rotations: usize,
}

impl Default for StepReport {
    fn default() -> Self {
        Self {
            points: 0,
            min_det_f: f64::INFINITY,
            inverted: 0,
            first_inverted: None,
            max_rotation_increment: 0.0,
            large_rotations: 0,
        }
    }
}

impl StepReport {
    #[inline]
    pub(crate) fn record(
        &mut self,
        k: usize,
        q: usize,
        kinematics: &PointKinematics,
        rotation_bound: Option<f64>,
    ) {
        self.points += 1;
        self.min_det_f = self.min_det_f.min(kinematics.det_f);
        // NaN counts as inverted
        if !(kinematics.det_f > 0.0 && kinematics.det_f_mid > 0.0) {
            self.inverted += 1;
            // the offending determinant, end of step first
            let det = if kinematics.det_f > 0.0 {
                kinematics.det_f_mid
            } else {
                kinematics.det_f
            };
            if self.first_inverted.map_or(true, |(e, p, _)| (k, q) < (e, p)) {
                self.first_inverted = Some((k, q, det));
            }
        }
        self.max_rotation_increment = self
            .max_rotation_increment
            .max(kinematics.rotation_increment);
        if rotation_bound.is_some_and(|bound| kinematics.rotation_increment > bound) {
            self.large_rotations += 1;
        }
    }

    pub fn merge(self, other: Self) -> Self {
        let first_inverted = match (self.first_inverted, other.first_inverted) {
            (Some(a), Some(b)) => Some(if (b.0, b.1) < (a.0, a.1) { b } else { a }),
            (a, b) => a.or(b),
        };
        Self {
            points: self.points + other.points,
            min_det_f: self.min_det_f.min(other.min_det_f),
            inverted: self.inverted + other.inverted,
            first_inverted,
            max_rotation_increment: self
                .max_rotation_increment
                .max(other.max_rotation_increment),
            large_rotations: self.large_rotations + other.large_rotations,
        }
    }

    /// Fails when any processed quadrature point ended the step inverted.
    pub fn check_volume(&self) -> Result<()> {
        match self.first_inverted {
            None => Ok(()),
            Some((element, point, det_f)) => {
                log::warn!(
                    "{} inverted quadrature points, first in element {element} (det F = {det_f:e})",
                    self.inverted
                );
                Err(KernelError::NonPositiveJacobian {
                    element,
                    point,
                    det_f,
                })
            }
        }
    }
}

enum Executor {
    Sequential,
    Global,
    Pool(rayon::ThreadPool),
}

/// Runs element loops under an [`ExecutionPolicy`].
pub struct Dispatcher {
    policy: ExecutionPolicy,
    executor: Executor,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("policy", &self.policy)
            .finish()
    }
}

impl Dispatcher {
    pub fn new(policy: ExecutionPolicy) -> Result<Self> {
        let executor = match policy {
            ExecutionPolicy::Sequential => Executor::Sequential,
            ExecutionPolicy::Threaded => Executor::Global,
            ExecutionPolicy::ThreadPool { threads } => {
                if threads == 0 {
                    return Err(KernelError::InvalidParameter(
                        "thread pool needs at least one thread".to_string(),
                    ));
                }
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(threads)
                    .build()
                    .map_err(|e| KernelError::InvalidParameter(e.to_string()))?;
                Executor::Pool(pool)
            }
        };
        log::debug!("dispatcher with {policy} policy");
        Ok(Self { policy, executor })
    }

    pub fn policy(&self) -> ExecutionPolicy {
        self.policy
    }

    /// Calls `f` once for every index in `set` and merges the reports.
    ///
    /// The first error aborts the loop. Under a parallel policy other indices may already have
    /// been processed when it is returned.
    pub fn for_each_element<F>(&self, set: &ElementSet, f: F) -> Result<StepReport>
    where
        F: Fn(usize) -> Result<StepReport> + Sync + Send,
    {
        match &self.executor {
            Executor::Sequential => set
                .iter()
                .try_fold(StepReport::default(), |acc, k| Ok(acc.merge(f(k)?))),
            Executor::Global => parallel(set, &f),
            Executor::Pool(pool) => pool.install(|| parallel(set, &f)),
        }
    }
}

fn parallel<F>(set: &ElementSet, f: &F) -> Result<StepReport>
where
    F: Fn(usize) -> Result<StepReport> + Sync + Send,
{
    match &set.0 {
        Indices::Range(range) => range
            .clone()
            .into_par_iter()
            .map(f)
            .try_reduce(StepReport::default, |a, b| Ok(a.merge(b))),
        Indices::List(list) => list
            .par_iter()
            .map(|&k| f(k))
            .try_reduce(StepReport::default, |a, b| Ok(a.merge(b))),
    }
}
