//! Error types for the element kernels and constitutive models.

use thiserror::Error;

/// Result type alias using [`KernelError`].
pub type Result<T> = std::result::Result<T, KernelError>;

/// Errors raised by a constitutive model that declines a strain increment.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConstitutiveError {
    /// The strain or rotation increment contains NaN or infinite entries.
    #[error("non-finite strain or rotation increment at material point {point}")]
    NonFiniteIncrement { point: usize },

    /// The return mapping did not converge.
    #[error(
        "return mapping failed at material point {point} after {iterations} iterations (residual {residual:e})"
    )]
    ReturnMappingFailed {
        point: usize,
        iterations: usize,
        residual: f64,
    },

    /// Material parameters are missing or out of range.
    #[error("invalid material parameter: {0}")]
    InvalidParameter(String),
}

/// Errors raised while setting up or running the solid mechanics kernels.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum KernelError {
    /// A material point rejected its increment.
    #[error("constitutive update failed: {0}")]
    Constitutive(#[from] ConstitutiveError),

    /// A quadrature point ended the step with `det(F) <= 0`.
    #[error("non-positive deformation gradient determinant {det_f:e} in element {element}, quadrature point {point}")]
    NonPositiveJacobian {
        element: usize,
        point: usize,
        det_f: f64,
    },

    /// Connectivity references missing or repeated nodes.
    #[error("invalid topology: {0}")]
    InvalidTopology(String),

    /// Element set references elements outside the mesh or repeats an element.
    #[error("invalid element set: {0}")]
    InvalidElementSet(String),

    /// Element-to-material-point map is malformed or out of range.
    #[error("invalid material map: {0}")]
    InvalidMaterialMap(String),

    /// Two quadrature points map to one material point. Each material point is updated once
    /// per call, from the kinematics of its single owner.
    #[error("material point {point} is reached from quadrature points {first} and {second}; shared material points are unsupported, give each quadrature point its own")]
    SharedMaterialPoint {
        point: usize,
        first: usize,
        second: usize,
    },

    /// Kernel or solver parameter out of range.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// An array handed to the kernels has the wrong length.
    #[error("size mismatch for {what}: expected {expected}, found {found}")]
    SizeMismatch {
        what: &'static str,
        expected: usize,
        found: usize,
    },
}

impl KernelError {
    pub(crate) fn check_len(what: &'static str, expected: usize, found: usize) -> Result<()> {
        if expected == found {
            Ok(())
        } else {
            Err(KernelError::SizeMismatch {
                what,
                expected,
                found,
            })
        }
    }
}
