use crate::tensor::{trace, Tensor3};
use nalgebra::SVector;

/// Symmetric tensor packed by lower triangle, row by row: `[xx, yx, yy, zx, zy, zz]`.
pub type Packed = SVector<f64, 6>;

/// Packs the lower triangle of `tensor`. The upper triangle is ignored.
pub fn tensor_to_packed(tensor: &Tensor3) -> Packed {
    Packed::new(
        tensor.m11, tensor.m21, tensor.m22, tensor.m31, tensor.m32, tensor.m33,
    )
}

pub fn packed_to_tensor(packed: &Packed) -> Tensor3 {
    Tensor3::new(
        packed[0], packed[1], packed[3], //
        packed[1], packed[2], packed[4], //
        packed[3], packed[4], packed[5],
    )
}

/// Mean of the diagonal, `tr(A)/3`.
pub fn volumetric(tensor: &Tensor3) -> f64 {
    trace(tensor) / 3.0
}

pub fn add_volumetric(tensor: &mut Tensor3, p: f64) {
    tensor.m11 += p;
    tensor.m22 += p;
    tensor.m33 += p;
}

pub fn deviatoric(tensor: &Tensor3) -> Tensor3 {
    let mut dev = *tensor;
    add_volumetric(&mut dev, -volumetric(tensor));
    dev
}

/// Splits `tensor` into its mean part and its trace-free part.
pub fn decomposition(tensor: &Tensor3) -> (f64, Tensor3) {
    let p = volumetric(tensor);
    let mut dev = *tensor;
    add_volumetric(&mut dev, -p);
    (p, dev)
}

/// Von Mises equivalent of a deviatoric tensor, `sqrt(3/2 s:s)`.
pub fn equivalent(dev: &Tensor3) -> f64 {
    (1.5 * dev.norm_squared()).sqrt()
}

/// Stress at one material point, stored as a deviatoric/mean split.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StressState {
    pub dev: Packed,
    pub mean: f64,
}

impl StressState {
    pub fn new(dev: Packed, mean: f64) -> Self {
        Self { dev, mean }
    }

    /// Splits a full symmetric Cauchy stress.
    pub fn from_tensor(sigma: &Tensor3) -> Self {
        let (mean, dev) = decomposition(sigma);
        Self {
            dev: tensor_to_packed(&dev),
            mean,
        }
    }

    pub fn dev_tensor(&self) -> Tensor3 {
        packed_to_tensor(&self.dev)
    }

    /// Reassembles the full Cauchy stress `s + p·I`.
    pub fn total(&self) -> Tensor3 {
        let mut sigma = self.dev_tensor();
        add_volumetric(&mut sigma, self.mean);
        sigma
    }
}
