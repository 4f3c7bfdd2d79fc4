//! The two learned stages and their shared plumbing.

pub mod dbn;
pub mod mlp;
pub mod traits;

pub use dbn::*;
pub use mlp::*;
pub use traits::*;

use std::path::Path;

use lazy_static::lazy_static;
use tch::{Device, Kind, Tensor};

use crate::board::{FeatureVector, NUM_FEATURE_BITS};
use crate::error::PipelineError;

lazy_static! {
    pub static ref DEVICE: Device = Device::cuda_if_available();
}

/// Stacks encoded positions into an `[n, 337]` float tensor on the model
/// device.
pub fn features_to_tensor(rows: &[FeatureVector]) -> Tensor {
    let mut flat = Vec::with_capacity(rows.len() * NUM_FEATURE_BITS);
    for row in rows {
        flat.extend_from_slice(row);
    }
    Tensor::from_slice(&flat)
        .view([rows.len() as i64, NUM_FEATURE_BITS as i64])
        .to_device(*DEVICE)
}

pub(crate) fn tensor_to_vec(tensor: &Tensor) -> Result<Vec<f32>, PipelineError> {
    let flat = tensor
        .flatten(0, -1)
        .to_kind(Kind::Float)
        .to_device(Device::Cpu);
    Ok(Vec::<f32>::try_from(&flat)?)
}

/// Writes a model artifact through a temp file plus rename, so an
/// interrupted run never leaves a corrupt artifact behind.
pub(crate) fn write_artifact(path: &Path, payload: &[u8]) -> Result<(), PipelineError> {
    let temp_path = path.with_extension("tmp");
    std::fs::write(&temp_path, payload)?;
    std::fs::rename(&temp_path, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::encode;

    #[test]
    fn test_features_to_tensor_shape() {
        let rows = vec![encode("8/8/8/8/8/8/8 r"), encode("w7/8/8/8/8/8/8 g")];
        let tensor = features_to_tensor(&rows);
        assert_eq!(tensor.size(), [2, NUM_FEATURE_BITS as i64]);
        assert_eq!(tensor.sum(Kind::Float).double_value(&[]), 2.0);
    }
}
