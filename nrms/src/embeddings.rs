use std::path::Path;

use candle_core::{safetensors, DType, Device, Result, Tensor};
use candle_nn::VarMap;

use crate::model::WORD_EMBEDDING_VAR;

/// Tensor name looked up first in an embedding file. A file holding a
/// single unnamed matrix is accepted as a fallback.
pub const WORD_EMBEDDINGS_TENSOR: &str = "word_embeddings";

/// Reads a pretrained word-embedding matrix from a safetensors file and
/// returns it as (vocab_size, embed_dim) f32, row 0 being the padding id.
pub fn load_word_embeddings<P: AsRef<Path>>(path: P, device: &Device) -> Result<Tensor> {
    let path = path.as_ref();
    let mut tensors = safetensors::load(path, device)?;

    let matrix = match tensors.remove(WORD_EMBEDDINGS_TENSOR) {
        Some(matrix) => matrix,
        None => {
            let mut values = tensors.into_values();
            match (values.next(), values.next()) {
                (Some(matrix), None) => matrix,
                _ => candle_core::bail!(
                    "{} holds no '{}' tensor and is not a single-tensor file",
                    path.display(),
                    WORD_EMBEDDINGS_TENSOR
                ),
            }
        }
    };

    let matrix = matrix.to_dtype(DType::F32)?;
    let (vocab_size, embed_dim) = matrix.dims2()?;
    if vocab_size == 0 || embed_dim == 0 {
        candle_core::bail!("embedding matrix in {} is empty", path.display());
    }
    log::debug!(
        "loaded word embeddings from {}: {} x {}",
        path.display(),
        vocab_size,
        embed_dim
    );

    Ok(matrix)
}

/// Overwrites the model's word-embedding variable in place. The variable
/// keeps requiring gradients, so the matrix stays trainable.
pub fn install_word_embeddings(varmap: &VarMap, matrix: &Tensor) -> Result<()> {
    let mut data = varmap.data().lock().unwrap();
    match data.get_mut(WORD_EMBEDDING_VAR) {
        Some(var) => {
            if var.shape() != matrix.shape() {
                candle_core::bail!(
                    "embedding shape {:?} does not match the model's {:?}",
                    matrix.shape(),
                    var.shape()
                );
            }
            var.set(matrix)
        }
        None => candle_core::bail!("model holds no '{}' variable", WORD_EMBEDDING_VAR),
    }
}
