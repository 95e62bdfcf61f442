use candle_core::{Result, Tensor};
use candle_nn::VarBuilder;

use crate::attention::{AdditiveAttention, SelfAttention};
use crate::hparams::Hparams;

/// Builds a user vector from the encoded articles of the reading history,
/// attending across history positions instead of words.
#[derive(Debug)]
pub struct UserEncoder {
    attention: SelfAttention,
    pooling: AdditiveAttention,
}

impl UserEncoder {
    pub fn new(hparams: &Hparams, vs: &VarBuilder) -> Result<Self> {
        let dim = hparams.output_dim();
        Ok(Self {
            attention: SelfAttention::new(dim, hparams, &vs.pp("attention"))?,
            pooling: AdditiveAttention::new(dim, hparams, &vs.pp("pooling"))?,
        })
    }

    /// news_vectors: (batch, history_len, output_dim) -> (batch, output_dim).
    pub fn forward(&self, news_vectors: &Tensor, train: bool) -> Result<Tensor> {
        let x = self
            .attention
            .forward(news_vectors, news_vectors, news_vectors, train)?;
        self.pooling.forward(&x, train)
    }
}

#[cfg(test)]
mod tests {
    use candle_core::{DType, Device, Tensor};
    use candle_nn::{VarBuilder, VarMap};

    use super::*;

    #[test]
    fn test_pools_history_to_user_vector() {
        let hparams = Hparams {
            head_num: 2,
            head_dim: 4,
            attention_hidden_dim: 8,
            dropout: 0.0,
        };
        let varmap = VarMap::new();
        let vs = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        let encoder = UserEncoder::new(&hparams, &vs.pp("user_encoder")).unwrap();

        let history = Tensor::randn(0f32, 1f32, (2, 6, 8), &Device::Cpu).unwrap();
        let user = encoder.forward(&history, false).unwrap();

        assert_eq!(user.dims(), &[2, 8]);
    }
}
