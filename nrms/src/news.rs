use candle_core::{Result, Tensor, D};
use candle_nn::{embedding, linear, Dropout, Embedding, Linear, Module, VarBuilder};

use crate::attention::{AdditiveAttention, SelfAttention};
use crate::hparams::Hparams;

/// Learned age signal. Article ages in days are projected to half the
/// article-vector width, concatenated onto the vector and projected back.
#[derive(Debug)]
pub struct RecencyEmbedding {
    pub(crate) proj: Linear,
    pub(crate) combine: Linear,
}

impl RecencyEmbedding {
    pub fn new(dim: usize, vs: &VarBuilder) -> Result<Self> {
        let half = dim / 2;
        Ok(Self {
            proj: linear(1, half, vs.pp("proj"))?,
            combine: linear(dim + half, dim, vs.pp("combine"))?,
        })
    }

    /// x: (batch, dim), ages: `batch` elements -> (batch, dim).
    pub fn forward(&self, x: &Tensor, ages: &Tensor) -> Result<Tensor> {
        let batch = x.dim(0)?;
        let time = self.proj.forward(&ages.reshape((batch, 1))?)?.tanh()?;
        self.combine.forward(&Tensor::cat(&[x, &time], D::Minus1)?)
    }
}

/// Encodes one article title into a fixed-width vector: word embeddings,
/// word-level self-attention, attention pooling, optional recency fusion.
#[derive(Debug)]
pub struct NewsEncoder {
    pub(crate) embedding: Embedding,
    dropout: Dropout,
    attention: SelfAttention,
    pooling: AdditiveAttention,
    recency: RecencyEmbedding,
}

impl NewsEncoder {
    pub fn new(hparams: &Hparams, vocab_size: usize, embed_dim: usize, vs: &VarBuilder) -> Result<Self> {
        Ok(Self {
            embedding: embedding(vocab_size, embed_dim, vs.pp("embedding"))?,
            dropout: Dropout::new(hparams.dropout),
            attention: SelfAttention::new(embed_dim, hparams, &vs.pp("attention"))?,
            pooling: AdditiveAttention::new(hparams.output_dim(), hparams, &vs.pp("pooling"))?,
            recency: RecencyEmbedding::new(hparams.output_dim(), &vs.pp("recency"))?,
        })
    }

    /// tokens: (batch, title_len) token ids, id 0 is padding and attends
    /// like any other token. ages: optional per-article age in days.
    /// Returns (batch, output_dim).
    pub fn forward(&self, tokens: &Tensor, ages: Option<&Tensor>, train: bool) -> Result<Tensor> {
        let x = self.dropout.forward(&self.embedding.forward(tokens)?, train)?;
        let x = self.attention.forward(&x, &x, &x, train)?;
        let x = self.pooling.forward(&x, train)?;
        match ages {
            Some(ages) => self.recency.forward(&x, ages),
            None => Ok(x),
        }
    }
}

#[cfg(test)]
mod tests {
    use candle_core::{DType, Device, Tensor};
    use candle_nn::{VarBuilder, VarMap};

    use super::*;

    fn hparams() -> Hparams {
        Hparams {
            head_num: 2,
            head_dim: 4,
            attention_hidden_dim: 8,
            dropout: 0.0,
        }
    }

    fn encoder() -> NewsEncoder {
        let varmap = VarMap::new();
        let vs = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        NewsEncoder::new(&hparams(), 50, 6, &vs.pp("news_encoder")).unwrap()
    }

    fn token_batch() -> Tensor {
        Tensor::from_vec(
            vec![1u32, 2, 3, 0, 0, 7, 8, 9, 10, 11, 0, 0, 0, 0, 0],
            (3, 5),
            &Device::Cpu,
        )
        .unwrap()
    }

    #[test]
    fn test_encodes_articles_to_vectors() {
        let encoder = encoder();

        let y = encoder.forward(&token_batch(), None, false).unwrap();

        assert_eq!(y.dims(), &[3, 8]);
        for value in y.flatten_all().unwrap().to_vec1::<f32>().unwrap() {
            assert!(value.is_finite());
        }
    }

    #[test]
    fn test_age_fusion_keeps_width() {
        let encoder = encoder();
        let ages = Tensor::from_vec(vec![0.5f32, 3.0, 40.0], 3, &Device::Cpu).unwrap();

        let y = encoder.forward(&token_batch(), Some(&ages), false).unwrap();

        assert_eq!(y.dims(), &[3, 8]);
    }

    #[test]
    fn test_age_fusion_changes_encoding() {
        let encoder = encoder();
        let ages = Tensor::from_vec(vec![0.0f32, 1.0, 10.0], 3, &Device::Cpu).unwrap();

        let plain = encoder.forward(&token_batch(), None, false).unwrap();
        let fused = encoder.forward(&token_batch(), Some(&ages), false).unwrap();

        let plain = plain.flatten_all().unwrap().to_vec1::<f32>().unwrap();
        let fused = fused.flatten_all().unwrap().to_vec1::<f32>().unwrap();
        let max_diff = plain
            .iter()
            .zip(fused.iter())
            .map(|(p, f)| (p - f).abs())
            .fold(0f32, f32::max);
        assert!(max_diff > 1e-6, "age fusion left the encoding unchanged");
    }

    #[test]
    fn test_recency_embedding_shape() {
        let varmap = VarMap::new();
        let vs = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        let recency = RecencyEmbedding::new(8, &vs.pp("recency")).unwrap();

        let x = Tensor::randn(0f32, 1f32, (4, 8), &Device::Cpu).unwrap();
        let ages = Tensor::from_vec(vec![0.0f32, 0.25, 2.0, 365.0], 4, &Device::Cpu).unwrap();

        let y = recency.forward(&x, &ages).unwrap();

        assert_eq!(y.dims(), &[4, 8]);
    }
}
