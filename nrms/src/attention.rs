use candle_core::{Result, Tensor, D};
use candle_nn::{linear, linear_no_bias, ops, Dropout, Linear, Module, VarBuilder};

use crate::hparams::Hparams;

/// Multi-head scaled dot-product attention over a token sequence.
///
/// Projects the inputs to `head_num * head_dim` regardless of the input
/// width, so it also acts as the model's dimensionality change.
#[derive(Debug)]
pub struct SelfAttention {
    pub(crate) wq: Linear,
    pub(crate) wk: Linear,
    pub(crate) wv: Linear,
    dropout: Dropout,
    head_num: usize,
    head_dim: usize,
}

impl SelfAttention {
    pub fn new(input_dim: usize, hparams: &Hparams, vs: &VarBuilder) -> Result<Self> {
        let output_dim = hparams.output_dim();
        Ok(Self {
            wq: linear(input_dim, output_dim, vs.pp("wq"))?,
            wk: linear(input_dim, output_dim, vs.pp("wk"))?,
            wv: linear(input_dim, output_dim, vs.pp("wv"))?,
            dropout: Dropout::new(hparams.dropout),
            head_num: hparams.head_num,
            head_dim: hparams.head_dim,
        })
    }

    /// (batch, len, input_dim) -> (batch, len, head_num * head_dim).
    ///
    /// All three inputs must share the same batch and sequence length;
    /// attention weights are dropped out during training, positions are
    /// never masked.
    pub fn forward(&self, q_seq: &Tensor, k_seq: &Tensor, v_seq: &Tensor, train: bool) -> Result<Tensor> {
        let (batch, len, _) = q_seq.dims3()?;

        let q = self.split_heads(&self.wq.forward(q_seq)?, batch, len)?;
        let k = self.split_heads(&self.wk.forward(k_seq)?, batch, len)?;
        let v = self.split_heads(&self.wv.forward(v_seq)?, batch, len)?;

        let scores = (q.matmul(&k.t()?)? / (self.head_dim as f64).sqrt())?;
        let weights = ops::softmax_last_dim(&scores)?;
        let weights = self.dropout.forward(&weights, train)?;

        weights
            .matmul(&v)?
            .transpose(1, 2)?
            .contiguous()?
            .reshape((batch, len, self.head_num * self.head_dim))
    }

    /// (batch, len, heads * head_dim) -> (batch, heads, len, head_dim).
    fn split_heads(&self, x: &Tensor, batch: usize, len: usize) -> Result<Tensor> {
        x.reshape((batch, len, self.head_num, self.head_dim))?
            .transpose(1, 2)?
            .contiguous()
    }
}

/// Additive attention pooling: scores each position with a small MLP and
/// returns the weighted sum of the sequence.
#[derive(Debug)]
pub struct AdditiveAttention {
    pub(crate) w: Linear,
    pub(crate) q: Linear,
    dropout: Dropout,
}

impl AdditiveAttention {
    pub fn new(input_dim: usize, hparams: &Hparams, vs: &VarBuilder) -> Result<Self> {
        Ok(Self {
            w: linear(input_dim, hparams.attention_hidden_dim, vs.pp("w"))?,
            q: linear_no_bias(hparams.attention_hidden_dim, 1, vs.pp("q"))?,
            dropout: Dropout::new(hparams.dropout),
        })
    }

    /// (batch, len, dim) -> (batch, dim).
    pub fn forward(&self, x: &Tensor, train: bool) -> Result<Tensor> {
        let scores = self.q.forward(&self.w.forward(x)?.tanh()?)?;
        let weights = ops::softmax_last_dim(&scores.squeeze(D::Minus1)?)?;
        let pooled = x.broadcast_mul(&weights.unsqueeze(D::Minus1)?)?.sum(1)?;
        self.dropout.forward(&pooled, train)
    }
}

#[cfg(test)]
mod tests {
    use candle_core::{DType, Device, Tensor};
    use candle_nn::{VarBuilder, VarMap};

    use super::*;

    const EPSILON: f32 = 1e-5;

    fn hparams() -> Hparams {
        Hparams {
            head_num: 2,
            head_dim: 4,
            attention_hidden_dim: 8,
            dropout: 0.0,
        }
    }

    fn builder() -> (VarMap, VarBuilder<'static>) {
        let varmap = VarMap::new();
        let vs = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        (varmap, vs)
    }

    fn assert_close(actual: &Tensor, expected: &Tensor, epsilon: f32) {
        let actual = actual.flatten_all().unwrap().to_vec1::<f32>().unwrap();
        let expected = expected.flatten_all().unwrap().to_vec1::<f32>().unwrap();
        assert_eq!(actual.len(), expected.len());
        for (i, (a, e)) in actual.iter().zip(expected.iter()).enumerate() {
            assert!(
                (a - e).abs() < epsilon,
                "element {}: {} does not match {}",
                i,
                a,
                e
            );
        }
    }

    #[test]
    fn test_self_attention_changes_width() {
        let (_varmap, vs) = builder();
        let attention = SelfAttention::new(6, &hparams(), &vs.pp("attention")).unwrap();

        let x = Tensor::randn(0f32, 1f32, (3, 5, 6), &Device::Cpu).unwrap();
        let y = attention.forward(&x, &x, &x, false).unwrap();

        assert_eq!(y.dims(), &[3, 5, 8]);
    }

    #[test]
    fn test_single_position_is_value_projection() {
        // With one position the attention weights collapse to 1.0, so the
        // output must equal the value projection of the input.
        let (_varmap, vs) = builder();
        let attention = SelfAttention::new(8, &hparams(), &vs.pp("attention")).unwrap();

        let x = Tensor::randn(0f32, 1f32, (2, 1, 8), &Device::Cpu).unwrap();
        let y = attention.forward(&x, &x, &x, false).unwrap();
        let expected = attention.wv.forward(&x).unwrap();

        assert_close(&y, &expected, EPSILON);
    }

    #[test]
    fn test_identical_positions_match_value_projection() {
        // With identical positions every softmax row is uniform and sums
        // to 1, so each output position must equal the value projection
        // of the repeated row.
        let (_varmap, vs) = builder();
        let attention = SelfAttention::new(8, &hparams(), &vs.pp("attention")).unwrap();

        let row: Vec<f32> = (0..8).map(|i| i as f32 * 0.25 - 1.0).collect();
        let mut data = Vec::new();
        for _ in 0..4 {
            data.extend_from_slice(&row);
        }
        let x = Tensor::from_vec(data, (1, 4, 8), &Device::Cpu).unwrap();

        let y = attention.forward(&x, &x, &x, false).unwrap();
        let expected = attention.wv.forward(&x).unwrap();

        assert_close(&y, &expected, EPSILON);
    }

    #[test]
    fn test_self_attention_eval_is_deterministic() {
        let (_varmap, vs) = builder();
        let mut hparams = hparams();
        hparams.dropout = 0.5;
        let attention = SelfAttention::new(8, &hparams, &vs.pp("attention")).unwrap();

        let x = Tensor::randn(0f32, 1f32, (2, 4, 8), &Device::Cpu).unwrap();
        let first = attention.forward(&x, &x, &x, false).unwrap();
        let second = attention.forward(&x, &x, &x, false).unwrap();

        assert_close(&first, &second, EPSILON);
    }

    #[test]
    fn test_additive_attention_pools_to_vector() {
        let (_varmap, vs) = builder();
        let pooling = AdditiveAttention::new(8, &hparams(), &vs.pp("pooling")).unwrap();

        let x = Tensor::randn(0f32, 1f32, (3, 5, 8), &Device::Cpu).unwrap();
        let y = pooling.forward(&x, false).unwrap();

        assert_eq!(y.dims(), &[3, 8]);
    }

    #[test]
    fn test_additive_attention_identical_positions() {
        // Every position scores the same, so the weights are uniform and
        // the pooled vector must equal the repeated row.
        let (_varmap, vs) = builder();
        let pooling = AdditiveAttention::new(8, &hparams(), &vs.pp("pooling")).unwrap();

        let row: Vec<f32> = (0..8).map(|i| i as f32 * 0.25 - 1.0).collect();
        let mut data = Vec::new();
        for _ in 0..5 {
            data.extend_from_slice(&row);
        }
        let x = Tensor::from_vec(data, (1, 5, 8), &Device::Cpu).unwrap();
        let expected = Tensor::from_vec(row, (1, 8), &Device::Cpu).unwrap();

        let y = pooling.forward(&x, false).unwrap();
        assert_close(&y, &expected, EPSILON);
    }
}
