use candle_core::{Result, Tensor};
use candle_nn::VarBuilder;

use crate::hparams::Hparams;
use crate::news::NewsEncoder;
use crate::user::UserEncoder;

/// Variable path of the word-embedding matrix inside the model's `VarMap`.
pub const WORD_EMBEDDING_VAR: &str = "news_encoder.embedding.weight";

/// Neural news recommender. Candidate articles are scored against a user
/// vector built from the reading history, with a plain dot product.
#[derive(Debug)]
pub struct Nrms {
    pub(crate) news_encoder: NewsEncoder,
    pub(crate) user_encoder: UserEncoder,
}

impl Nrms {
    pub fn new(hparams: &Hparams, vocab_size: usize, embed_dim: usize, vs: &VarBuilder) -> Result<Self> {
        hparams.validate()?;
        Ok(Self {
            news_encoder: NewsEncoder::new(hparams, vocab_size, embed_dim, &vs.pp("news_encoder"))?,
            user_encoder: UserEncoder::new(hparams, &vs.pp("user_encoder"))?,
        })
    }

    /// tokens: (batch, title_len), ages: optional `batch` ages in days.
    /// Returns (batch, output_dim).
    pub fn encode_news(&self, tokens: &Tensor, ages: Option<&Tensor>, train: bool) -> Result<Tensor> {
        self.news_encoder.forward(tokens, ages, train)
    }

    /// history: (batch, history_len, title_len), ages: optional
    /// (batch, history_len) ages in days. Returns (batch, output_dim).
    pub fn encode_user(&self, history: &Tensor, ages: Option<&Tensor>, train: bool) -> Result<Tensor> {
        let (batch, history_len, title_len) = history.dims3()?;
        let flat = history.reshape((batch * history_len, title_len))?;
        let flat_ages = ages.map(|a| a.reshape((batch * history_len,))).transpose()?;

        let vectors = self.news_encoder.forward(&flat, flat_ages.as_ref(), train)?;
        let dim = vectors.dim(1)?;
        self.user_encoder
            .forward(&vectors.reshape((batch, history_len, dim))?, train)
    }

    /// history: (batch, history_len, title_len), candidates:
    /// (batch, candidate_len, title_len), ages as in the encoders.
    /// Returns one score per candidate, (batch, candidate_len).
    pub fn forward(
        &self,
        history: &Tensor,
        history_ages: Option<&Tensor>,
        candidates: &Tensor,
        candidate_ages: Option<&Tensor>,
        train: bool,
    ) -> Result<Tensor> {
        let user = self.encode_user(history, history_ages, train)?;

        let (batch, candidate_len, title_len) = candidates.dims3()?;
        let flat = candidates.reshape((batch * candidate_len, title_len))?;
        let flat_ages = candidate_ages
            .map(|a| a.reshape((batch * candidate_len,)))
            .transpose()?;
        let vectors = self.encode_news(&flat, flat_ages.as_ref(), train)?;
        let dim = vectors.dim(1)?;

        vectors
            .reshape((batch, candidate_len, dim))?
            .matmul(&user.unsqueeze(2)?)?
            .squeeze(2)
    }
}
