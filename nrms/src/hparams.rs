use std::fs;
use std::io;
use std::path::Path;

use candle_core::Result;
use serde::{Deserialize, Serialize};

/// Model hyper-parameters. Missing fields fall back to their defaults,
/// so a config file only needs to list what it overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Hparams {
    pub head_num: usize,
    pub head_dim: usize,
    pub attention_hidden_dim: usize,
    pub dropout: f32,
}

impl Default for Hparams {
    fn default() -> Self {
        Self {
            head_num: 16,
            head_dim: 16,
            attention_hidden_dim: 200,
            dropout: 0.2,
        }
    }
}

impl Hparams {
    /// Width of every article and user vector produced by the model.
    pub fn output_dim(&self) -> usize {
        self.head_num * self.head_dim
    }

    pub fn validate(&self) -> Result<()> {
        if self.head_num == 0 || self.head_dim == 0 {
            candle_core::bail!("head_num and head_dim must be nonzero");
        }
        if self.output_dim() % 2 != 0 {
            candle_core::bail!(
                "head_num * head_dim must be even, got {}",
                self.output_dim()
            );
        }
        if self.attention_hidden_dim == 0 {
            candle_core::bail!("attention_hidden_dim must be nonzero");
        }
        if !(0.0..1.0).contains(&self.dropout) {
            candle_core::bail!("dropout must be in [0, 1), got {}", self.dropout);
        }
        Ok(())
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let raw = fs::read_to_string(path)?;
        serde_json::from_str(&raw).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }
}
