use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(name = "Frontpage")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Args {
    /// Impressions to score, one JSON record per line.
    #[arg(long)]
    pub impressions: PathBuf,

    /// Pretrained word embeddings (safetensors).
    #[arg(long)]
    pub embeddings: PathBuf,

    /// Hyper-parameter overrides as a JSON file.
    #[arg(long)]
    pub hparams: Option<PathBuf>,

    /// Trained model weights (safetensors) to load over the random init.
    #[arg(long)]
    pub weights: Option<PathBuf>,

    /// Tokens kept per article title.
    #[arg(long, default_value_t = 30)]
    pub title_len: usize,

    /// History slots per user.
    #[arg(long, default_value_t = 50)]
    pub history_len: usize,

    /// Ranked candidates printed per impression.
    #[arg(long, default_value_t = 10)]
    pub top: usize,

    /// Reference instant for article ages (RFC 3339). Defaults to now.
    #[arg(long)]
    pub now: Option<DateTime<Utc>>,
}
