mod args;
mod records;

use args::Args;
use candle_core::{DType, Device, Result as CandleResult};
use candle_nn::{VarBuilder, VarMap};
use chrono::{DateTime, Utc};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use log::LevelFilter;
use nrms::{device, embeddings, inputs, Hparams, Nrms};
use records::Impression;
use simplelog::{Config, SimpleLogger};
use std::error::Error;

fn main() -> Result<(), Box<dyn Error>> {
    let args = init()?;

    let hparams = match &args.hparams {
        Some(path) => Hparams::from_file(path)?,
        None => Hparams::default(),
    };

    let device = device::get_device()?;
    if device.is_cuda() {
        log::info!("Using CUDA");
    } else if device.is_metal() {
        log::info!("Using Metal");
    } else {
        log::info!("Using CPU");
    }

    let matrix = embeddings::load_word_embeddings(&args.embeddings, &device)?;
    let (vocab_size, embed_dim) = matrix.dims2()?;
    log::info!("Loaded word embeddings: {} tokens x {} dims", vocab_size, embed_dim);

    let (model, mut varmap) = create_model(&hparams, vocab_size, embed_dim, &device)?;
    embeddings::install_word_embeddings(&varmap, &matrix)?;

    if let Some(path) = &args.weights {
        varmap.load(path)?;
        log::info!("Loaded model weights from {}", path.display());
    }

    let impressions = records::read_impressions(&args.impressions)?;
    log::info!("Loaded {} impressions", impressions.len());

    let now = args.now.unwrap_or_else(Utc::now);

    let progress = ProgressBar::new(impressions.len() as u64);
    progress.set_style(
        ProgressStyle::default_bar()
            .template(" {spinner:.cyan} {pos}/{len} [{wide_bar:.cyan/blue}] {eta_precise} | {msg}")
            .unwrap(),
    );

    for impression in &impressions {
        progress.set_message(impression.id.clone());
        score_impression(&model, impression, &args, now, &device)?;
        progress.inc(1);
    }
    progress.finish();

    Ok(())
}

fn score_impression(
    model: &Nrms,
    impression: &Impression,
    args: &Args,
    now: DateTime<Utc>,
    device: &Device,
) -> Result<(), Box<dyn Error>> {
    if impression.candidates.is_empty() {
        log::warn!("{}: no candidates, skipping", impression.id);
        return Ok(());
    }

    let history =
        inputs::stack_titles(&impression.history, args.history_len, args.title_len, device)?
            .unsqueeze(0)?;
    let history_ages = if impression.history_published_at.is_empty() {
        None
    } else {
        let ages = records::ages_in_days(&impression.history_published_at, now);
        Some(inputs::stack_ages(&ages, args.history_len, device)?.unsqueeze(0)?)
    };

    let candidate_len = impression.candidates.len();
    let candidates =
        inputs::stack_titles(&impression.candidates, candidate_len, args.title_len, device)?
            .unsqueeze(0)?;
    let candidate_ages = if impression.candidate_published_at.is_empty() {
        None
    } else {
        let ages = records::ages_in_days(&impression.candidate_published_at, now);
        Some(inputs::stack_ages(&ages, candidate_len, device)?.unsqueeze(0)?)
    };

    let scores = model.forward(
        &history,
        history_ages.as_ref(),
        &candidates,
        candidate_ages.as_ref(),
        false,
    )?;
    let scores = scores.squeeze(0)?.to_vec1::<f32>()?;

    let mut ranked: Vec<(usize, f32)> = scores.into_iter().enumerate().collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
    ranked.truncate(args.top);

    // TODO: add a JSON output mode for downstream services
    let line = ranked
        .iter()
        .map(|(index, score)| format!("{}:{:.4}", index, score))
        .collect::<Vec<_>>()
        .join(" ");
    println!("{} {}", impression.id, line);

    Ok(())
}

fn create_model(
    hparams: &Hparams,
    vocab_size: usize,
    embed_dim: usize,
    device: &Device,
) -> CandleResult<(Nrms, VarMap)> {
    let varmap = VarMap::new();
    let vs = VarBuilder::from_varmap(&varmap, DType::F32, device);
    let model = Nrms::new(hparams, vocab_size, embed_dim, &vs)?;
    Ok((model, varmap))
}

fn init() -> Result<Args, Box<dyn Error>> {
    let args = Args::parse();
    SimpleLogger::init(LevelFilter::Info, Config::default())?;

    Ok(args)
}
