use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Deserialize;

/// One impression to score: a user's tokenized reading history and the
/// candidate pool shown alongside it. Publication times are optional and
/// positional, aligned with their title list.
#[derive(Debug, Clone, Deserialize)]
pub struct Impression {
    pub id: String,
    #[serde(default)]
    pub history: Vec<Vec<u32>>,
    #[serde(default)]
    pub history_published_at: Vec<DateTime<Utc>>,
    pub candidates: Vec<Vec<u32>>,
    #[serde(default)]
    pub candidate_published_at: Vec<DateTime<Utc>>,
}

impl Impression {
    /// A non-empty timestamp list is positional and must pair one entry
    /// per title.
    fn check_alignment(&self) -> Result<(), String> {
        if !self.history_published_at.is_empty()
            && self.history_published_at.len() != self.history.len()
        {
            return Err(format!(
                "{}: {} history timestamps for {} titles",
                self.id,
                self.history_published_at.len(),
                self.history.len()
            ));
        }
        if !self.candidate_published_at.is_empty()
            && self.candidate_published_at.len() != self.candidates.len()
        {
            return Err(format!(
                "{}: {} candidate timestamps for {} titles",
                self.id,
                self.candidate_published_at.len(),
                self.candidates.len()
            ));
        }
        Ok(())
    }
}

pub fn read_impressions<P: AsRef<Path>>(path: P) -> io::Result<Vec<Impression>> {
    let file = File::open(path)?;
    let mut impressions = Vec::new();

    for (number, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let invalid = |e: String| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("line {}: {}", number + 1, e),
            )
        };
        let impression: Impression =
            serde_json::from_str(&line).map_err(|e| invalid(e.to_string()))?;
        impression.check_alignment().map_err(invalid)?;
        impressions.push(impression);
    }

    Ok(impressions)
}

/// Article ages in fractional days relative to `now`. Articles dated in
/// the future read as age 0.
pub fn ages_in_days(published: &[DateTime<Utc>], now: DateTime<Utc>) -> Vec<f32> {
    published
        .iter()
        .map(|t| ((now - *t).num_seconds() as f32 / 86_400.0).max(0.0))
        .collect()
}
