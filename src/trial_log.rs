//! Trial prompts and the per-session label log.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;

use crate::error::PipelineError;

/// Conversation topics offered to the subject.
pub const TOPICS: [&str; 11] = [
    "Success",
    "Work",
    "Education",
    "Hobbies",
    "Family",
    "Travel",
    "Food",
    "Pets",
    "Movies",
    "Music",
    "Future Goals/Dreams",
];

pub const TRUTH_VALUES: [&str; 2] = ["fact", "lie"];

/// One randomly drawn instruction for the subject.
#[derive(Clone, Copy, Debug)]
pub struct TrialPrompt {
    pub topic: &'static str,
    pub truth_value: &'static str,
}

impl TrialPrompt {
    pub fn random(rng: &mut impl Rng) -> Self {
        // Both slices are non-empty constants.
        let topic = TOPICS.choose(rng).copied().unwrap_or(TOPICS[0]);
        let truth_value = TRUTH_VALUES.choose(rng).copied().unwrap_or(TRUTH_VALUES[0]);
        Self { topic, truth_value }
    }

    pub fn instruction(&self) -> String {
        format!("Please tell a {} about {}.", self.truth_value, self.topic)
    }
}

/// One labeled row of the session log.
#[derive(Debug, Clone, Serialize)]
pub struct TrialRecord {
    pub time: f64,
    pub topic: String,
    pub truth_value: String,
}

/// Accumulates the session's prompts and writes them out once, as a
/// timestamped CSV. Owned by the presenting window rather than living in a
/// process-wide table, so nothing outlives the app that collected it.
#[derive(Debug, Default)]
pub struct TrialLog {
    records: Vec<TrialRecord>,
    flushed: bool,
}

impl TrialLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, prompt: &TrialPrompt) {
        self.records.push(TrialRecord {
            time: unix_time(),
            topic: prompt.topic.to_string(),
            truth_value: prompt.truth_value.to_string(),
        });
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[TrialRecord] {
        &self.records
    }

    /// Writes `trial_<date>_<unixtime>.csv` into `dir` and marks the log
    /// flushed; later calls (and flushes of an empty log) are no-ops.
    pub fn flush_csv(&mut self, dir: &Path) -> Result<Option<PathBuf>, PipelineError> {
        if self.flushed || self.records.is_empty() {
            return Ok(None);
        }
        let filename = format!(
            "trial_{}_{}.csv",
            chrono::Local::now().format("%Y-%m-%d"),
            unix_time() as u64
        );
        let path = dir.join(filename);
        let mut writer = csv::Writer::from_path(&path)?;
        for record in &self.records {
            writer.serialize(record)?;
        }
        writer.flush()?;
        self.flushed = true;
        Ok(Some(path))
    }
}

fn unix_time() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_draws_from_the_fixed_decks() {
        let mut rng = rand::thread_rng();
        for _ in 0..50 {
            let prompt = TrialPrompt::random(&mut rng);
            assert!(TOPICS.contains(&prompt.topic));
            assert!(TRUTH_VALUES.contains(&prompt.truth_value));
        }
    }

    #[test]
    fn instruction_reads_like_the_prompt_screen() {
        let prompt = TrialPrompt {
            topic: "Travel",
            truth_value: "lie",
        };
        assert_eq!(prompt.instruction(), "Please tell a lie about Travel.");
    }

    #[test]
    fn flush_writes_header_and_rows_once() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = TrialLog::new();
        let mut rng = rand::thread_rng();
        log.push(&TrialPrompt::random(&mut rng));
        log.push(&TrialPrompt::random(&mut rng));

        let path = log.flush_csv(dir.path()).unwrap().expect("path");
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("time,topic,truth_value"));
        assert_eq!(text.lines().count(), 3);

        // Second flush is a no-op.
        assert!(log.flush_csv(dir.path()).unwrap().is_none());
    }

    #[test]
    fn empty_log_never_touches_disk() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = TrialLog::new();
        assert!(log.flush_csv(dir.path()).unwrap().is_none());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
