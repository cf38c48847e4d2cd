//! Conversation transcripts
//!
//! Every supervisor turn is appended to a daily JSONL file.
//! Format: `history/transcripts/YYYY-MM/YYYY-MM-DD.jsonl`

use chrono::{DateTime, Local, NaiveDate, Utc};
use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

/// One recorded turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    /// Timestamp of the turn (UTC)
    pub timestamp: DateTime<Utc>,
    /// Local timestamp for display
    pub local_time: String,
    pub input: String,
    /// First generator response, before any directive ran
    pub raw_response: String,
    /// `<agent>: <result>` lines from executed directives
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fragments: Vec<String>,
    pub final_response: String,
    pub synthesized: bool,
    pub duration_ms: u64,
}

impl TranscriptEntry {
    pub fn new(input: &str, raw_response: &str, fragments: &[String], final_response: &str) -> Self {
        Self {
            timestamp: Utc::now(),
            local_time: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            input: input.to_string(),
            raw_response: raw_response.to_string(),
            fragments: fragments.to_vec(),
            final_response: final_response.to_string(),
            synthesized: false,
            duration_ms: 0,
        }
    }

    pub fn synthesized(mut self, synthesized: bool) -> Self {
        self.synthesized = synthesized;
        self
    }

    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.duration_ms = duration_ms;
        self
    }
}

/// Daily transcript store
pub struct Transcript {
    base_path: PathBuf,
    enabled: bool,
}

impl Transcript {
    pub fn new(base_path: PathBuf, enabled: bool) -> Self {
        Self { base_path, enabled }
    }

    fn log_path(&self, date: NaiveDate) -> PathBuf {
        self.base_path
            .join("transcripts")
            .join(date.format("%Y-%m").to_string())
            .join(format!("{}.jsonl", date.format("%Y-%m-%d")))
    }

    /// Append a turn to today's transcript
    pub fn record(&self, entry: &TranscriptEntry) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }

        let log_path = self.log_path(Local::now().date_naive());
        if let Some(parent) = log_path.parent() {
            fs::create_dir_all(parent).context("Failed to create transcripts directory")?;
        }

        let json_line = serde_json::to_string(entry).context("Failed to serialize transcript entry")?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
            .with_context(|| format!("Failed to open transcript: {}", log_path.display()))?;

        writeln!(file, "{}", json_line).context("Failed to write transcript entry")?;

        log::debug!("Recorded turn -> {}", log_path.display());
        Ok(())
    }

    /// Entries recorded on `date` (YYYY-MM-DD)
    #[cfg(test)]
    pub fn read_day(&self, date: &str) -> Result<Vec<TranscriptEntry>> {
        let date = NaiveDate::parse_from_str(date, "%Y-%m-%d").context("Invalid date format. Expected YYYY-MM-DD")?;
        let log_path = self.log_path(date);

        if !log_path.exists() {
            return Ok(Vec::new());
        }

        let content = fs::read_to_string(&log_path).context("Failed to read transcript")?;

        let mut entries = Vec::new();
        for line in content.lines() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str(line) {
                Ok(entry) => entries.push(entry),
                Err(e) => log::warn!("Failed to parse transcript line: {}", e),
            }
        }

        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn today() -> String {
        Local::now().format("%Y-%m-%d").to_string()
    }

    #[test]
    fn test_record_and_read_back() {
        let temp = TempDir::new().unwrap();
        let transcript = Transcript::new(temp.path().to_path_buf(), true);

        let entry = TranscriptEntry::new(
            "find readme",
            "AGENT: SEARCH[readme.md]",
            &["alice: Found: readme.md".to_string()],
            "It exists.",
        )
        .synthesized(true)
        .with_duration(12);
        transcript.record(&entry).unwrap();
        transcript.record(&TranscriptEntry::new("hi", "hello", &[], "hello")).unwrap();

        let entries = transcript.read_day(&today()).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0], entry);
        assert!(entries[1].fragments.is_empty());

        let month = Local::now().format("%Y-%m").to_string();
        assert!(temp.path().join("transcripts").join(month).is_dir());
    }

    #[test]
    fn test_disabled_writes_nothing() {
        let temp = TempDir::new().unwrap();
        let transcript = Transcript::new(temp.path().to_path_buf(), false);

        transcript.record(&TranscriptEntry::new("a", "b", &[], "b")).unwrap();
        assert!(!temp.path().join("transcripts").exists());
    }

    #[test]
    fn test_read_missing_day_is_empty() {
        let temp = TempDir::new().unwrap();
        let transcript = Transcript::new(temp.path().to_path_buf(), true);
        assert!(transcript.read_day("2001-01-01").unwrap().is_empty());
        assert!(transcript.read_day("yesterday").is_err());
    }
}
