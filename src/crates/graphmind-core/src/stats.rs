//! Usage statistics: per-call records and the append-only JSON-Lines log.
//!
//! Every oracle and tool invocation appends one [`UsageRecord`] line to the
//! statistics file. The [`UsageStatistics::aggregate`] pass reads the log
//! back and writes per-function plus grand totals; running it twice over
//! the same log yields identical output.

use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

/// Errors from the statistics log.
#[derive(Debug, Error)]
pub enum StatsError {
    #[error("statistics I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("statistics log line is not valid JSON: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// One usage entry: a function invocation with its model, token counts
/// and cost. Field names are fixed by the on-disk log format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageRecord {
    #[serde(rename = "FunctionName")]
    pub function_name: String,

    /// Seconds since the UNIX epoch.
    #[serde(rename = "StartTime")]
    pub start_time: f64,

    #[serde(rename = "EndTime")]
    pub end_time: f64,

    #[serde(rename = "Model")]
    pub model: Option<String>,

    #[serde(rename = "PromptTokens")]
    pub prompt_tokens: u64,

    #[serde(rename = "CompletionTokens")]
    pub completion_tokens: u64,

    #[serde(rename = "Cost")]
    pub cost: f64,
}

/// Aggregated totals for one function (or the grand total).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageTotals {
    #[serde(rename = "TotalPromptTokens")]
    pub prompt_tokens: u64,

    #[serde(rename = "TotalCompletionTokens")]
    pub completion_tokens: u64,

    #[serde(rename = "TotalCost")]
    pub cost: f64,

    #[serde(rename = "TotalDuration")]
    pub duration: f64,
}

impl UsageTotals {
    fn add(&mut self, record: &UsageRecord) {
        self.prompt_tokens += record.prompt_tokens;
        self.completion_tokens += record.completion_tokens;
        self.cost += record.cost;
        self.duration += record.end_time - record.start_time;
    }
}

/// Append-only JSON-Lines usage log.
///
/// Each record is written as one line in a single `write_all`, so
/// concurrent writers interleave at line granularity.
#[derive(Debug, Clone)]
pub struct UsageStatistics {
    path: PathBuf,
}

impl UsageStatistics {
    /// Open (and create if needed) the statistics log at `path`,
    /// creating parent directories.
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, StatsError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        Ok(Self { path })
    }

    /// Path of the underlying log file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record as a single JSON line.
    pub fn log(&self, record: &UsageRecord) -> Result<(), StatsError> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        file.write_all(line.as_bytes())?;
        Ok(())
    }

    /// Convenience wrapper building the record from raw fields.
    #[allow(clippy::too_many_arguments)]
    pub fn log_call(
        &self,
        function_name: &str,
        start_time: f64,
        end_time: f64,
        model: Option<&str>,
        prompt_tokens: u64,
        completion_tokens: u64,
        cost: f64,
    ) -> Result<(), StatsError> {
        self.log(&UsageRecord {
            function_name: function_name.to_string(),
            start_time,
            end_time,
            model: model.map(str::to_string),
            prompt_tokens,
            completion_tokens,
            cost,
        })
    }

    /// Read a log back and compute per-function totals plus the grand
    /// total under the key `FinalTotal`, writing them as pretty JSON.
    pub fn aggregate(
        input_log: impl AsRef<Path>,
        output_file: impl AsRef<Path>,
    ) -> Result<BTreeMap<String, UsageTotals>, StatsError> {
        let totals = Self::compute_totals(input_log)?;

        let json = serde_json::to_string_pretty(&totals)?;
        fs::write(output_file.as_ref(), json)?;
        info!(output = %output_file.as_ref().display(), "Wrote aggregated usage totals");

        Ok(totals)
    }

    /// Compute totals without writing them out.
    pub fn compute_totals(
        input_log: impl AsRef<Path>,
    ) -> Result<BTreeMap<String, UsageTotals>, StatsError> {
        let file = fs::File::open(input_log.as_ref())?;
        let reader = BufReader::new(file);

        let mut totals: BTreeMap<String, UsageTotals> = BTreeMap::new();
        let mut final_total = UsageTotals::default();

        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let record: UsageRecord = serde_json::from_str(&line)?;
            totals.entry(record.function_name.clone()).or_default().add(&record);
            final_total.add(&record);
        }

        totals.insert("FinalTotal".to_string(), final_total);
        Ok(totals)
    }
}

/// Current wall-clock time as float seconds since the UNIX epoch.
pub fn epoch_seconds() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn record(name: &str, start: f64, end: f64, prompt: u64, completion: u64, cost: f64) -> UsageRecord {
        UsageRecord {
            function_name: name.to_string(),
            start_time: start,
            end_time: end,
            model: Some("test-model".to_string()),
            prompt_tokens: prompt,
            completion_tokens: completion,
            cost,
        }
    }

    #[test]
    fn log_appends_one_json_line_per_record() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("usage.jsonl");
        let stats = UsageStatistics::new(&path).unwrap();

        stats.log(&record("f1", 0.0, 1.0, 10, 5, 0.01)).unwrap();
        stats.log(&record("f2", 1.0, 2.0, 20, 10, 0.02)).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("\"FunctionName\":\"f1\""));
        assert!(lines[1].contains("\"PromptTokens\":20"));
    }

    #[test]
    fn aggregate_sums_per_function_and_grand_total() {
        let dir = tempdir().unwrap();
        let log = dir.path().join("usage.jsonl");
        let out = dir.path().join("totals.json");
        let stats = UsageStatistics::new(&log).unwrap();

        stats.log(&record("f1", 0.0, 1.0, 10, 5, 0.01)).unwrap();
        stats.log(&record("f1", 1.0, 3.0, 10, 5, 0.01)).unwrap();
        stats.log(&record("f2", 0.0, 0.5, 7, 3, 0.02)).unwrap();

        let totals = UsageStatistics::aggregate(&log, &out).unwrap();

        let f1 = &totals["f1"];
        assert_eq!(f1.prompt_tokens, 20);
        assert_eq!(f1.completion_tokens, 10);
        assert!((f1.duration - 3.0).abs() < 1e-9);

        let grand = &totals["FinalTotal"];
        assert_eq!(grand.prompt_tokens, 27);
        assert_eq!(grand.completion_tokens, 13);
        assert!((grand.cost - 0.04).abs() < 1e-9);

        assert!(out.exists());
    }

    #[test]
    fn aggregate_is_idempotent() {
        let dir = tempdir().unwrap();
        let log = dir.path().join("usage.jsonl");
        let stats = UsageStatistics::new(&log).unwrap();
        stats.log(&record("f1", 0.0, 1.0, 10, 5, 0.01)).unwrap();

        let first = UsageStatistics::compute_totals(&log).unwrap();
        let second = UsageStatistics::compute_totals(&log).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn aggregate_skips_blank_lines() {
        let dir = tempdir().unwrap();
        let log = dir.path().join("usage.jsonl");
        let stats = UsageStatistics::new(&log).unwrap();
        stats.log(&record("f1", 0.0, 1.0, 1, 1, 0.0)).unwrap();
        {
            let mut file = OpenOptions::new().append(true).open(&log).unwrap();
            file.write_all(b"\n").unwrap();
        }

        let totals = UsageStatistics::compute_totals(&log).unwrap();
        assert_eq!(totals["FinalTotal"].prompt_tokens, 1);
    }
}
