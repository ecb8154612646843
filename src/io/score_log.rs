//! Score egress - writes published score updates to file
//!
//! Updates are written in JSONL format (one JSON object per line)
//! to the file specified in config.

use crate::domain::score::ScoreUpdate;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use tracing::{debug, error, info};

/// Egress writer for score updates
pub struct ScoreLog {
    file_path: String,
}

impl ScoreLog {
    pub fn new(file_path: &str) -> Self {
        info!(file_path = %file_path, "score_log_initialized");
        Self { file_path: file_path.to_string() }
    }

    /// Write a score update to the egress file
    /// Returns true if successful, false otherwise
    pub fn write_update(&self, update: &ScoreUpdate) -> bool {
        let json = match serde_json::to_string(update) {
            Ok(json) => json,
            Err(e) => {
                error!(contestant = %update.contestant_id, error = %e, "score_serialize_failed");
                return false;
            }
        };

        match self.append_line(&json) {
            Ok(()) => {
                debug!(
                    contestant = %update.contestant_id,
                    score = %update.score,
                    state = %update.tracking_state,
                    "score_update_written"
                );
                true
            }
            Err(e) => {
                error!(
                    contestant = %update.contestant_id,
                    error = %e,
                    "score_write_failed"
                );
                false
            }
        }
    }

    /// Append a line to the egress file
    fn append_line(&self, line: &str) -> std::io::Result<()> {
        let path = Path::new(&self.file_path);

        // Create parent directories if they don't exist
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut file = OpenOptions::new().create(true).append(true).open(path)?;

        writeln!(file, "{}", line)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::score::ScoreLogEntry;
    use crate::domain::types::ContestantId;
    use chrono::{TimeZone, Utc};
    use std::fs;
    use tempfile::tempdir;

    fn update(score: f64) -> ScoreUpdate {
        ScoreUpdate {
            contestant_id: ContestantId::from("dev-1"),
            session: "0190d1f0-0000-7000-8000-000000000000".to_string(),
            ts: 1717232401000,
            score,
            tracking_state: "tracking".to_string(),
            current_leg: "TP1".to_string(),
            last_gate: "SP".to_string(),
            score_log: vec![ScoreLogEntry {
                points: score,
                message: "missed gate TP1".to_string(),
                time: Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 1).unwrap(),
            }],
        }
    }

    #[test]
    fn test_write_update() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("scores.jsonl");
        let log = ScoreLog::new(file_path.to_str().unwrap());

        assert!(log.write_update(&update(100.0)));

        let content = fs::read_to_string(&file_path).unwrap();
        assert!(content.ends_with('\n'));
        let parsed: serde_json::Value = serde_json::from_str(content.trim()).unwrap();
        assert_eq!(parsed["contestantId"], "dev-1");
        assert_eq!(parsed["score"], 100.0);
        assert_eq!(parsed["trackingState"], "tracking");
    }

    #[test]
    fn test_append_mode() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("scores.jsonl");
        let log = ScoreLog::new(file_path.to_str().unwrap());

        log.write_update(&update(0.0));
        log.write_update(&update(100.0));

        let content = fs::read_to_string(&file_path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        for line in lines {
            let _parsed: serde_json::Value = serde_json::from_str(line).unwrap();
        }
    }

    #[test]
    fn test_creates_parent_directories() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("nested").join("dir").join("scores.jsonl");
        let log = ScoreLog::new(nested.to_str().unwrap());

        assert!(log.write_update(&update(4.0)));
        assert!(nested.exists());
    }
}
