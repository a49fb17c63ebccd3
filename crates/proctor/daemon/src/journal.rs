//! JSON-lines violation journal.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use proctor_supervisor::{JournalError, ViolationJournal};
use proctor_types::{SessionId, ViolationRecord};
use serde::Serialize;
use tracing::debug;

#[derive(Serialize)]
struct JournalEntry<'a> {
    session_id: &'a SessionId,
    #[serde(flatten)]
    record: &'a ViolationRecord,
}

/// Appends one JSON object per counted violation.
pub struct JsonLinesJournal {
    path: PathBuf,
    file: Mutex<File>,
}

impl JsonLinesJournal {
    pub fn open(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        debug!(path = %path.display(), "Violation journal opened");
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ViolationJournal for JsonLinesJournal {
    fn append(&self, session_id: &SessionId, record: &ViolationRecord) -> Result<(), JournalError> {
        let mut line = serde_json::to_string(&JournalEntry { session_id, record })
            .map_err(|e| JournalError(e.to_string()))?;
        line.push('\n');

        let mut file = self.file.lock();
        file.write_all(line.as_bytes())
            .and_then(|_| file.flush())
            .map_err(|e| JournalError(format!("{}: {}", self.path.display(), e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use proctor_types::DetectorSource;

    fn record(sequence_number: u64) -> ViolationRecord {
        ViolationRecord {
            sequence_number,
            source: DetectorSource::Object,
            label: "mobile phone".into(),
            message: "Warning: Mobile phone detected".into(),
            timestamp: Utc::now(),
            counted: true,
            violation_count: sequence_number as u32,
        }
    }

    #[test]
    fn appends_one_line_per_record() {
        let path = std::env::temp_dir().join(format!("proctor-journal-{}.jsonl", uuid::Uuid::new_v4()));
        let session_id = SessionId::generate();

        {
            let journal = JsonLinesJournal::open(&path).unwrap();
            journal.append(&session_id, &record(1)).unwrap();
            journal.append(&session_id, &record(2)).unwrap();
        }
        // Reopening appends rather than truncating.
        JsonLinesJournal::open(&path)
            .unwrap()
            .append(&session_id, &record(3))
            .unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        std::fs::remove_file(&path).ok();

        let lines: Vec<serde_json::Value> = text
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[2]["sequence_number"], 3);
        assert_eq!(lines[0]["label"], "mobile phone");
        assert_eq!(lines[0]["session_id"], serde_json::to_value(&session_id).unwrap());
    }
}
