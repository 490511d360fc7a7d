//! Per-question result records and where they are written.

use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::{Result, TogError};
use crate::reasoning::ReasoningChain;

/// One line of the results file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputRecord {
    pub question: String,
    /// `None` when answer generation failed.
    pub answer: Option<String>,
    pub reasoning_chain: ReasoningChain,
}

/// Destination for finished questions. Each question is appended exactly once.
pub trait OutputSink: Send + Sync {
    fn append(&self, record: &OutputRecord) -> Result<()>;
}

/// Append-only JSON Lines file.
pub struct JsonlSink {
    path: PathBuf,
    file: Mutex<File>,
}

impl JsonlSink {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl OutputSink for JsonlSink {
    fn append(&self, record: &OutputRecord) -> Result<()> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');
        let mut file = self
            .file
            .lock()
            .map_err(|_| TogError::InvalidInput("output file lock poisoned".to_string()))?;
        file.write_all(line.as_bytes())?;
        file.flush()?;
        Ok(())
    }
}

/// Collects records in memory.
#[derive(Default)]
pub struct MemorySink {
    records: Mutex<Vec<OutputRecord>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<OutputRecord> {
        self.records
            .lock()
            .map(|records| records.clone())
            .unwrap_or_default()
    }
}

impl OutputSink for MemorySink {
    fn append(&self, record: &OutputRecord) -> Result<()> {
        self.records
            .lock()
            .map_err(|_| TogError::InvalidInput("record buffer lock poisoned".to_string()))?
            .push(record.clone());
        Ok(())
    }
}
