use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use harvest_logging::harvest_debug;
use leaders_core::LeaderAggregate;
use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};
use tempfile::NamedTempFile;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("output directory missing or not writable: {0}")]
    OutputDir(String),
    #[error("failed to serialize aggregate: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// Destination for aggregate snapshots. Every call replaces the previous one.
pub trait AggregateSink: Send + Sync {
    fn persist(&self, aggregate: &LeaderAggregate) -> Result<(), PersistError>;
}

/// Writes the aggregate as a four-space indented UTF-8 JSON object.
///
/// Non-ASCII text is written as-is, not `\u` escaped.
#[derive(Debug, Clone)]
pub struct JsonFileSink {
    writer: AtomicFileWriter,
}

impl JsonFileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            writer: AtomicFileWriter::new(path.into()),
        }
    }

    pub fn path(&self) -> &Path {
        self.writer.target()
    }
}

impl AggregateSink for JsonFileSink {
    fn persist(&self, aggregate: &LeaderAggregate) -> Result<(), PersistError> {
        let content = to_pretty_json(aggregate)?;
        self.writer.write(&content)?;
        harvest_debug!(
            "Wrote {} countries to {:?}",
            aggregate.len(),
            self.writer.target()
        );
        Ok(())
    }
}

pub fn to_pretty_json(aggregate: &LeaderAggregate) -> Result<Vec<u8>, PersistError> {
    let mut out = Vec::new();
    let mut serializer = Serializer::with_formatter(&mut out, PrettyFormatter::with_indent(b"    "));
    aggregate.serialize(&mut serializer)?;
    Ok(out)
}

/// Ensure the parent directory of the output file exists; create if missing.
pub fn ensure_output_dir(dir: &Path) -> Result<(), PersistError> {
    if dir.exists() {
        let meta = fs::metadata(dir).map_err(|e| PersistError::OutputDir(e.to_string()))?;
        if !meta.is_dir() {
            return Err(PersistError::OutputDir("path is not a directory".into()));
        }
    } else {
        fs::create_dir_all(dir).map_err(|e| PersistError::OutputDir(e.to_string()))?;
    }
    Ok(())
}

/// Replaces one file atomically: write a temp file next to it, then rename.
/// Readers see either the previous snapshot or the new one, never a mix.
#[derive(Debug, Clone)]
pub struct AtomicFileWriter {
    target: PathBuf,
}

impl AtomicFileWriter {
    pub fn new(target: PathBuf) -> Self {
        Self { target }
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    pub fn write(&self, content: &[u8]) -> Result<(), PersistError> {
        let dir = match self.target.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        ensure_output_dir(&dir)?;

        let mut tmp = NamedTempFile::new_in(&dir)?;
        tmp.write_all(content)?;
        tmp.flush()?;
        tmp.as_file_mut().sync_all()?;
        tmp.persist(&self.target).map_err(|e| PersistError::Io(e.error))?;
        Ok(())
    }
}
