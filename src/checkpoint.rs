//! Durable storage for the dataset between runs

use crate::error::ScrapeError;
use crate::record::Dataset;
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use std::{fs, io, path::{Path, PathBuf}};

/// Where the dataset is loaded from and flushed to
pub trait Checkpoint {
    /// Load the stored dataset; absent or unreadable storage yields an empty one
    fn load(&self) -> Dataset;

    /// Replace the stored dataset
    fn persist(&mut self, dataset: &Dataset) -> Result<(), ScrapeError>;

    /// Human readable location, for log lines
    fn describe(&self) -> String;
}

/// Dataset stored as a pretty-printed JSON array
#[derive(Debug, Clone)]
pub struct JsonCheckpoint {
    path: PathBuf,
}

impl JsonCheckpoint {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn io_error(&self, source: io::Error) -> ScrapeError {
        ScrapeError::Checkpoint { path: self.path.clone(), source }
    }
}

impl Checkpoint for JsonCheckpoint {
    fn load(&self) -> Dataset {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Dataset::new(),
            Err(e) => {
                log::warn!("Could not read {}, starting empty: {}", self.path.display(), e);
                return Dataset::new();
            }
        };

        match serde_json::from_str(&text) {
            Ok(dataset) => dataset,
            Err(e) => {
                log::warn!("{} is not a valid dataset, starting empty: {}", self.path.display(), e);
                Dataset::new()
            }
        }
    }

    fn persist(&mut self, dataset: &Dataset) -> Result<(), ScrapeError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
            }
        }

        let mut buf = Vec::new();
        let mut serializer = serde_json::Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b"    "));
        dataset.serialize(&mut serializer)?;

        // Write beside the target, then swap it in
        let temp = self.temp_path();
        fs::write(&temp, &buf).map_err(|e| self.io_error(e))?;
        fs::rename(&temp, &self.path).map_err(|e| self.io_error(e))?;

        log::info!("Saved {} reactions to {}", dataset.len(), self.path.display());
        Ok(())
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Checkpoint kept in memory, counting writes
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct MemoryCheckpoint {
    pub stored: Dataset,
    pub writes: usize,
    pub fail_writes: bool,
}

#[cfg(test)]
impl Checkpoint for MemoryCheckpoint {
    fn load(&self) -> Dataset {
        self.stored.clone()
    }

    fn persist(&mut self, dataset: &Dataset) -> Result<(), ScrapeError> {
        if self.fail_writes {
            return Err(ScrapeError::Checkpoint {
                path: PathBuf::from("memory"),
                source: io::Error::other("disk full"),
            });
        }
        self.stored = dataset.clone();
        self.writes += 1;
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}
