use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use tracing::debug;

use crate::survey::DataSnapshot;

/// Failure to obtain a snapshot from its source.
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("failed to read snapshot: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid snapshot JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("snapshot source unavailable: {0}")]
    Unavailable(String),
}

/// Anything that can hand the poller a fresh snapshot.
pub trait SnapshotSource: Send + Sync {
    fn fetch(&self) -> Result<DataSnapshot, SnapshotError>;

    fn describe(&self) -> String {
        "snapshot source".to_string()
    }
}

pub struct SnapshotImporter;

impl SnapshotImporter {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<DataSnapshot, SnapshotError> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<DataSnapshot, SnapshotError> {
        let snapshot: DataSnapshot = serde_json::from_reader(reader)?;
        debug!(
            entities = snapshot.entities.len(),
            visits = snapshot.visits.len(),
            municipalities = snapshot.municipalities.len(),
            "decoded snapshot"
        );
        Ok(snapshot)
    }

    pub fn from_json_str(payload: &str) -> Result<DataSnapshot, SnapshotError> {
        Self::from_reader(payload.as_bytes())
    }
}

/// Reads the snapshot from a JSON file on every fetch.
#[derive(Debug, Clone)]
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SnapshotSource for JsonFileSource {
    fn fetch(&self) -> Result<DataSnapshot, SnapshotError> {
        SnapshotImporter::from_path(&self.path)
    }

    fn describe(&self) -> String {
        format!("file {}", self.path.display())
    }
}

/// Serves a fixed snapshot that can be swapped out wholesale.
#[derive(Debug, Default)]
pub struct StaticSource {
    snapshot: RwLock<DataSnapshot>,
}

impl StaticSource {
    pub fn new(snapshot: DataSnapshot) -> Self {
        Self {
            snapshot: RwLock::new(snapshot),
        }
    }

    pub fn replace(&self, snapshot: DataSnapshot) {
        let mut guard = self
            .snapshot
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = snapshot;
    }
}

impl SnapshotSource for StaticSource {
    fn fetch(&self) -> Result<DataSnapshot, SnapshotError> {
        let guard = self
            .snapshot
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(guard.clone())
    }

    fn describe(&self) -> String {
        "static snapshot".to_string()
    }
}
