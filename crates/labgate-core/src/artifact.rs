//! Artifacts: named, versioned file bundles passed between stages
use crate::error::{GateError, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::RwLock;

/// Files keyed by path relative to the bundle root
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSet {
    files: BTreeMap<PathBuf, Vec<u8>>,
}

impl FileSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, path: impl Into<PathBuf>, contents: impl Into<Vec<u8>>) -> Self {
        self.insert(path, contents);
        self
    }

    pub fn insert(&mut self, path: impl Into<PathBuf>, contents: impl Into<Vec<u8>>) {
        self.files.insert(path.into(), contents.into());
    }

    pub fn get(&self, path: impl Into<PathBuf>) -> Option<&[u8]> {
        self.files.get(&path.into()).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PathBuf, &Vec<u8>)> {
        self.files.iter()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Content digest over paths and bytes, in path order
    pub fn digest(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        for (path, contents) in &self.files {
            hasher.update(path.to_string_lossy().as_bytes());
            hasher.update(&[0]);
            hasher.update(&(contents.len() as u64).to_le_bytes());
            hasher.update(contents);
        }
        format!("blake3:{}", hasher.finalize())
    }
}

/// A stored artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    pub name: String,
    /// Per-name counter, starting at 1
    pub version: u32,
    pub digest: String,
    pub producer: String,
    pub created_at: DateTime<Utc>,
    /// Advisory; stores may purge the artifact after this instant
    pub expires_at: DateTime<Utc>,
    pub files: FileSet,
}

/// `created_at + retention`, or an error when that instant is out of range
pub fn expiry(created_at: DateTime<Utc>, retention: Duration) -> Result<DateTime<Utc>> {
    created_at
        .checked_add_signed(retention)
        .ok_or_else(|| GateError::Artifact(format!("retention of {} days is out of range", retention.num_days())))
}

impl Artifact {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Artifact storage shared by the stages of a run
pub trait ArtifactStore: Send + Sync {
    /// Store a new version of `name`
    fn put(&self, name: &str, files: FileSet, producer: &str, retention: Duration) -> Result<Artifact>;

    /// Latest version of `name`, if any
    fn get(&self, name: &str) -> Option<Artifact>;
}

#[derive(Debug, Default)]
struct Shelf {
    versions: Vec<Artifact>,
    /// Survives purges so versions never repeat
    last_version: u32,
}

/// Process-local store, used by tests and single-shot runs
#[derive(Debug, Default)]
pub struct InMemoryArtifactStore {
    artifacts: RwLock<HashMap<String, Shelf>>,
}

impl InMemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop versions whose retention has elapsed. Returns how many were removed.
    pub fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let Ok(mut artifacts) = self.artifacts.write() else {
            return 0;
        };
        let mut removed = 0;
        for shelf in artifacts.values_mut() {
            let before = shelf.versions.len();
            shelf.versions.retain(|a| !a.is_expired(now));
            removed += before - shelf.versions.len();
        }
        removed
    }
}

impl ArtifactStore for InMemoryArtifactStore {
    fn put(&self, name: &str, files: FileSet, producer: &str, retention: Duration) -> Result<Artifact> {
        if name.trim().is_empty() {
            return Err(GateError::Artifact("artifact name is empty".to_string()));
        }
        let mut artifacts = self
            .artifacts
            .write()
            .map_err(|_| GateError::Artifact("artifact store lock poisoned".to_string()))?;
        let created_at = Utc::now();
        let expires_at = expiry(created_at, retention)?;
        let shelf = artifacts.entry(name.to_string()).or_default();
        let version = shelf.last_version + 1;
        let artifact = Artifact {
            name: name.to_string(),
            version,
            digest: files.digest(),
            producer: producer.to_string(),
            created_at,
            expires_at,
            files,
        };
        shelf.last_version = version;
        shelf.versions.push(artifact.clone());
        Ok(artifact)
    }

    fn get(&self, name: &str) -> Option<Artifact> {
        self.artifacts
            .read()
            .ok()
            .and_then(|artifacts| artifacts.get(name).and_then(|shelf| shelf.versions.last().cloned()))
    }
}
