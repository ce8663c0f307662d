//! Filesystem artifact store
//!
//! Layout: `<root>/<name>/v<version>/files/...` with a `manifest.json` next
//! to `files/`. The manifest is written last; a version without one is
//! treated as incomplete and ignored. `<root>/<name>/last_version` keeps the
//! counter across purges.

use chrono::{DateTime, Duration, Utc};
use labgate_core::{expiry, Artifact, ArtifactStore, FileSet, GateError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, warn};

const MANIFEST: &str = "manifest.json";
const FILES_DIR: &str = "files";
const LAST_VERSION: &str = "last_version";

#[derive(Debug, Serialize, Deserialize)]
struct Manifest {
    name: String,
    version: u32,
    digest: String,
    producer: String,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    files: Vec<PathBuf>,
}

#[derive(Debug)]
pub struct FsArtifactStore {
    root: PathBuf,
    write_lock: Mutex<()>,
}

impl FsArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Delete every version whose retention has elapsed. Returns how many
    /// versions were removed.
    pub fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| GateError::Artifact("store lock poisoned".to_string()))?;
        if !self.root.exists() {
            return Ok(0);
        }

        let mut removed = 0;
        for entry in std::fs::read_dir(&self.root)? {
            let name_dir = entry?.path();
            if !name_dir.is_dir() {
                continue;
            }
            for (_, version_dir) in list_versions(&name_dir)? {
                match read_manifest(&version_dir) {
                    Some(manifest) if now >= manifest.expires_at => {
                        std::fs::remove_dir_all(&version_dir)?;
                        debug!(artifact = %manifest.name, version = manifest.version, "purged expired artifact");
                        removed += 1;
                    }
                    _ => {}
                }
            }
        }
        Ok(removed)
    }

    fn name_dir(&self, name: &str) -> Result<PathBuf> {
        let valid = !name.trim().is_empty()
            && name != "."
            && name != ".."
            && !name.contains(['/', '\\']);
        if !valid {
            return Err(GateError::Artifact(format!("invalid artifact name '{}'", name)));
        }
        Ok(self.root.join(name))
    }

    fn load(&self, version_dir: &Path) -> Result<Artifact> {
        let manifest = read_manifest(version_dir)
            .ok_or_else(|| GateError::Artifact(format!("no manifest in {}", version_dir.display())))?;
        let files_dir = version_dir.join(FILES_DIR);
        let mut files = FileSet::new();
        for rel in &manifest.files {
            files.insert(rel.clone(), std::fs::read(files_dir.join(rel))?);
        }
        Ok(Artifact {
            name: manifest.name,
            version: manifest.version,
            digest: manifest.digest,
            producer: manifest.producer,
            created_at: manifest.created_at,
            expires_at: manifest.expires_at,
            files,
        })
    }
}

impl ArtifactStore for FsArtifactStore {
    fn put(&self, name: &str, files: FileSet, producer: &str, retention: Duration) -> Result<Artifact> {
        let name_dir = self.name_dir(name)?;
        for (path, _) in files.iter() {
            if !is_contained(path) {
                return Err(GateError::Artifact(format!(
                    "file path '{}' escapes the artifact root",
                    path.display()
                )));
            }
        }

        let created_at = Utc::now();
        let expires_at = expiry(created_at, retention)?;

        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| GateError::Artifact("store lock poisoned".to_string()))?;
        std::fs::create_dir_all(&name_dir)?;
        let listed = list_versions(&name_dir)?.last().map(|(v, _)| *v).unwrap_or(0);
        let version = listed.max(read_last_version(&name_dir)) + 1;

        let version_dir = name_dir.join(format!("v{}", version));
        let files_dir = version_dir.join(FILES_DIR);
        std::fs::create_dir_all(&files_dir)?;
        for (path, contents) in files.iter() {
            let target = files_dir.join(path);
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&target, contents)?;
        }

        let manifest = Manifest {
            name: name.to_string(),
            version,
            digest: files.digest(),
            producer: producer.to_string(),
            created_at,
            expires_at,
            files: files.iter().map(|(p, _)| p.clone()).collect(),
        };
        std::fs::write(version_dir.join(MANIFEST), serde_json::to_vec_pretty(&manifest)?)?;
        std::fs::write(name_dir.join(LAST_VERSION), version.to_string())?;
        debug!(artifact = name, version, dir = %version_dir.display(), "wrote artifact");

        Ok(Artifact {
            name: manifest.name,
            version,
            digest: manifest.digest,
            producer: manifest.producer,
            created_at,
            expires_at: manifest.expires_at,
            files,
        })
    }

    fn get(&self, name: &str) -> Option<Artifact> {
        let name_dir = self.name_dir(name).ok()?;
        let versions = list_versions(&name_dir).ok()?;
        for (_, version_dir) in versions.into_iter().rev() {
            if read_manifest(&version_dir).is_none() {
                continue;
            }
            match self.load(&version_dir) {
                Ok(artifact) => return Some(artifact),
                Err(e) => {
                    warn!(artifact = name, dir = %version_dir.display(), error = %e, "unreadable artifact version");
                }
            }
        }
        None
    }
}

/// `(version, dir)` pairs sorted by version
fn list_versions(name_dir: &Path) -> Result<Vec<(u32, PathBuf)>> {
    if !name_dir.exists() {
        return Ok(Vec::new());
    }
    let mut versions = Vec::new();
    for entry in std::fs::read_dir(name_dir)? {
        let path = entry?.path();
        let version = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| n.strip_prefix('v'))
            .and_then(|n| n.parse::<u32>().ok());
        if let (Some(version), true) = (version, path.is_dir()) {
            versions.push((version, path));
        }
    }
    versions.sort_by_key(|(v, _)| *v);
    Ok(versions)
}

fn read_last_version(name_dir: &Path) -> u32 {
    std::fs::read_to_string(name_dir.join(LAST_VERSION))
        .ok()
        .and_then(|text| text.trim().parse().ok())
        .unwrap_or(0)
}

fn read_manifest(version_dir: &Path) -> Option<Manifest> {
    let bytes = std::fs::read(version_dir.join(MANIFEST)).ok()?;
    serde_json::from_slice(&bytes).ok()
}

fn is_contained(path: &Path) -> bool {
    !path.as_os_str().is_empty() && path.components().all(|c| matches!(c, Component::Normal(_)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dataset() -> FileSet {
        FileSet::new()
            .with_file("1_raw.txt", "Первая статья")
            .with_file("meta/1_meta.json", r#"{"id": 1}"#)
    }

    #[test]
    fn test_put_then_get_round_trip() {
        let root = tempfile::tempdir().unwrap();
        let store = FsArtifactStore::new(root.path());

        let stored = store
            .put("raw-dataset", dataset(), "run-scrapper", Duration::days(5))
            .unwrap();
        assert_eq!(stored.version, 1);
        assert!(root.path().join("raw-dataset/v1/files/meta/1_meta.json").exists());

        let loaded = store.get("raw-dataset").unwrap();
        assert_eq!(loaded.version, 1);
        assert_eq!(loaded.digest, stored.digest);
        assert_eq!(loaded.producer, "run-scrapper");
        assert_eq!(loaded.files, dataset());
    }

    #[test]
    fn test_versions_increment_and_latest_wins() {
        let root = tempfile::tempdir().unwrap();
        let store = FsArtifactStore::new(root.path());
        store.put("raw-dataset", dataset(), "a", Duration::days(1)).unwrap();
        let second = store
            .put("raw-dataset", FileSet::new().with_file("2_raw.txt", "x"), "b", Duration::days(1))
            .unwrap();
        assert_eq!(second.version, 2);
        assert_eq!(store.get("raw-dataset").unwrap().producer, "b");
    }

    #[test]
    fn test_incomplete_version_ignored() {
        let root = tempfile::tempdir().unwrap();
        let store = FsArtifactStore::new(root.path());
        store.put("raw-dataset", dataset(), "a", Duration::days(1)).unwrap();
        std::fs::create_dir_all(root.path().join("raw-dataset/v2/files")).unwrap();

        assert_eq!(store.get("raw-dataset").unwrap().version, 1);
    }

    #[test]
    fn test_missing_artifact() {
        let root = tempfile::tempdir().unwrap();
        let store = FsArtifactStore::new(root.path());
        assert!(store.get("processed-dataset").is_none());
        assert!(store.get("../escape").is_none());
    }

    #[test]
    fn test_rejects_escaping_paths() {
        let root = tempfile::tempdir().unwrap();
        let store = FsArtifactStore::new(root.path());
        let bad = FileSet::new().with_file("../outside.txt", "x");
        assert!(store.put("raw-dataset", bad, "a", Duration::days(1)).is_err());
        assert!(store.put("a/b", dataset(), "a", Duration::days(1)).is_err());
    }

    #[test]
    fn test_purge_expired() {
        let root = tempfile::tempdir().unwrap();
        let store = FsArtifactStore::new(root.path());
        store.put("raw-dataset", dataset(), "a", Duration::days(1)).unwrap();
        store.put("processed-dataset", dataset(), "b", Duration::days(10)).unwrap();

        assert_eq!(store.purge_expired(Utc::now()).unwrap(), 0);
        assert_eq!(store.purge_expired(Utc::now() + Duration::days(2)).unwrap(), 1);
        assert!(store.get("raw-dataset").is_none());
        assert!(store.get("processed-dataset").is_some());

        let next = store.put("raw-dataset", dataset(), "a", Duration::days(1)).unwrap();
        assert_eq!(next.version, 2);
    }

    #[test]
    fn test_out_of_range_retention_is_error() {
        let root = tempfile::tempdir().unwrap();
        let store = FsArtifactStore::new(root.path());
        let err = store.put("raw-dataset", dataset(), "a", Duration::MAX).unwrap_err();
        assert!(matches!(err, GateError::Artifact(_)));
        assert!(store.get("raw-dataset").is_none());
    }
}
