//! Snapshot persistence for the file-backed store

use super::memory::Collections;
use crate::core::{StoreError, StoreResult};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

const SNAPSHOT_VERSION: u32 = 1;

// ============================================================================
// Store Snapshot
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct StoreSnapshot {
    pub version: u32,
    pub collections: Collections,
    pub metadata: SnapshotMetadata,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SnapshotMetadata {
    /// RFC 3339 timestamp of the save
    pub saved_at: String,
    pub document_count: usize,
    pub collection_count: usize,
}

impl StoreSnapshot {
    pub fn new(collections: Collections) -> Self {
        let document_count = collections.values().map(Vec::len).sum();
        let collection_count = collections.len();

        Self {
            version: SNAPSHOT_VERSION,
            collections,
            metadata: SnapshotMetadata {
                saved_at: Utc::now().to_rfc3339(),
                document_count,
                collection_count,
            },
        }
    }
}

// ============================================================================
// Snapshot File
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotFormat {
    Json,
    MessagePack,
}

impl SnapshotFormat {
    /// `.json` files are JSON, everything else MessagePack
    pub fn for_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Self::Json,
            _ => Self::MessagePack,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SnapshotFile {
    path: PathBuf,
    format: SnapshotFormat,
}

impl SnapshotFile {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref().to_path_buf();
        let format = SnapshotFormat::for_path(&path);
        Self { path, format }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    fn encode(&self, snapshot: &StoreSnapshot) -> StoreResult<Vec<u8>> {
        match self.format {
            SnapshotFormat::Json => serde_json::to_vec_pretty(snapshot)
                .map_err(|e| StoreError::Serialization(format!("Failed to encode snapshot: {}", e))),
            SnapshotFormat::MessagePack => rmp_serde::to_vec_named(snapshot)
                .map_err(|e| StoreError::Serialization(format!("Failed to encode snapshot: {}", e))),
        }
    }

    fn decode(&self, data: &[u8]) -> StoreResult<StoreSnapshot> {
        let snapshot: StoreSnapshot = match self.format {
            SnapshotFormat::Json => serde_json::from_slice(data)
                .map_err(|e| StoreError::Serialization(format!("Failed to decode snapshot: {}", e)))?,
            SnapshotFormat::MessagePack => rmp_serde::from_slice(data)
                .map_err(|e| StoreError::Serialization(format!("Failed to decode snapshot: {}", e)))?,
        };

        if snapshot.version > SNAPSHOT_VERSION {
            return Err(StoreError::Serialization(format!(
                "Snapshot version {} is newer than supported version {}",
                snapshot.version, SNAPSHOT_VERSION
            )));
        }
        Ok(snapshot)
    }

    /// Write the snapshot through a temp file in the same directory, then
    /// rename it over the target.
    pub fn save(&self, snapshot: &StoreSnapshot) -> StoreResult<()> {
        let parent = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let serialized = self.encode(snapshot)?;

        let temp = NamedTempFile::new_in(&parent)
            .map_err(|e| StoreError::Io(format!("Failed to create temp file: {}", e)))?;
        {
            let mut writer = BufWriter::new(temp.as_file());
            writer.write_all(&serialized)
                .map_err(|e| StoreError::Io(format!("Failed to write snapshot: {}", e)))?;
            writer.flush()
                .map_err(|e| StoreError::Io(format!("Failed to flush snapshot: {}", e)))?;
        }
        temp.as_file().sync_all()
            .map_err(|e| StoreError::Io(format!("Failed to sync snapshot: {}", e)))?;
        temp.persist(&self.path)
            .map_err(|e| StoreError::Io(format!("Failed to rename snapshot: {}", e.error)))?;
        Ok(())
    }

    pub fn load(&self) -> StoreResult<Option<StoreSnapshot>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let mut file = File::open(&self.path)
            .map_err(|e| StoreError::Io(format!("Failed to open snapshot: {}", e)))?;
        let mut data = Vec::new();
        file.read_to_end(&mut data)
            .map_err(|e| StoreError::Io(format!("Failed to read snapshot: {}", e)))?;
        if data.is_empty() {
            return Ok(None);
        }
        self.decode(&data).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    fn sample() -> Collections {
        let mut collections = Collections::new();
        collections.insert(
            "users".to_string(),
            vec![json!({"_id": "u1", "role": "super_admin", "age": 41})
                .as_object()
                .cloned()
                .unwrap()],
        );
        collections
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(SnapshotFormat::for_path(Path::new("a/store.json")), SnapshotFormat::Json);
        assert_eq!(SnapshotFormat::for_path(Path::new("a/store.JSON")), SnapshotFormat::Json);
        assert_eq!(SnapshotFormat::for_path(Path::new("a/store.snapshot")), SnapshotFormat::MessagePack);
        assert_eq!(SnapshotFormat::for_path(Path::new("a/store")), SnapshotFormat::MessagePack);
    }

    #[test]
    fn test_save_and_load_msgpack() {
        let temp_dir = TempDir::new().unwrap();
        let file = SnapshotFile::new(temp_dir.path().join("store.snapshot"));
        file.save(&StoreSnapshot::new(sample())).unwrap();
        assert!(file.exists());

        let loaded = file.load().unwrap().unwrap();
        assert_eq!(loaded.metadata.collection_count, 1);
        assert_eq!(loaded.metadata.document_count, 1);
        assert_eq!(loaded.collections["users"][0]["age"], json!(41));
    }

    #[test]
    fn test_json_snapshot_is_readable() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("store.json");
        let file = SnapshotFile::new(&path);
        file.save(&StoreSnapshot::new(sample())).unwrap();

        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"super_admin\""));
    }

    #[test]
    fn test_missing_or_empty_file_loads_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("store.json");
        let file = SnapshotFile::new(&path);
        assert!(file.load().unwrap().is_none());

        fs::write(&path, b"").unwrap();
        assert!(file.load().unwrap().is_none());
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("store.json");
        fs::write(&path, b"{not json").unwrap();
        assert!(matches!(SnapshotFile::new(&path).load(), Err(StoreError::Serialization(_))));
    }

    #[test]
    fn test_newer_version_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("store.json");
        let mut snapshot = StoreSnapshot::new(sample());
        snapshot.version = SNAPSHOT_VERSION + 1;
        fs::write(&path, serde_json::to_vec(&snapshot).unwrap()).unwrap();
        assert!(SnapshotFile::new(&path).load().is_err());
    }
}
