//! File-backed record collections.
//!
//! Each collection is one JSON file holding an array of flat objects. Records
//! are kept in their raw (serialized) form here; typing happens in the service
//! layer so fields this layer was not asked to touch survive every rewrite.

use crate::{AppError, Result};
use serde_json::{Map, Value};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use uuid::Uuid;

/// One stored record as it appears on disk.
pub type RawRecord = Map<String, Value>;

/// Ordered, append-only collection persisted as a single JSON array.
#[derive(Debug)]
pub struct RecordStore {
    file_path: PathBuf,
    // Serializes load-modify-save so concurrent appends in this process cannot drop each other.
    write_lock: Mutex<()>,
}

impl RecordStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            file_path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }

    /// Read the whole collection. A missing file is an empty collection.
    pub async fn load(&self) -> Result<Vec<RawRecord>> {
        let bytes = match fs::read(&self.file_path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                // e.g. a parent component that is a regular file: nothing is stored there
                if fs::metadata(&self.file_path).await.is_err() {
                    return Ok(Vec::new());
                }
                return Err(AppError::StorageRead(format!(
                    "Failed to read {}: {}",
                    self.file_path.display(),
                    e
                )));
            }
        };

        serde_json::from_slice(&bytes).map_err(|e| {
            AppError::StorageRead(format!(
                "{} is not a JSON array of objects: {}",
                self.file_path.display(),
                e
            ))
        })
    }

    /// Append one record to the end of the collection and rewrite the file.
    pub async fn append_and_save(&self, record: RawRecord) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        let mut records = self.load().await?;
        records.push(record);
        self.save(&records).await?;

        tracing::debug!(
            "Saved {} records to {}",
            records.len(),
            self.file_path.display()
        );
        Ok(())
    }

    /// Number of records currently stored.
    pub async fn len(&self) -> Result<usize> {
        Ok(self.load().await?.len())
    }

    /// Write to a temporary sibling, then rename over the target.
    async fn save(&self, records: &[RawRecord]) -> Result<()> {
        let write_err = |e: std::io::Error| {
            AppError::StorageWrite(format!("Failed to write {}: {}", self.file_path.display(), e))
        };

        let data = serde_json::to_vec_pretty(records)
            .map_err(|e| AppError::StorageWrite(format!("Failed to serialize records: {}", e)))?;

        let parent = self
            .file_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(parent).await.map_err(write_err)?;

        let file_name = self
            .file_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("records.json");
        let temp_path = parent.join(format!(".{}.{}.tmp", file_name, Uuid::new_v4()));

        if let Err(e) = write_synced(&temp_path, &data).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(write_err(e));
        }
        if let Err(e) = fs::rename(&temp_path, &self.file_path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(write_err(e));
        }

        Ok(())
    }
}

/// Contents reach the disk before the file is renamed into place.
async fn write_synced(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let mut file = File::create(path).await?;
    file.write_all(data).await?;
    file.sync_all().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn raw(value: Value) -> RawRecord {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_file_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        let store = RecordStore::new(temp_dir.path().join("nothing_here.json"));

        assert!(store.load().await.unwrap().is_empty());
        assert_eq!(store.len().await.unwrap(), 0);
        assert!(!store.path().exists());
    }

    #[tokio::test]
    async fn test_append_preserves_order_and_format() {
        let temp_dir = TempDir::new().unwrap();
        let store = RecordStore::new(temp_dir.path().join("nested/dir/items.json"));

        store.append_and_save(raw(json!({ "id": "a" }))).await.unwrap();
        store.append_and_save(raw(json!({ "id": "b" }))).await.unwrap();
        store.append_and_save(raw(json!({ "id": "c" }))).await.unwrap();

        let ids: Vec<_> = store
            .load()
            .await
            .unwrap()
            .iter()
            .map(|r| r["id"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(ids, vec!["a", "b", "c"]);

        let text = std::fs::read_to_string(store.path()).unwrap();
        assert!(text.starts_with("[\n  {"));

        // Only the collection file remains, no temp leftovers
        let entries: Vec<_> = std::fs::read_dir(temp_dir.path().join("nested/dir"))
            .unwrap()
            .collect();
        assert_eq!(entries.len(), 1);
    }

    #[tokio::test]
    async fn test_unparseable_file_is_read_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("broken.json");

        std::fs::write(&path, "{ not json").unwrap();
        let store = RecordStore::new(&path);
        assert!(matches!(store.load().await, Err(AppError::StorageRead(_))));

        // Valid JSON, wrong container
        std::fs::write(&path, r#"{"id": "x"}"#).unwrap();
        assert!(matches!(store.load().await, Err(AppError::StorageRead(_))));

        // Append must not clobber a file it could not understand
        let result = store.append_and_save(raw(json!({ "id": "y" }))).await;
        assert!(matches!(result, Err(AppError::StorageRead(_))));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), r#"{"id": "x"}"#);
    }

    #[tokio::test]
    async fn test_unknown_fields_survive_rewrite() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("legacy.json");
        std::fs::write(
            &path,
            r#"[{"id": "old", "_id": {"$oid": "abc"}, "extra": 7}]"#,
        )
        .unwrap();

        let store = RecordStore::new(&path);
        store.append_and_save(raw(json!({ "id": "new" }))).await.unwrap();

        let records = store.load().await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["_id"], json!({ "$oid": "abc" }));
        assert_eq!(records[0]["extra"], json!(7));
        assert_eq!(records[1]["id"], json!("new"));
    }

    #[tokio::test]
    async fn test_unwritable_location_is_write_error() {
        let temp_dir = TempDir::new().unwrap();
        let blocker = temp_dir.path().join("blocker");
        std::fs::write(&blocker, "not a directory").unwrap();

        let store = RecordStore::new(blocker.join("items.json"));
        assert!(store.load().await.unwrap().is_empty());

        let result = store.append_and_save(raw(json!({ "id": "a" }))).await;
        assert!(matches!(result, Err(AppError::StorageWrite(_))));
        assert_eq!(std::fs::read_to_string(&blocker).unwrap(), "not a directory");
    }

    #[tokio::test]
    async fn test_failed_replace_keeps_target_and_cleans_up() {
        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("items.json");

        // A non-empty directory at the target path makes the final rename fail
        std::fs::create_dir(&target).unwrap();
        std::fs::write(target.join("keep.txt"), "untouched").unwrap();

        let store = RecordStore::new(&target);
        let result = store.save(&[raw(json!({ "id": "a" }))]).await;
        assert!(matches!(result, Err(AppError::StorageWrite(_))));

        assert!(target.is_dir());
        assert_eq!(
            std::fs::read_to_string(target.join("keep.txt")).unwrap(),
            "untouched"
        );
        let leftovers: Vec<_> = std::fs::read_dir(temp_dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|name| name.ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty(), "temp files left: {:?}", leftovers);
    }

    #[tokio::test]
    async fn test_concurrent_appends_are_not_lost() {
        let temp_dir = TempDir::new().unwrap();
        let store = Arc::new(RecordStore::new(temp_dir.path().join("busy.json")));

        let mut handles = Vec::new();
        for i in 0..16 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store
                    .append_and_save(raw(json!({ "id": i.to_string() })))
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(store.len().await.unwrap(), 16);
    }
}
