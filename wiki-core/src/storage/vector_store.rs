use async_trait::async_trait;
use std::path::PathBuf;
use wiki_storage::{LocalStorage, SegmentStorage, StorageBackend, StorageError, StoragePath};

use crate::PipelineError;

/// Durable store for a collection's serialized records.
///
/// The ingestion manager (C7) reads the whole collection into memory on
/// startup, appends/updates records, and writes the whole collection back;
/// there is no partial-write path, so the format stays a single blob per
/// collection rather than a segment-per-batch layout.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn save(&self, collection: &str, data: &[u8]) -> Result<(), PipelineError>;
    async fn load(&self, collection: &str) -> Result<Option<Vec<u8>>, PipelineError>;
    async fn delete(&self, collection: &str) -> Result<(), PipelineError>;
}

/// Filesystem-backed [`RecordStore`] built on [`wiki_storage::LocalStorage`].
/// Each collection's records live at a single `vector` segment
/// (`<base>/<collection>/vector/records.json`) rather than the sharded
/// batch layout `SegmentStorage` also supports, matching this pipeline's
/// whole-blob-per-collection contract.
pub struct LocalRecordStore {
    inner: LocalStorage,
}

impl LocalRecordStore {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            inner: LocalStorage::new(base_path),
        }
    }

    fn records_path(collection: &str) -> StoragePath {
        StoragePath::new(collection, StorageBackend::Vector).with_segment("records.json")
    }
}

#[async_trait]
impl RecordStore for LocalRecordStore {
    async fn save(&self, collection: &str, data: &[u8]) -> Result<(), PipelineError> {
        self.inner
            .write_bytes(&Self::records_path(collection), data)
            .await
            .map_err(PipelineError::from)
    }

    async fn load(&self, collection: &str) -> Result<Option<Vec<u8>>, PipelineError> {
        match self.inner.read_vec(&Self::records_path(collection)).await {
            Ok(data) => Ok(Some(data)),
            Err(StorageError::NotFound(_)) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, collection: &str) -> Result<(), PipelineError> {
        self.inner
            .delete(&Self::records_path(collection))
            .await
            .map_err(PipelineError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn roundtrip() {
        let temp = TempDir::new().unwrap();
        let store = LocalRecordStore::new(temp.path());

        let data = b"[]";
        store.save("fallout_wiki", data).await.unwrap();

        let loaded = store.load("fallout_wiki").await.unwrap();
        assert_eq!(loaded, Some(data.to_vec()));
    }

    #[tokio::test]
    async fn missing_collection_is_none() {
        let temp = TempDir::new().unwrap();
        let store = LocalRecordStore::new(temp.path());

        let loaded = store.load("nonexistent").await.unwrap();
        assert_eq!(loaded, None);
    }
}
