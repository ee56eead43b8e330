//! Hierarchical storage paths for the wiki ingestion pipeline's vector store.
//!
//! Storage paths follow the pattern: `collection/backend/[batch/]segment`
//!
//! # Examples
//!
//! ```
//! use wiki_storage::{StoragePath, StorageBackend};
//!
//! let path = StoragePath::new("fallout_wiki", StorageBackend::Vector)
//!     .with_shard("batch_00001")
//!     .with_segment("records.jsonl");
//!
//! assert_eq!(path.to_string(), "fallout_wiki/vector/batch_00001/records.jsonl");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Backend type for storage organization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Vector records + embeddings (the store's primary data)
    Vector,
    /// Collection metadata (schema, stats)
    Meta,
}

impl fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageBackend::Vector => write!(f, "vector"),
            StorageBackend::Meta => write!(f, "meta"),
        }
    }
}

impl StorageBackend {
    /// Parse backend from string.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "vector" | "hnsw" => Some(StorageBackend::Vector),
            "meta" | "metadata" => Some(StorageBackend::Meta),
            _ => None,
        }
    }
}

/// Hierarchical path for storage operations.
///
/// Format: `collection/backend/[batch/]segment`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StoragePath {
    /// Collection name
    pub collection: String,
    /// Backend type (vector, meta)
    pub backend: StorageBackend,
    /// Optional batch identifier
    pub shard: Option<String>,
    /// Segment or file name
    pub segment: String,
}

impl StoragePath {
    /// Create a new storage path.
    pub fn new(collection: impl Into<String>, backend: StorageBackend) -> Self {
        Self {
            collection: collection.into(),
            backend,
            shard: None,
            segment: String::new(),
        }
    }

    /// Add batch id to path.
    pub fn with_shard(mut self, shard: impl Into<String>) -> Self {
        self.shard = Some(shard.into());
        self
    }

    /// Add segment/file name to path.
    pub fn with_segment(mut self, segment: impl Into<String>) -> Self {
        self.segment = segment.into();
        self
    }

    /// Create path for collection metadata.
    pub fn collection_meta(collection: impl Into<String>, filename: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            backend: StorageBackend::Meta,
            shard: None,
            segment: filename.into(),
        }
    }

    /// Create path for a vector store batch segment.
    pub fn vector(
        collection: impl Into<String>,
        batch: impl Into<String>,
        segment: impl Into<String>,
    ) -> Self {
        Self {
            collection: collection.into(),
            backend: StorageBackend::Vector,
            shard: Some(batch.into()),
            segment: segment.into(),
        }
    }

    /// Get the directory prefix (without segment).
    pub fn prefix(&self) -> String {
        match &self.shard {
            Some(shard) => format!("{}/{}/{}", self.collection, self.backend, shard),
            None => format!("{}/{}", self.collection, self.backend),
        }
    }

    /// Convert to filesystem path.
    pub fn to_path_buf(&self, base: &std::path::Path) -> PathBuf {
        let mut path = base.join(&self.collection).join(self.backend.to_string());
        if let Some(shard) = &self.shard {
            path = path.join(shard);
        }
        if !self.segment.is_empty() {
            path = path.join(&self.segment);
        }
        path
    }

    /// Parse from string representation.
    pub fn parse(s: &str) -> Option<Self> {
        let parts: Vec<&str> = s.split('/').collect();
        if parts.len() < 3 {
            return None;
        }

        let collection = parts[0].to_string();
        let backend = StorageBackend::from_str(parts[1])?;

        if parts.len() == 3 {
            Some(Self {
                collection,
                backend,
                shard: None,
                segment: parts[2].to_string(),
            })
        } else {
            Some(Self {
                collection,
                backend,
                shard: Some(parts[2].to_string()),
                segment: parts[3..].join("/"),
            })
        }
    }

    /// Check if this path is a directory prefix (no segment).
    pub fn is_prefix(&self) -> bool {
        self.segment.is_empty()
    }
}

impl fmt::Display for StoragePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.shard {
            Some(shard) if !self.segment.is_empty() => {
                write!(f, "{}/{}/{}/{}", self.collection, self.backend, shard, self.segment)
            }
            Some(shard) => {
                write!(f, "{}/{}/{}", self.collection, self.backend, shard)
            }
            None if !self.segment.is_empty() => {
                write!(f, "{}/{}/{}", self.collection, self.backend, self.segment)
            }
            None => {
                write!(f, "{}/{}", self.collection, self.backend)
            }
        }
    }
}
