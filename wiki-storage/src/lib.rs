//! Storage abstraction for the wiki ingestion pipeline's vector store.
//!
//! This crate provides a `SegmentStorage` trait used by the pipeline's
//! ingestion manager to persist records and the embedding cache. It exists
//! so the store's on-disk layout (`<output_dir>/<collection>/...`) stays
//! pluggable without changing the ingestion manager's code.
//!
//! # Storage Paths
//!
//! All data is organized using hierarchical [`StoragePath`]s:
//!
//! ```text
//! collection/backend/batch/segment
//!
//! fallout_wiki/vector/batch_00001/records.jsonl
//! fallout_wiki/meta/schema.json
//! ```
//!
//! # Quick Start
//!
//! ```no_run
//! use wiki_storage::{LocalStorage, SegmentStorage, StoragePath, StorageBackend};
//! use bytes::Bytes;
//!
//! # async fn example() -> wiki_storage::Result<()> {
//! let storage = LocalStorage::new("./vector_store");
//!
//! let path = StoragePath::vector("fallout_wiki", "batch_00001", "records.jsonl");
//! storage.write(&path, Bytes::from("{}\n")).await?;
//!
//! let data = storage.read(&path).await?;
//!
//! let prefix = StoragePath::new("fallout_wiki", StorageBackend::Vector);
//! let files = storage.list(&prefix).await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Cached Storage (L1 local + L2 backend)
//!
//! ```ignore
//! use wiki_storage::{CachedStorage, CacheConfig, LocalStorage, SegmentStorage};
//! use std::sync::Arc;
//!
//! let l2: Arc<dyn SegmentStorage> = Arc::new(LocalStorage::new("./archive"));
//! let config = CacheConfig::with_max_size_gb(1);
//! let storage = CachedStorage::new("./cache", l2, config);
//! ```

mod cached;
mod compressed;
mod error;
mod local;
mod path;
mod traits;

pub use cached::{CacheConfig, CacheStats, CachedStorage};
pub use compressed::{
    CompressedStorage, CompressionAlgorithm, CompressionConfig, CompressionStats,
};
pub use error::{Result, StorageError};
pub use local::LocalStorage;
pub use path::{StorageBackend, StoragePath};
pub use traits::{ListOptions, ObjectMeta, SegmentStorage, SegmentStorageSync};

// Re-export bytes for convenience
pub use bytes::Bytes;

/// Create a storage backend from configuration.
pub fn create_storage(config: &StorageConfig) -> Result<Box<dyn SegmentStorage>> {
    match config {
        StorageConfig::Local { path } => Ok(Box::new(LocalStorage::new(path))),
        StorageConfig::Cached {
            l1_path,
            l1_max_size_gb,
            l2,
        } => {
            let l2_storage = create_storage(l2)?;
            let config = CacheConfig::with_max_size_gb(*l1_max_size_gb);
            Ok(Box::new(CachedStorage::new(
                l1_path,
                std::sync::Arc::from(l2_storage),
                config,
            )))
        }
        StorageConfig::Compressed {
            algorithm,
            inner,
            min_size,
        } => {
            let inner_storage = create_storage(inner)?;
            let compression_config = match algorithm.as_str() {
                "lz4" => CompressionConfig::lz4(),
                "zstd" => CompressionConfig::zstd(),
                "none" => CompressionConfig::none(),
                other => {
                    if let Some(level_str) = other.strip_prefix("zstd:") {
                        let level: i32 = level_str.parse().map_err(|_| {
                            StorageError::Config(format!("Invalid zstd level: {}", level_str))
                        })?;
                        CompressionConfig::zstd_level(level)
                    } else {
                        return Err(StorageError::Config(format!(
                            "Unknown compression algorithm: {}. Use 'lz4', 'zstd', 'zstd:LEVEL', or 'none'",
                            other
                        )));
                    }
                }
            }
            .with_min_size(*min_size);

            Ok(Box::new(CompressedStorage::new(
                std::sync::Arc::from(inner_storage),
                compression_config,
            )))
        }
    }
}

/// Storage configuration enum.
#[derive(Debug, Clone)]
pub enum StorageConfig {
    /// Local filesystem storage
    Local {
        /// Base path for data
        path: std::path::PathBuf,
    },
    /// Cached storage (L1 local + L2 backend)
    Cached {
        /// Path for L1 cache
        l1_path: std::path::PathBuf,
        /// Maximum L1 cache size in GB
        l1_max_size_gb: u64,
        /// L2 backend configuration
        l2: Box<StorageConfig>,
    },
    /// Compressed storage wrapper
    Compressed {
        /// Compression algorithm: "lz4", "zstd", "zstd:LEVEL", or "none"
        algorithm: String,
        /// Minimum file size to compress (bytes)
        min_size: usize,
        /// Inner storage configuration
        inner: Box<StorageConfig>,
    },
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig::Local {
            path: std::path::PathBuf::from("./vector_store"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_config_default() {
        let config = StorageConfig::default();
        match config {
            StorageConfig::Local { path } => {
                assert_eq!(path, std::path::PathBuf::from("./vector_store"));
            }
            _ => panic!("Expected Local config"),
        }
    }

    #[test]
    fn test_create_storage_local() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = StorageConfig::Local {
            path: dir.path().to_path_buf(),
        };
        let storage = create_storage(&config).unwrap();
        assert_eq!(storage.backend_name(), "local");
    }

    #[test]
    fn test_create_storage_compressed_lz4() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = StorageConfig::Compressed {
            algorithm: "lz4".to_string(),
            min_size: 512,
            inner: Box::new(StorageConfig::Local {
                path: dir.path().to_path_buf(),
            }),
        };
        let storage = create_storage(&config).unwrap();
        assert_eq!(storage.backend_name(), "compressed");
    }

    #[test]
    fn test_create_storage_compressed_invalid_algorithm() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = StorageConfig::Compressed {
            algorithm: "snappy".to_string(),
            min_size: 0,
            inner: Box::new(StorageConfig::Local {
                path: dir.path().to_path_buf(),
            }),
        };
        let result = create_storage(&config);
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_create_storage_cached() {
        let l1_dir = tempfile::TempDir::new().unwrap();
        let l2_dir = tempfile::TempDir::new().unwrap();
        let config = StorageConfig::Cached {
            l1_path: l1_dir.path().to_path_buf(),
            l1_max_size_gb: 1,
            l2: Box::new(StorageConfig::Local {
                path: l2_dir.path().to_path_buf(),
            }),
        };
        let storage = create_storage(&config).unwrap();
        assert_eq!(storage.backend_name(), "cached");
    }
}
