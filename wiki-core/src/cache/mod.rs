//! Embedding cache for the wiki ingestion pipeline.
//!
//! The embedding provider (see [`crate::embedding`]) is wrapped by a
//! `CachedEmbeddingProvider` that consults a SQLite-backed cache so
//! re-running the pipeline over an unchanged dump recomputes nothing.

mod embedding;
mod lru;
mod sqlite;
mod stats;

pub use embedding::{CacheKey, EmbeddingCache, EmbeddingCacheStats};
pub use lru::LruCache;
pub use sqlite::SqliteCache;
pub use stats::ObjectCacheStats;

use serde::{Deserialize, Serialize};

/// Cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Backend type: "sqlite" (only backend supported)
    pub backend: String,

    /// Path for SQLite database
    pub path: Option<String>,

    /// Maximum number of cached entries (for LRU eviction)
    pub max_entries: Option<usize>,

    /// Cache key strategy
    #[serde(default = "default_key_strategy")]
    pub key_strategy: KeyStrategy,
}

fn default_key_strategy() -> KeyStrategy {
    KeyStrategy::ModelText
}

/// Strategy for generating cache keys
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum KeyStrategy {
    /// Hash only the text (ignores model)
    TextOnly,

    /// Hash model name + text (default)
    #[default]
    ModelText,

    /// Hash model name + version + text
    ModelVersionText,
}

impl CacheConfig {
    pub fn sqlite(path: &str) -> Self {
        Self {
            backend: "sqlite".to_string(),
            path: Some(path.to_string()),
            max_entries: Some(1_000_000),
            key_strategy: KeyStrategy::ModelText,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self::sqlite("./embedding_cache.sqlite")
    }
}
