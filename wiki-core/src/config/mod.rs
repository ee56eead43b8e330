//! Configuration for the wiki ingestion pipeline.
//!
//! A single validated [`PipelineConfig`] carries dump path, store location,
//! collection name, chunker parameters, embedding provider/batch size,
//! ingestion batch size, and logging settings. Load order is: defaults →
//! optional TOML file (`--config`) → `WIKI_PIPELINE_*` environment
//! variables (nested keys separated by `__`) → CLI flags. Validation
//! happens once at startup; an invalid configuration is a fatal error
//! before any I/O (exit code 1).

use crate::embedding::ProviderConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Main pipeline configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PipelineConfig {
    /// Path to the MediaWiki XML dump to process.
    pub dump_path: PathBuf,

    #[serde(default)]
    pub output_dir: PathBuf,

    #[serde(default = "default_collection")]
    pub collection: String,

    #[serde(default)]
    pub chunker: ChunkerConfig,

    #[serde(default)]
    pub embedding: EmbeddingConfig,

    #[serde(default = "default_ingestion_batch_size")]
    pub ingestion_batch_size: usize,

    /// Pages whose wikitext exceeds this many bytes are still extracted
    /// and chunked, but are flagged `pages_oversized` in stats (§4.3).
    #[serde(default = "default_page_size_cap_bytes")]
    pub page_size_cap_bytes: usize,

    /// Stop after N pages (for smoke tests / sampling).
    #[serde(default)]
    pub limit: Option<usize>,

    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_collection() -> String {
    "fallout_wiki".to_string()
}

fn default_ingestion_batch_size() -> usize {
    500
}

fn default_page_size_cap_bytes() -> usize {
    1_000_000
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            dump_path: PathBuf::new(),
            output_dir: PathBuf::from("./vector_store"),
            collection: default_collection(),
            chunker: ChunkerConfig::default(),
            embedding: EmbeddingConfig::default(),
            ingestion_batch_size: default_ingestion_batch_size(),
            page_size_cap_bytes: default_page_size_cap_bytes(),
            limit: None,
            logging: LoggingConfig::default(),
        }
    }
}

/// Chunker (C4) parameters.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct ChunkerConfig {
    #[serde(default = "default_target_tokens")]
    pub target_tokens: usize,
    #[serde(default = "default_min_tokens")]
    pub min_tokens: usize,
    #[serde(default = "default_overlap_tokens")]
    pub overlap_tokens: usize,
}

fn default_target_tokens() -> usize {
    800
}
fn default_min_tokens() -> usize {
    500
}
fn default_overlap_tokens() -> usize {
    100
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            target_tokens: default_target_tokens(),
            min_tokens: default_min_tokens(),
            overlap_tokens: default_overlap_tokens(),
        }
    }
}

impl ChunkerConfig {
    /// A chunk may grow up to this factor beyond `target_tokens` when the
    /// final window of a section is folded in rather than emitted short.
    pub const GROWTH_FACTOR: f64 = 1.25;

    pub fn validate(&self) -> Result<(), String> {
        if self.min_tokens == 0 {
            return Err("min_tokens must be > 0".into());
        }
        if self.overlap_tokens >= self.target_tokens {
            return Err(format!(
                "overlap_tokens ({}) must be smaller than target_tokens ({})",
                self.overlap_tokens, self.target_tokens
            ));
        }
        if self.min_tokens > self.target_tokens {
            return Err(format!(
                "min_tokens ({}) must not exceed target_tokens ({})",
                self.min_tokens, self.target_tokens
            ));
        }
        Ok(())
    }
}

/// Embedding engine (C6) configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EmbeddingConfig {
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default = "default_embedding_batch_size")]
    pub batch_size: usize,
    /// SQLite cache path for computed embeddings (defaults under output_dir).
    #[serde(default)]
    pub cache_path: Option<PathBuf>,
}

fn default_embedding_batch_size() -> usize {
    128
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: ProviderConfig::default(),
            batch_size: default_embedding_batch_size(),
            cache_path: None,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub file: Option<PathBuf>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

impl PipelineConfig {
    /// Load a config file (TOML) if present, then overlay
    /// `WIKI_PIPELINE_*` environment variables.
    pub fn load(config_path: Option<&Path>) -> Result<Self, crate::PipelineError> {
        let mut config = match config_path {
            Some(path) if path.exists() => {
                let content = fs::read_to_string(path)?;
                toml::from_str(&content)
                    .map_err(|e| crate::PipelineError::Config(format!("invalid config file: {e}")))?
            }
            Some(path) => {
                return Err(crate::PipelineError::Config(format!(
                    "config file not found: {}",
                    path.display()
                )))
            }
            None => PipelineConfig::default(),
        };
        config.apply_env_overrides(&std::env::vars().collect())?;
        Ok(config)
    }

    /// Overlay `WIKI_PIPELINE_*` environment variables. Nested keys use
    /// `__` as a delimiter, e.g. `WIKI_PIPELINE_CHUNKER__TARGET_TOKENS=900`.
    fn apply_env_overrides(&mut self, env: &HashMap<String, String>) -> Result<(), crate::PipelineError> {
        for (key, value) in env {
            let Some(rest) = key.strip_prefix("WIKI_PIPELINE_") else {
                continue;
            };
            let path: Vec<&str> = rest.split("__").collect();
            self.apply_env_key(&path, value)?;
        }
        Ok(())
    }

    fn apply_env_key(&mut self, path: &[&str], value: &str) -> Result<(), crate::PipelineError> {
        let bad = |field: &str| {
            crate::PipelineError::Config(format!("invalid value for {field}: {value}"))
        };
        match path {
            ["DUMP_PATH"] => self.dump_path = PathBuf::from(value),
            ["OUTPUT_DIR"] => self.output_dir = PathBuf::from(value),
            ["COLLECTION"] => self.collection = value.to_string(),
            ["INGESTION_BATCH_SIZE"] => {
                self.ingestion_batch_size = value.parse().map_err(|_| bad("INGESTION_BATCH_SIZE"))?
            }
            ["LIMIT"] => self.limit = Some(value.parse().map_err(|_| bad("LIMIT"))?),
            ["PAGE_SIZE_CAP_BYTES"] => {
                self.page_size_cap_bytes = value.parse().map_err(|_| bad("PAGE_SIZE_CAP_BYTES"))?
            }
            ["CHUNKER", "TARGET_TOKENS"] => {
                self.chunker.target_tokens = value.parse().map_err(|_| bad("CHUNKER__TARGET_TOKENS"))?
            }
            ["CHUNKER", "MIN_TOKENS"] => {
                self.chunker.min_tokens = value.parse().map_err(|_| bad("CHUNKER__MIN_TOKENS"))?
            }
            ["CHUNKER", "OVERLAP_TOKENS"] => {
                self.chunker.overlap_tokens = value.parse().map_err(|_| bad("CHUNKER__OVERLAP_TOKENS"))?
            }
            ["EMBEDDING", "BATCH_SIZE"] => {
                self.embedding.batch_size = value.parse().map_err(|_| bad("EMBEDDING__BATCH_SIZE"))?
            }
            ["LOG_LEVEL"] => self.logging.level = value.to_string(),
            ["LOG_FILE"] => self.logging.file = Some(PathBuf::from(value)),
            _ => {} // unrecognized keys are ignored, not fatal
        }
        Ok(())
    }

    /// Validate the fully-assembled configuration. Called once at startup;
    /// returning `Err` here maps to process exit code 1 before any I/O.
    pub fn validate(&self) -> Result<(), crate::PipelineError> {
        if self.dump_path.as_os_str().is_empty() {
            return Err(crate::PipelineError::Config("dump_path is required".into()));
        }
        self.chunker
            .validate()
            .map_err(crate::PipelineError::Config)?;
        if self.ingestion_batch_size == 0 {
            return Err(crate::PipelineError::Config(
                "ingestion_batch_size must be > 0".into(),
            ));
        }
        if self.embedding.batch_size == 0 {
            return Err(crate::PipelineError::Config(
                "embedding.batch_size must be > 0".into(),
            ));
        }
        if self.page_size_cap_bytes == 0 {
            return Err(crate::PipelineError::Config(
                "page_size_cap_bytes must be > 0".into(),
            ));
        }
        Ok(())
    }

    pub fn stats_path(&self) -> PathBuf {
        self.output_dir.join("processing_stats.json")
    }

    pub fn embedding_cache_path(&self) -> PathBuf {
        self.embedding
            .cache_path
            .clone()
            .unwrap_or_else(|| self.output_dir.join("embedding_cache.sqlite"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let cfg = PipelineConfig::default();
        assert_eq!(cfg.collection, "fallout_wiki");
        assert_eq!(cfg.chunker.target_tokens, 800);
        assert_eq!(cfg.chunker.min_tokens, 500);
        assert_eq!(cfg.chunker.overlap_tokens, 100);
        assert_eq!(cfg.ingestion_batch_size, 500);
        assert_eq!(cfg.embedding.batch_size, 128);
        assert_eq!(cfg.page_size_cap_bytes, 1_000_000);
    }

    #[test]
    fn rejects_zero_page_size_cap() {
        let mut cfg = PipelineConfig::default();
        cfg.dump_path = PathBuf::from("dump.xml");
        cfg.page_size_cap_bytes = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_empty_dump_path() {
        let cfg = PipelineConfig::default();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_overlap_not_smaller_than_target() {
        let mut cfg = PipelineConfig::default();
        cfg.dump_path = PathBuf::from("dump.xml");
        cfg.chunker.overlap_tokens = cfg.chunker.target_tokens;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn env_override_applies_nested_key() {
        let mut cfg = PipelineConfig::default();
        let mut env = HashMap::new();
        env.insert(
            "WIKI_PIPELINE_CHUNKER__TARGET_TOKENS".to_string(),
            "900".to_string(),
        );
        cfg.apply_env_overrides(&env).unwrap();
        assert_eq!(cfg.chunker.target_tokens, 900);
    }

    #[test]
    fn env_override_ignores_unrecognized_key() {
        let mut cfg = PipelineConfig::default();
        let mut env = HashMap::new();
        env.insert("WIKI_PIPELINE_NONSENSE".to_string(), "1".to_string());
        assert!(cfg.apply_env_overrides(&env).is_ok());
    }
}
