//! Ingestion manager (C7): buffers enriched chunks, drives the embedding
//! engine (C6) in batches, flattens metadata, and writes idempotent
//! upserts to the record store.
//!
//! `ChunkMetadata::to_flat()` is the only path from a chunk's nested
//! metadata to the store's scalar mapping; this module never builds a
//! flat record by hand. Record ids are deterministic
//! (`Chunk::make_id`), so re-running the pipeline against an unchanged
//! collection overwrites existing entries rather than duplicating them.

use crate::embedding::CachedEmbeddingProvider;
use crate::model::{Chunk, ProcessingStats, StoreRecord};
use crate::storage::RecordStore;
use crate::PipelineError;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Outcome of one write attempt, following the "explicit result values"
/// design note: batch boundaries never use exceptions for control flow.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOutcome {
    /// Every id in this sub-batch was upserted.
    Written(Vec<String>),
    /// The store rejected the batch; it was bisected and retried.
    Retried,
    /// A single record failed repeatedly and was isolated and skipped.
    SkippedPoison(String),
}

/// Maximum number of bisection levels attempted before a single record is
/// isolated and logged as poison (spec §4.7/§7: "up to two levels of
/// bisection").
const MAX_BISECTION_DEPTH: u8 = 2;

pub struct IngestionManager {
    store: Arc<dyn RecordStore>,
    collection: String,
    batch_size: usize,
    buffer: Vec<Chunk>,
    stats: Arc<ProcessingStats>,
}

impl IngestionManager {
    pub fn new(
        store: Arc<dyn RecordStore>,
        collection: impl Into<String>,
        batch_size: usize,
        stats: Arc<ProcessingStats>,
    ) -> Self {
        Self {
            store,
            collection: collection.into(),
            batch_size,
            buffer: Vec::new(),
            stats,
        }
    }

    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Buffer one chunk; flushes automatically once `batch_size` chunks
    /// have accumulated.
    pub async fn push(
        &mut self,
        provider: &CachedEmbeddingProvider,
        chunk: Chunk,
    ) -> Result<Vec<WriteOutcome>, PipelineError> {
        self.buffer.push(chunk);
        if self.buffer.len() >= self.batch_size {
            self.flush(provider).await
        } else {
            Ok(Vec::new())
        }
    }

    /// Embed and write whatever remains buffered. Safe to call on an
    /// empty buffer (e.g. at end-of-run or on interrupt).
    pub async fn flush(
        &mut self,
        provider: &CachedEmbeddingProvider,
    ) -> Result<Vec<WriteOutcome>, PipelineError> {
        if self.buffer.is_empty() {
            return Ok(Vec::new());
        }
        let batch = std::mem::take(&mut self.buffer);
        self.ingest_batch(provider, batch).await
    }

    async fn ingest_batch(
        &self,
        provider: &CachedEmbeddingProvider,
        chunks: Vec<Chunk>,
    ) -> Result<Vec<WriteOutcome>, PipelineError> {
        let (embedded, failed) = embed_with_retry(provider, chunks).await;
        if !failed.is_empty() {
            self.stats.add_chunks_failed(failed.len() as u64);
            for chunk in &failed {
                tracing::error!(chunk_id = %chunk.id, "embedding failed persistently, chunk dropped");
            }
        }
        if embedded.is_empty() {
            return Ok(Vec::new());
        }
        let records: Vec<StoreRecord> = embedded
            .into_iter()
            .map(|(chunk, vector)| StoreRecord::from_chunk(&chunk, vector))
            .collect();
        self.write_batch(records, 0).await
    }

    fn write_batch<'a>(
        &'a self,
        records: Vec<StoreRecord>,
        depth: u8,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<Vec<WriteOutcome>, PipelineError>> + Send + 'a>>
    {
        Box::pin(async move {
            if records.is_empty() {
                return Ok(Vec::new());
            }
            match self.try_write(&records).await {
                Ok(ids) => {
                    self.stats.inc_batches_written();
                    self.stats.add_chunks_ingested(ids.len() as u64);
                    Ok(vec![WriteOutcome::Written(ids)])
                }
                Err(e) if records.len() == 1 => {
                    let id = records[0].id.clone();
                    tracing::error!(error = %e, id = %id, "store rejected single record, skipping as poison");
                    self.stats.inc_poison_records_skipped();
                    Ok(vec![WriteOutcome::SkippedPoison(id)])
                }
                Err(e) if depth < MAX_BISECTION_DEPTH => {
                    tracing::warn!(error = %e, depth, count = records.len(), "store rejected batch, bisecting");
                    let mid = records.len() / 2;
                    let mut records = records;
                    let right = records.split_off(mid);
                    let left = records;
                    let mut outcomes = vec![WriteOutcome::Retried];
                    outcomes.extend(self.write_batch(left, depth + 1).await?);
                    outcomes.extend(self.write_batch(right, depth + 1).await?);
                    Ok(outcomes)
                }
                Err(e) => {
                    // Bisection exhausted: isolate the first record as
                    // poison and keep trying the remainder at this depth.
                    let poison = records[0].id.clone();
                    tracing::error!(error = %e, id = %poison, "record still rejected after max bisection, skipping");
                    self.stats.inc_poison_records_skipped();
                    let mut outcomes = vec![WriteOutcome::SkippedPoison(poison)];
                    outcomes.extend(self.write_batch(records[1..].to_vec(), depth).await?);
                    Ok(outcomes)
                }
            }
        })
    }

    /// Read-modify-write the whole collection blob. Idempotent: writing
    /// the same id twice overwrites rather than duplicates, so crashing
    /// mid-batch just means the next run recomputes and re-upserts.
    async fn try_write(&self, records: &[StoreRecord]) -> Result<Vec<String>, PipelineError> {
        let existing = self.load_existing().await?;
        let mut by_id: BTreeMap<String, StoreRecord> =
            existing.into_iter().map(|r| (r.id.clone(), r)).collect();
        let ids: Vec<String> = records.iter().map(|r| r.id.clone()).collect();
        for record in records {
            by_id.insert(record.id.clone(), record.clone());
        }
        let all: Vec<StoreRecord> = by_id.into_values().collect();
        let bytes = serde_json::to_vec(&all)?;
        self.store.save(&self.collection, &bytes).await?;
        Ok(ids)
    }

    async fn load_existing(&self) -> Result<Vec<StoreRecord>, PipelineError> {
        match self.store.load(&self.collection).await? {
            Some(bytes) => Ok(serde_json::from_slice(&bytes)?),
            None => Ok(Vec::new()),
        }
    }
}

/// C6 failure semantics: a transient embedding error halves the batch and
/// retries once; a chunk that still fails at half size is marked failed
/// rather than retried indefinitely.
async fn embed_with_retry(
    provider: &CachedEmbeddingProvider,
    chunks: Vec<Chunk>,
) -> (Vec<(Chunk, Vec<f32>)>, Vec<Chunk>) {
    if chunks.is_empty() {
        return (Vec::new(), Vec::new());
    }
    let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
    match provider.embed_batch(&texts).await {
        Ok(vectors) if vectors.len() == chunks.len() => {
            (chunks.into_iter().zip(vectors).collect(), Vec::new())
        }
        Ok(_) | Err(_) if chunks.len() == 1 => {
            tracing::error!("embedding failed for single chunk after retry budget exhausted");
            (Vec::new(), chunks)
        }
        Ok(_) | Err(_) => {
            tracing::warn!(count = chunks.len(), "embedding batch failed, retrying at half size");
            let mid = chunks.len().div_ceil(2);
            let mut chunks = chunks;
            let second = chunks.split_off(mid);
            let first = chunks;
            let (ok1, failed1) = embed_once(provider, first).await;
            let (ok2, failed2) = embed_once(provider, second).await;
            let mut ok = ok1;
            ok.extend(ok2);
            let mut failed = failed1;
            failed.extend(failed2);
            (ok, failed)
        }
    }
}

/// A single attempt with no further retry, used for the halved sub-batches.
async fn embed_once(
    provider: &CachedEmbeddingProvider,
    chunks: Vec<Chunk>,
) -> (Vec<(Chunk, Vec<f32>)>, Vec<Chunk>) {
    if chunks.is_empty() {
        return (Vec::new(), Vec::new());
    }
    let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
    match provider.embed_batch(&texts).await {
        Ok(vectors) if vectors.len() == chunks.len() => {
            (chunks.into_iter().zip(vectors).collect(), Vec::new())
        }
        _ => (Vec::new(), chunks),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::SqliteCache;
    use crate::embedding::EmbeddingProvider;
    use crate::model::{ChunkMetadata, EnrichedMetadata, StructuralMetadata};
    use crate::storage::LocalRecordStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    struct MockProvider {
        dims: usize,
        fail_texts: Vec<String>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl EmbeddingProvider for MockProvider {
        async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
            Ok(self.embed_batch(&[text]).await?.remove(0))
        }

        async fn embed_batch(&self, texts: &[&str]) -> anyhow::Result<Vec<Vec<f32>>> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            if texts.iter().any(|t| self.fail_texts.iter().any(|f| f == t)) {
                anyhow::bail!("simulated transient embedding failure");
            }
            Ok(texts.iter().map(|_| vec![0.1f32; self.dims]).collect())
        }

        fn model_name(&self) -> &str {
            "mock"
        }

        fn dimensions(&self) -> usize {
            self.dims
        }
    }

    fn chunk(title: &str, index: usize, text: &str) -> Chunk {
        Chunk {
            id: Chunk::make_id(title, index, text),
            text: text.to_string(),
            chunk_index: index,
            metadata: ChunkMetadata {
                structural: StructuralMetadata {
                    wiki_title: title.to_string(),
                    section_title: "Introduction".to_string(),
                    section_path: "Introduction".to_string(),
                    section_level: 1,
                    categories: vec![],
                    wikilink_targets: vec![],
                    infobox_types: vec![],
                    game_refs: vec![],
                    chunk_index: index,
                },
                enriched: EnrichedMetadata {
                    time_period: None,
                    year_min: None,
                    year_max: None,
                    is_pre_war: false,
                    is_post_war: false,
                    location: None,
                    region_type: None,
                    content_type: crate::model::ContentType::Other,
                    knowledge_tier: crate::model::KnowledgeTier::Common,
                    info_source: crate::model::InfoSource::Public,
                    temporal_confidence: 0.0,
                    spatial_confidence: 0.0,
                    content_type_confidence: 0.0,
                    knowledge_tier_confidence: 0.0,
                },
            },
        }
    }

    async fn cached_provider(fail_texts: Vec<String>) -> CachedEmbeddingProvider {
        let provider = Box::new(MockProvider {
            dims: 4,
            fail_texts,
            calls: AtomicUsize::new(0),
        });
        let cache = Arc::new(SqliteCache::in_memory().unwrap());
        CachedEmbeddingProvider::new(provider, cache, crate::cache::KeyStrategy::ModelText)
    }

    #[tokio::test]
    async fn writes_batch_and_is_idempotent_on_rerun() {
        let temp = TempDir::new().unwrap();
        let store = Arc::new(LocalRecordStore::new(temp.path()));
        let stats = Arc::new(ProcessingStats::new());
        let provider = cached_provider(vec![]).await;

        let mut manager = IngestionManager::new(store.clone(), "fallout_wiki", 10, stats.clone());
        manager.push(&provider, chunk("Vault 13", 0, "text one")).await.unwrap();
        let outcomes = manager.flush(&provider).await.unwrap();
        assert_eq!(outcomes.len(), 1);
        assert!(matches!(&outcomes[0], WriteOutcome::Written(ids) if ids.len() == 1));

        // Re-running with the same chunk id upserts rather than duplicating.
        let mut manager2 = IngestionManager::new(store.clone(), "fallout_wiki", 10, stats.clone());
        manager2.push(&provider, chunk("Vault 13", 0, "text one")).await.unwrap();
        manager2.flush(&provider).await.unwrap();

        let bytes = store.load("fallout_wiki").await.unwrap().unwrap();
        let records: Vec<StoreRecord> = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(records.len(), 1);
    }

    #[tokio::test]
    async fn transient_embedding_failure_halves_and_marks_remainder_failed() {
        let temp = TempDir::new().unwrap();
        let store = Arc::new(LocalRecordStore::new(temp.path()));
        let stats = Arc::new(ProcessingStats::new());
        let provider = cached_provider(vec!["bad".to_string()]).await;

        let mut manager = IngestionManager::new(store, "fallout_wiki", 10, stats.clone());
        manager.push(&provider, chunk("Vault 13", 0, "good")).await.unwrap();
        manager.push(&provider, chunk("Vault 13", 1, "bad")).await.unwrap();
        let outcomes = manager.flush(&provider).await.unwrap();

        let written: usize = outcomes
            .iter()
            .map(|o| match o {
                WriteOutcome::Written(ids) => ids.len(),
                _ => 0,
            })
            .sum();
        assert_eq!(written, 1);
        assert_eq!(stats.snapshot(0.0, 0).chunks_failed, 1);
    }
}
