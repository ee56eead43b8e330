//! End-to-end C2 -> C8 test: one page goes through cleaning, extraction,
//! chunking, enrichment, ingestion, and a persona-filtered query.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;
use wiki_core::cache::{KeyStrategy, SqliteCache};
use wiki_core::config::ChunkerConfig;
use wiki_core::embedding::{CachedEmbeddingProvider, EmbeddingProvider};
use wiki_core::ingest::IngestionManager;
use wiki_core::model::{Page, ProcessingStats};
use wiki_core::query::{Persona, QueryFacade};
use wiki_core::storage::LocalRecordStore;
use wiki_core::{chunker, clean, enrich, extract};

struct FixedProvider {
    calls: AtomicUsize,
}

#[async_trait]
impl EmbeddingProvider for FixedProvider {
    async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        Ok(self.embed_batch(&[text]).await?.remove(0))
    }

    async fn embed_batch(&self, texts: &[&str]) -> anyhow::Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        // Deterministic stand-in: a vector that leans toward [1, 0] for
        // text mentioning "vault" and toward [0, 1] otherwise, so the
        // query step below has something meaningful to rank.
        Ok(texts
            .iter()
            .map(|t| {
                if t.to_lowercase().contains("vault") {
                    vec![1.0, 0.0]
                } else {
                    vec![0.0, 1.0]
                }
            })
            .collect())
    }

    fn model_name(&self) -> &str {
        "fixed"
    }

    fn dimensions(&self) -> usize {
        2
    }
}

fn wikitext() -> &'static str {
    "'''Vault 13''' is a [[Vault-Tec]] [[Category:Vaults]] shelter built in 2161.\n\n\
     == History ==\nIt was sealed before the Great War and opened 150 years later."
}

#[tokio::test]
async fn page_round_trips_through_every_stage_and_is_queryable() {
    let temp = TempDir::new().unwrap();
    let page = Page {
        title: "Vault 13".to_string(),
        namespace: 0,
        timestamp: "2023-01-01T00:00:00Z".to_string(),
        wikitext: wikitext().to_string(),
        redirect_target: None,
    };

    let stats = Arc::new(ProcessingStats::new());

    let tree = clean::clean(&page).expect("clean should succeed on well-formed wikitext");
    let cleaned = extract::extract(&page.title, &tree, usize::MAX, &stats);
    assert!(cleaned.offsets_are_valid());
    assert!(!cleaned.plain_text.is_empty());

    let raw_chunks = chunker::chunk(&cleaned, &ChunkerConfig::default());
    assert!(!raw_chunks.is_empty(), "a non-empty page must produce at least one chunk");

    let provider = Box::new(FixedProvider {
        calls: AtomicUsize::new(0),
    });
    let cache = Arc::new(SqliteCache::in_memory().unwrap());
    let embedder = CachedEmbeddingProvider::new(provider, cache, KeyStrategy::ModelText);

    let store = Arc::new(LocalRecordStore::new(temp.path()));
    let mut manager = IngestionManager::new(store.clone(), "fallout_wiki", 10, stats.clone());

    for raw in raw_chunks {
        let chunk = enrich::enrich(raw, &cleaned, &stats);
        manager.push(&embedder, chunk).await.unwrap();
    }
    manager.flush(&embedder).await.unwrap();

    assert_eq!(stats.snapshot(0.0, 0).chunks_failed, 0);

    let facade = QueryFacade::new(store);
    let persona = Persona::unrestricted("everyone");
    let results = facade
        .search("fallout_wiki", "Vault 13 shelter", &persona, 5, &embedder)
        .await
        .unwrap();

    assert!(!results.is_empty());
    assert!(results[0].document.to_lowercase().contains("vault"));
}
