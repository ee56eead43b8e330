//! `process-wiki` — decode a MediaWiki XML dump, run it through the
//! cleaning/extraction/chunking/enrichment/embedding/ingestion stages,
//! and leave a queryable vector store on disk.
//!
//! Exit codes: `0` success, `1` fatal configuration or I/O error, `2`
//! user interrupt (stats and partial log are still persisted).

use clap::Parser;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use wiki_core::cache::{KeyStrategy, SqliteCache};
use wiki_core::config::PipelineConfig;
use wiki_core::embedding::{create_provider, CachedEmbeddingProvider, ProviderConfig};
use wiki_core::ingest::IngestionManager;
use wiki_core::model::{Page, ProcessingStats, RunId};
use wiki_core::storage::LocalRecordStore;
use wiki_core::{chunker, clean, enrich, extract};
use wiki_importer::{DumpReader, ImportProgress};

#[derive(Parser)]
#[command(name = "process-wiki")]
#[command(about = "Ingest a MediaWiki XML dump into a persona-filtered vector store")]
#[command(version)]
struct Cli {
    /// Path to the MediaWiki XML export (.xml or .xml.bz2).
    xml_path: PathBuf,

    #[arg(long)]
    output_dir: Option<PathBuf>,

    #[arg(long)]
    collection: Option<String>,

    /// Target tokens per chunk.
    #[arg(long, alias = "target-tokens")]
    max_tokens: Option<usize>,

    #[arg(long)]
    min_tokens: Option<usize>,

    #[arg(long)]
    overlap_tokens: Option<usize>,

    /// Records flushed to the store per ingestion batch.
    #[arg(long)]
    batch_size: Option<usize>,

    #[arg(long)]
    embedding_batch_size: Option<usize>,

    /// Stop after N pages (for smoke tests / sampling).
    #[arg(long)]
    limit: Option<usize>,

    #[arg(long)]
    log_file: Option<PathBuf>,

    #[arg(long)]
    log_level: Option<String>,

    /// Load a PipelineConfig TOML file before applying the flags above.
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    embedding_provider: Option<String>,

    #[arg(long)]
    embedding_model: Option<String>,
}

impl Cli {
    fn apply_to(&self, config: &mut PipelineConfig) {
        if let Some(v) = &self.output_dir {
            config.output_dir = v.clone();
        }
        if let Some(v) = &self.collection {
            config.collection = v.clone();
        }
        if let Some(v) = self.max_tokens {
            config.chunker.target_tokens = v;
        }
        if let Some(v) = self.min_tokens {
            config.chunker.min_tokens = v;
        }
        if let Some(v) = self.overlap_tokens {
            config.chunker.overlap_tokens = v;
        }
        if let Some(v) = self.batch_size {
            config.ingestion_batch_size = v;
        }
        if let Some(v) = self.embedding_batch_size {
            config.embedding.batch_size = v;
        }
        if self.limit.is_some() {
            config.limit = self.limit;
        }
        if let Some(v) = &self.log_file {
            config.logging.file = Some(v.clone());
        }
        if let Some(v) = &self.log_level {
            config.logging.level = v.clone();
        }
        config.dump_path = self.xml_path.clone();

        match (self.embedding_provider.as_deref(), &self.embedding_model) {
            (Some("ollama"), model) => {
                let (url, default_model) = match &config.embedding.provider {
                    ProviderConfig::Ollama { url, model } => (url.clone(), model.clone()),
                    _ => ("http://localhost:11434".to_string(), "nomic-embed-text".to_string()),
                };
                config.embedding.provider = ProviderConfig::Ollama {
                    url,
                    model: model.clone().unwrap_or(default_model),
                };
            }
            (Some("openai"), model) => {
                let api_key = std::env::var("OPENAI_API_KEY").unwrap_or_default();
                config.embedding.provider = ProviderConfig::OpenAI {
                    url: "https://api.openai.com/v1".to_string(),
                    api_key,
                    model: model.clone().unwrap_or_else(|| "text-embedding-3-small".to_string()),
                };
            }
            #[cfg(feature = "provider-onnx")]
            (Some("onnx"), model) => {
                config.embedding.provider = ProviderConfig::Onnx {
                    model_path: None,
                    model_id: model.clone(),
                };
            }
            _ => {}
        }
    }
}

fn init_logging(config: &PipelineConfig) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_new(config.logging.level.to_lowercase())
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);

    if let Some(path) = &config.logging.file {
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        if let Ok(file) = std::fs::File::create(path) {
            subscriber.with_writer(std::sync::Mutex::new(file)).init();
            return;
        }
    }
    subscriber.init();
}

#[tokio::main]
async fn main() {
    let code = match run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("process-wiki: {e}");
            1
        }
    };
    std::process::exit(code);
}

async fn run() -> wiki_importer::Result<i32> {
    let cli = Cli::parse();

    if let Some(p) = &cli.embedding_provider {
        let known: &[&str] = if cfg!(feature = "provider-onnx") {
            &["ollama", "openai", "onnx"]
        } else {
            &["ollama", "openai"]
        };
        if !known.contains(&p.as_str()) {
            return Err(wiki_importer::ImportError::Config(format!(
                "unknown or disabled embedding provider: {p}"
            )));
        }
    }

    let mut config = PipelineConfig::load(cli.config.as_deref())?;
    cli.apply_to(&mut config);
    config
        .validate()
        .map_err(|e| wiki_importer::ImportError::Config(e.to_string()))?;

    init_logging(&config);

    let run_id = RunId::new();
    tracing::info!(%run_id, dump_path = %config.dump_path.display(), "starting ingestion run");

    let interrupted = Arc::new(AtomicBool::new(false));
    {
        let interrupted = interrupted.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupt received, finishing current page then stopping");
                interrupted.store(true, Ordering::SeqCst);
            }
        });
    }

    std::fs::create_dir_all(&config.output_dir)?;

    let cache = Arc::new(
        SqliteCache::new(config.embedding_cache_path())
            .map_err(|e| wiki_importer::ImportError::Config(format!("embedding cache: {e}")))?,
    );
    let provider = create_provider(&config.embedding.provider)
        .await
        .map_err(|e| wiki_importer::ImportError::Config(format!("embedding provider: {e}")))?;
    let embedder = CachedEmbeddingProvider::new(provider, cache, KeyStrategy::ModelText);

    let store = Arc::new(LocalRecordStore::new(config.output_dir.clone()));
    let stats = Arc::new(ProcessingStats::new());
    let mut manager = IngestionManager::new(
        store,
        config.collection.clone(),
        config.ingestion_batch_size,
        stats.clone(),
    );

    let total_estimate = wiki_importer::dump::estimate_page_count(&config.dump_path).unwrap_or(1);
    let progress = ImportProgress::new(total_estimate);

    let reader = match DumpReader::open(&config.dump_path) {
        Ok(r) => r,
        Err(e) => return Err(wiki_importer::ImportError::Io(e)),
    };

    let start = std::time::Instant::now();
    let mut pages_handled = 0usize;
    let mut was_interrupted = false;

    for page in reader {
        if interrupted.load(Ordering::SeqCst) {
            was_interrupted = true;
            break;
        }

        process_page(page, &config, &stats, &mut manager, &embedder).await;
        progress.inc(1);
        pages_handled += 1;

        if let Some(limit) = config.limit {
            if pages_handled >= limit {
                break;
            }
        }
    }

    manager
        .flush(&embedder)
        .await
        .map_err(wiki_importer::ImportError::Pipeline)?;

    progress.finish(was_interrupted);

    let snapshot = stats.snapshot(start.elapsed().as_secs_f64(), peak_memory_bytes());
    let stats_bytes = serde_json::to_vec_pretty(&snapshot)?;
    std::fs::write(config.stats_path(), stats_bytes)?;

    tracing::info!(
        %run_id,
        pages_seen = snapshot.pages_seen,
        pages_failed = snapshot.pages_failed,
        chunks_ingested = snapshot.chunks_ingested,
        chunks_failed = snapshot.chunks_failed,
        interrupted = was_interrupted,
        "ingestion run finished"
    );

    Ok(if was_interrupted { 2 } else { 0 })
}

/// C2 -> C3 -> C4 -> C5 -> C7 for one page. Any stage failure marks the
/// page failed and moves on; nothing here is fatal to the run.
async fn process_page(
    page: Page,
    config: &PipelineConfig,
    stats: &ProcessingStats,
    manager: &mut IngestionManager,
    embedder: &CachedEmbeddingProvider,
) {
    stats.inc_pages_seen();

    if !page.is_article_namespace() {
        stats.inc_pages_skipped_namespace();
        return;
    }
    if page.is_redirect() {
        stats.inc_pages_skipped_redirect();
        return;
    }
    if page.wikitext.trim().is_empty() {
        stats.inc_pages_skipped_empty();
        return;
    }

    let tree = match clean::clean(&page) {
        Ok(tree) => tree,
        Err(e) => {
            tracing::warn!(title = %page.title, error = %e, "wikitext clean failed, skipping page");
            stats.inc_pages_failed();
            return;
        }
    };

    let cleaned = extract::extract(&page.title, &tree, config.page_size_cap_bytes, stats);
    let raw_chunks = chunker::chunk(&cleaned, &config.chunker);
    stats.add_chunks_created(raw_chunks.len() as u64);

    for raw in raw_chunks {
        let chunk = enrich::enrich(raw, &cleaned, stats);
        if let Err(e) = manager.push(embedder, chunk).await {
            tracing::error!(title = %page.title, error = %e, "ingestion push failed");
            stats.inc_pages_failed();
        }
    }
}

fn peak_memory_bytes() -> u64 {
    // Best-effort; unavailable platforms report 0 rather than fail the run.
    std::fs::read_to_string("/proc/self/status")
        .ok()
        .and_then(|s| {
            s.lines()
                .find(|l| l.starts_with("VmHWM:"))
                .and_then(|l| l.split_whitespace().nth(1))
                .and_then(|kb| kb.parse::<u64>().ok())
        })
        .map(|kb| kb * 1024)
        .unwrap_or(0)
}
