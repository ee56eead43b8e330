use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic counters tracked across a run. Cloned into a plain snapshot
/// for serialization since the atomics themselves aren't `Serialize`.
#[derive(Debug, Default)]
pub struct ProcessingStats {
    pub pages_seen: AtomicU64,
    pub pages_skipped_redirect: AtomicU64,
    pub pages_skipped_empty: AtomicU64,
    pub pages_skipped_namespace: AtomicU64,
    pub pages_failed: AtomicU64,
    pub chunks_created: AtomicU64,
    pub chunks_ingested: AtomicU64,
    pub chunks_failed: AtomicU64,
    pub batches_written: AtomicU64,
    pub poison_records_skipped: AtomicU64,
    pub spatial_unknown: AtomicU64,
    pub pages_oversized: AtomicU64,
}

impl ProcessingStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self, elapsed_seconds: f64, peak_memory_bytes: u64) -> StatsSnapshot {
        StatsSnapshot {
            pages_seen: self.pages_seen.load(Ordering::Relaxed),
            pages_skipped_redirect: self.pages_skipped_redirect.load(Ordering::Relaxed),
            pages_skipped_empty: self.pages_skipped_empty.load(Ordering::Relaxed),
            pages_skipped_namespace: self.pages_skipped_namespace.load(Ordering::Relaxed),
            pages_failed: self.pages_failed.load(Ordering::Relaxed),
            chunks_created: self.chunks_created.load(Ordering::Relaxed),
            chunks_ingested: self.chunks_ingested.load(Ordering::Relaxed),
            chunks_failed: self.chunks_failed.load(Ordering::Relaxed),
            batches_written: self.batches_written.load(Ordering::Relaxed),
            poison_records_skipped: self.poison_records_skipped.load(Ordering::Relaxed),
            spatial_unknown: self.spatial_unknown.load(Ordering::Relaxed),
            pages_oversized: self.pages_oversized.load(Ordering::Relaxed),
            elapsed_seconds,
            peak_memory_bytes,
        }
    }

    pub fn inc_pages_seen(&self) {
        self.pages_seen.fetch_add(1, Ordering::Relaxed);
    }
    pub fn inc_pages_skipped_redirect(&self) {
        self.pages_skipped_redirect.fetch_add(1, Ordering::Relaxed);
    }
    pub fn inc_pages_skipped_empty(&self) {
        self.pages_skipped_empty.fetch_add(1, Ordering::Relaxed);
    }
    pub fn inc_pages_skipped_namespace(&self) {
        self.pages_skipped_namespace.fetch_add(1, Ordering::Relaxed);
    }
    pub fn inc_pages_failed(&self) {
        self.pages_failed.fetch_add(1, Ordering::Relaxed);
    }
    pub fn add_chunks_created(&self, n: u64) {
        self.chunks_created.fetch_add(n, Ordering::Relaxed);
    }
    pub fn add_chunks_ingested(&self, n: u64) {
        self.chunks_ingested.fetch_add(n, Ordering::Relaxed);
    }
    pub fn add_chunks_failed(&self, n: u64) {
        self.chunks_failed.fetch_add(n, Ordering::Relaxed);
    }
    pub fn inc_batches_written(&self) {
        self.batches_written.fetch_add(1, Ordering::Relaxed);
    }
    pub fn inc_poison_records_skipped(&self) {
        self.poison_records_skipped.fetch_add(1, Ordering::Relaxed);
    }
    pub fn inc_spatial_unknown(&self) {
        self.spatial_unknown.fetch_add(1, Ordering::Relaxed);
    }
    pub fn inc_pages_oversized(&self) {
        self.pages_oversized.fetch_add(1, Ordering::Relaxed);
    }
}

/// Serializable point-in-time view of [`ProcessingStats`], written to
/// `<output_dir>/processing_stats.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub pages_seen: u64,
    pub pages_skipped_redirect: u64,
    pub pages_skipped_empty: u64,
    pub pages_skipped_namespace: u64,
    pub pages_failed: u64,
    pub chunks_created: u64,
    pub chunks_ingested: u64,
    pub chunks_failed: u64,
    pub batches_written: u64,
    pub poison_records_skipped: u64,
    pub spatial_unknown: u64,
    pub pages_oversized: u64,
    pub elapsed_seconds: f64,
    pub peak_memory_bytes: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reflects_increments() {
        let stats = ProcessingStats::new();
        stats.inc_pages_seen();
        stats.inc_pages_seen();
        stats.inc_pages_failed();
        stats.add_chunks_created(5);

        let snap = stats.snapshot(1.5, 1024);
        assert_eq!(snap.pages_seen, 2);
        assert_eq!(snap.pages_failed, 1);
        assert_eq!(snap.chunks_created, 5);
        assert_eq!(snap.elapsed_seconds, 1.5);
    }
}
