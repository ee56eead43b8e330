//! Page-processing progress bar, adapted from the teacher's import
//! progress reporter: same atomics-plus-indicatif shape, counting pages
//! (and chunks failed) instead of imported documents.

use indicatif::{ProgressBar, ProgressStyle};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

pub struct ImportProgress {
    bar: ProgressBar,
    pages_processed: AtomicU64,
    pages_failed: AtomicU64,
    start: Instant,
}

impl ImportProgress {
    pub fn new(total: u64) -> Self {
        let bar = ProgressBar::new(total);
        bar.set_style(
            ProgressStyle::with_template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec}) ETA: {eta}"
            )
            .unwrap()
            .progress_chars("#>-"),
        );

        Self {
            bar,
            pages_processed: AtomicU64::new(0),
            pages_failed: AtomicU64::new(0),
            start: Instant::now(),
        }
    }

    pub fn inc(&self, count: u64) {
        self.pages_processed.fetch_add(count, Ordering::Relaxed);
        self.bar.inc(count);
    }

    pub fn inc_failed(&self, count: u64) {
        self.pages_failed.fetch_add(count, Ordering::Relaxed);
        self.bar.inc(count);
    }

    pub fn finish(&self, interrupted: bool) {
        let processed = self.pages_processed.load(Ordering::Relaxed);
        let failed = self.pages_failed.load(Ordering::Relaxed);
        let elapsed = self.start.elapsed();

        let verb = if interrupted { "Interrupted after" } else { "Done in" };
        self.bar.finish_with_message(format!(
            "{} {:.1}s: {} pages processed ({} failed)",
            verb,
            elapsed.as_secs_f64(),
            processed,
            failed
        ));
    }

    pub fn elapsed_seconds(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }
}
