//! Typed data model shared by every pipeline stage.
//!
//! Replaces the dict-of-untyped-fields approach with tagged records
//! validated at construction; `ChunkMetadata::to_flat()` is the single
//! path from the nested representation to the scalar-only mapping the
//! store accepts.

mod chunk;
mod enriched;
mod page;
mod stats;

pub use chunk::{Chunk, ChunkMetadata, StoreRecord, StructuralMetadata};
pub use enriched::{ContentType, EnrichedMetadata, InfoSource, KnowledgeTier, TimePeriod};
pub use page::{CleanedPage, Infobox, Page, SectionInfo, Template, WikiLink};
pub use stats::{ProcessingStats, StatsSnapshot};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Minted once per process invocation; keys the stats file and log lines
/// so concurrent runs against the same output directory don't interleave.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunId(Uuid);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
