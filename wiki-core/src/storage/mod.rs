//! Durable storage for the ingestion manager's record store (C7).
//!
//! Records are persisted as one blob per collection under the output
//! directory; see [`wiki_storage`] for the underlying path layout.

mod vector_store;

pub use vector_store::{LocalRecordStore, RecordStore};
