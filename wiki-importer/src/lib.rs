//! `process-wiki`: streams a MediaWiki XML dump through the wiki-core
//! pipeline (C2-C8) and writes a persona-queryable vector store.

pub mod dump;
pub mod error;
pub mod progress;

pub use dump::DumpReader;
pub use error::{ImportError, Result};
pub use progress::ImportProgress;
