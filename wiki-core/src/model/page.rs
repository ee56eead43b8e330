use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Result of decoding one XML revision (C1). Consumed once by C2+C3, then
/// discarded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page {
    pub title: String,
    /// MediaWiki namespace id; only namespace 0 ("article") is chunked.
    pub namespace: i64,
    pub timestamp: String,
    pub wikitext: String,
    pub redirect_target: Option<String>,
}

impl Page {
    pub fn is_article_namespace(&self) -> bool {
        self.namespace == 0
    }

    pub fn is_redirect(&self) -> bool {
        self.redirect_target.is_some()
    }
}

/// Plain text + structural view of a [`Page`] (C2+C3 output).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanedPage {
    pub title: String,
    /// Markup stripped, NFC-normalised, whitespace collapsed.
    pub plain_text: String,
    pub sections: Vec<SectionInfo>,
    pub categories: Vec<String>,
    pub wikilinks: Vec<WikiLink>,
    pub infoboxes: Vec<Infobox>,
    pub templates: Vec<Template>,
    pub game_refs: BTreeSet<String>,
}

impl CleanedPage {
    /// Every offset referenced by a section must lie within `plain_text`.
    pub fn offsets_are_valid(&self) -> bool {
        let len = self.plain_text.len();
        self.sections
            .iter()
            .all(|s| s.start_offset <= s.end_offset && s.end_offset <= len)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionInfo {
    /// 1-6; the implicit "Introduction" root section is level 1.
    pub level: u8,
    pub title: String,
    /// Breadcrumb of ancestor titles joined by `" > "`.
    pub path: String,
    pub start_offset: usize,
    pub end_offset: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WikiLink {
    pub target: String,
    pub display: String,
    pub is_category: bool,
    pub is_file: bool,
}

impl WikiLink {
    pub fn new(target: impl Into<String>, display: Option<String>) -> Self {
        let target = target.into();
        let display = display.unwrap_or_else(|| target.clone());
        Self {
            target,
            display,
            is_category: false,
            is_file: false,
        }
    }
}

/// Ordered mapping from parameter name to string value; unnamed
/// parameters are numbered from 1 (`"1"`, `"2"`, ...).
pub type Parameters = Vec<(String, String)>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Infobox {
    pub type_name: String,
    pub parameters: Parameters,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Template {
    pub type_name: String,
    pub parameters: Parameters,
}
