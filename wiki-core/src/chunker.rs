//! Section-aware token-budgeted chunker (C4).
//!
//! Candidate blocks come straight from [`crate::model::SectionInfo`]
//! ranges, which already partition a page's `plain_text` into
//! contiguous, non-overlapping spans; this module only has to decide how
//! to window each block's tokens.

use crate::config::ChunkerConfig;
use crate::model::{CleanedPage, SectionInfo, StructuralMetadata};
use crate::tokenizer;

/// C4's output before C5 attaches temporal/spatial/trust labels.
#[derive(Debug, Clone)]
pub struct RawChunk {
    pub text: String,
    pub chunk_index: usize,
    pub structural: StructuralMetadata,
}

pub fn chunk(page: &CleanedPage, config: &ChunkerConfig) -> Vec<RawChunk> {
    let mut raw_chunks = Vec::new();
    let mut index = 0usize;

    for section in &page.sections {
        if section.start_offset >= section.end_offset {
            continue;
        }
        let block_text = &page.plain_text[section.start_offset..section.end_offset];
        if block_text.trim().is_empty() {
            continue;
        }
        for window in window_block(block_text, config) {
            raw_chunks.push(RawChunk {
                text: window,
                chunk_index: index,
                structural: build_structural(page, section, index),
            });
            index += 1;
        }
    }

    raw_chunks
}

/// Slide a `target_tokens`-wide window with stride `target_tokens -
/// overlap_tokens` over one block; fold a too-short final window into
/// its predecessor rather than emitting a sub-`min_tokens` tail.
fn window_block(text: &str, config: &ChunkerConfig) -> Vec<String> {
    let spans = tokenizer::tokenize(text);
    if spans.is_empty() {
        return Vec::new();
    }
    if spans.len() <= config.target_tokens {
        return vec![text.trim().to_string()];
    }

    let stride = config.target_tokens - config.overlap_tokens;
    let mut windows: Vec<(usize, usize)> = Vec::new();
    let mut start = 0usize;
    loop {
        let end = (start + config.target_tokens).min(spans.len());
        windows.push((start, end));
        if end == spans.len() {
            break;
        }
        start += stride;
    }

    if windows.len() > 1 {
        let (last_start, last_end) = windows[windows.len() - 1];
        if last_end - last_start < config.min_tokens {
            let (prev_start, _) = windows[windows.len() - 2];
            // Merging pulls the whole predecessor window in by default,
            // but that can grow past the 1.25x tolerance when the tail
            // is close to min_tokens; cap it by starting the merged
            // window later instead of at prev_start.
            let max_len = ((config.target_tokens as f64) * ChunkerConfig::GROWTH_FACTOR) as usize;
            let merged_start = prev_start.max(last_end.saturating_sub(max_len));
            windows.pop();
            windows.pop();
            windows.push((merged_start, last_end));
        }
    }

    windows
        .into_iter()
        .map(|(s, e)| {
            let byte_start = spans[s].start;
            let byte_end = spans[e - 1].end;
            text[byte_start..byte_end].trim().to_string()
        })
        .collect()
}

fn build_structural(page: &CleanedPage, section: &SectionInfo, chunk_index: usize) -> StructuralMetadata {
    StructuralMetadata {
        wiki_title: page.title.clone(),
        section_title: section.title.clone(),
        section_path: section.path.clone(),
        section_level: section.level,
        categories: page.categories.clone(),
        wikilink_targets: page.wikilinks.iter().map(|l| l.target.clone()).collect(),
        infobox_types: page.infoboxes.iter().map(|i| i.type_name.clone()).collect(),
        game_refs: page.game_refs.iter().cloned().collect(),
        chunk_index,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn page_with_text(text: &str) -> CleanedPage {
        CleanedPage {
            title: "Vault 13".to_string(),
            plain_text: text.to_string(),
            sections: vec![SectionInfo {
                level: 1,
                title: "Introduction".to_string(),
                path: "Introduction".to_string(),
                start_offset: 0,
                end_offset: text.len(),
            }],
            categories: vec!["Vaults".to_string()],
            wikilinks: vec![],
            infoboxes: vec![],
            templates: vec![],
            game_refs: BTreeSet::new(),
        }
    }

    #[test]
    fn short_stub_is_one_chunk() {
        let page = page_with_text("Vault 13 is a small vault stub.");
        let config = ChunkerConfig::default();
        let chunks = chunk(&page, &config);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].chunk_index, 0);
    }

    #[test]
    fn chunk_indices_are_sequential() {
        let words: Vec<String> = (0..2000).map(|i| format!("word{i}")).collect();
        let page = page_with_text(&words.join(" "));
        let config = ChunkerConfig::default();
        let chunks = chunk(&page, &config);
        assert!(chunks.len() > 1);
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.chunk_index, i);
        }
    }

    #[test]
    fn adjacent_windows_overlap_by_configured_amount() {
        let words: Vec<String> = (0..2000).map(|i| format!("word{i}")).collect();
        let page = page_with_text(&words.join(" "));
        let config = ChunkerConfig::default();
        let chunks = chunk(&page, &config);
        assert!(chunks.len() >= 2);

        let first_words: Vec<&str> = chunks[0].text.split_whitespace().collect();
        let second_words: Vec<&str> = chunks[1].text.split_whitespace().collect();
        let suffix = &first_words[first_words.len() - config.overlap_tokens..];
        let prefix = &second_words[..config.overlap_tokens];
        assert_eq!(suffix, prefix);
    }

    #[test]
    fn no_window_shorter_than_min_tokens_except_a_whole_short_page() {
        let words: Vec<String> = (0..1100).map(|i| format!("word{i}")).collect();
        let page = page_with_text(&words.join(" "));
        let config = ChunkerConfig::default();
        let chunks = chunk(&page, &config);
        for c in &chunks {
            let n = tokenizer::count_tokens(&c.text);
            assert!(n >= config.min_tokens || chunks.len() == 1);
        }
    }

    #[test]
    fn merged_final_window_never_exceeds_growth_factor() {
        // With defaults (target=800, overlap=100, min=500) a naive full
        // merge of the last two 700-stride windows here would produce a
        // ~1100-token chunk, well past the 1.25x (1000-token) tolerance.
        let words: Vec<String> = (0..1100).map(|i| format!("word{i}")).collect();
        let page = page_with_text(&words.join(" "));
        let config = ChunkerConfig::default();
        let chunks = chunk(&page, &config);
        let max_len = (config.target_tokens as f64 * ChunkerConfig::GROWTH_FACTOR) as usize;
        for c in &chunks {
            let n = tokenizer::count_tokens(&c.text);
            assert!(n <= max_len, "chunk of {n} tokens exceeds growth cap of {max_len}");
        }
    }
}
