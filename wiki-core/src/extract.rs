//! Structural extractor (C3): derives non-text metadata from the parse
//! tree C2 produced. Categories, wikilinks, infoboxes, templates and
//! game references are all pulled from the original wikitext rather than
//! the cleaned plain text, since cleaning drops the markup these signals
//! live in; sections come straight from [`crate::clean::ParseTree`].

use crate::clean::ParseTree;
use crate::model::{CleanedPage, Infobox, Parameters, ProcessingStats, Template, WikiLink};
use regex::Regex;
use std::collections::BTreeSet;
use std::sync::OnceLock;

/// Canonical game-code abbreviation table (C3 "game references").
const GAME_ABBREVIATIONS: &[(&str, &str)] = &[
    ("FO1", "FO1"),
    ("FO2", "FO2"),
    ("FO3", "FO3"),
    ("FNV", "FNV"),
    ("FO4", "FO4"),
    ("FO76", "FO76"),
    ("FOT", "FOT"),
    ("FOBOS", "FOBOS"),
];

struct Regexes {
    category_link: Regex,
    any_link: Regex,
    game_ref: Regex,
}

fn regexes() -> &'static Regexes {
    static REGEXES: OnceLock<Regexes> = OnceLock::new();
    REGEXES.get_or_init(|| Regexes {
        category_link: Regex::new(r"(?i)\[\[Category:([^\]|]*)(?:\|[^\]]*)?\]\]").unwrap(),
        any_link: Regex::new(r"\[\[([^\]|]*)(?:\|([^\]]*))?\]\]").unwrap(),
        game_ref: Regex::new(r"\b([A-Za-z]{2,5}\d{0,2})\b").unwrap(),
    })
}

/// Pages whose raw wikitext exceeds `size_cap_bytes` are still fully
/// extracted and chunked; the only effect of exceeding the cap is a
/// `pages_oversized` stats increment (spec §4.3 edge rule).
pub fn extract(
    page_title: &str,
    tree: &ParseTree,
    size_cap_bytes: usize,
    stats: &ProcessingStats,
) -> CleanedPage {
    if tree.wikitext.len() > size_cap_bytes {
        stats.inc_pages_oversized();
    }

    let categories = extract_categories(&tree.wikitext);
    let wikilinks = extract_wikilinks(&tree.wikitext);
    let (infoboxes, templates) = extract_templates(&tree.wikitext);
    let game_refs = extract_game_refs(&tree.wikitext, &templates);

    CleanedPage {
        title: page_title.to_string(),
        plain_text: tree.plain_text.clone(),
        sections: tree.sections.clone(),
        categories,
        wikilinks,
        infoboxes,
        templates,
        game_refs,
    }
}

fn extract_categories(wikitext: &str) -> Vec<String> {
    let mut seen = BTreeSet::new();
    let mut ordered = Vec::new();
    for caps in regexes().category_link.captures_iter(wikitext) {
        let name = caps[1].trim().to_string();
        if seen.insert(name.clone()) {
            ordered.push(name);
        }
    }
    ordered
}

fn extract_wikilinks(wikitext: &str) -> Vec<WikiLink> {
    let mut links = Vec::new();
    for caps in regexes().any_link.captures_iter(wikitext) {
        let target = caps[1].trim().to_string();
        if target.is_empty() {
            continue;
        }
        let display = caps
            .get(2)
            .map(|m| m.as_str().trim().to_string())
            .filter(|d| !d.is_empty());
        let lower = target.to_lowercase();
        let is_category = lower.starts_with("category:");
        let is_file = lower.starts_with("file:") || lower.starts_with("image:");
        let mut link = WikiLink::new(target, display);
        link.is_category = is_category;
        link.is_file = is_file;
        links.push(link);
    }
    links
}

/// Top-level `{{...}}` bodies, recursing into nested templates.
fn find_template_bodies(text: &str) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let mut bodies = Vec::new();
    let mut depth = 0i32;
    let mut start = 0usize;
    let mut idx = 0usize;
    while idx + 1 < chars.len() {
        if chars[idx] == '{' && chars[idx + 1] == '{' {
            if depth == 0 {
                start = idx + 2;
            }
            depth += 1;
            idx += 2;
            continue;
        }
        if chars[idx] == '}' && chars[idx + 1] == '}' && depth > 0 {
            depth -= 1;
            if depth == 0 {
                let body: String = chars[start..idx].iter().collect();
                bodies.push(body);
            }
            idx += 2;
            continue;
        }
        idx += 1;
    }
    bodies
}

/// Split on `sep` at brace/bracket depth 0.
fn split_top_level(s: &str, sep: char) -> Vec<String> {
    let chars: Vec<char> = s.chars().collect();
    let mut depth_brace = 0i32;
    let mut depth_bracket = 0i32;
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut idx = 0usize;
    while idx < chars.len() {
        if idx + 1 < chars.len() && chars[idx] == '{' && chars[idx + 1] == '{' {
            depth_brace += 1;
            current.push(chars[idx]);
            current.push(chars[idx + 1]);
            idx += 2;
            continue;
        }
        if idx + 1 < chars.len() && chars[idx] == '}' && chars[idx + 1] == '}' && depth_brace > 0 {
            depth_brace -= 1;
            current.push(chars[idx]);
            current.push(chars[idx + 1]);
            idx += 2;
            continue;
        }
        if idx + 1 < chars.len() && chars[idx] == '[' && chars[idx + 1] == '[' {
            depth_bracket += 1;
            current.push(chars[idx]);
            current.push(chars[idx + 1]);
            idx += 2;
            continue;
        }
        if idx + 1 < chars.len() && chars[idx] == ']' && chars[idx + 1] == ']' && depth_bracket > 0 {
            depth_bracket -= 1;
            current.push(chars[idx]);
            current.push(chars[idx + 1]);
            idx += 2;
            continue;
        }
        if chars[idx] == sep && depth_brace == 0 && depth_bracket == 0 {
            parts.push(current.clone());
            current.clear();
            idx += 1;
            continue;
        }
        current.push(chars[idx]);
        idx += 1;
    }
    parts.push(current);
    parts
}

fn split_key_value(s: &str) -> Option<(String, String)> {
    let chars: Vec<char> = s.chars().collect();
    let mut depth_brace = 0i32;
    let mut depth_bracket = 0i32;
    let mut idx = 0usize;
    while idx < chars.len() {
        if idx + 1 < chars.len() && chars[idx] == '{' && chars[idx + 1] == '{' {
            depth_brace += 1;
            idx += 2;
            continue;
        }
        if idx + 1 < chars.len() && chars[idx] == '}' && chars[idx + 1] == '}' && depth_brace > 0 {
            depth_brace -= 1;
            idx += 2;
            continue;
        }
        if idx + 1 < chars.len() && chars[idx] == '[' && chars[idx + 1] == '[' {
            depth_bracket += 1;
            idx += 2;
            continue;
        }
        if idx + 1 < chars.len() && chars[idx] == ']' && chars[idx + 1] == ']' && depth_bracket > 0 {
            depth_bracket -= 1;
            idx += 2;
            continue;
        }
        if chars[idx] == '=' && depth_brace == 0 && depth_bracket == 0 {
            let key: String = chars[..idx].iter().collect();
            let value: String = chars[idx + 1..].iter().collect();
            return Some((key.trim().to_string(), value.trim().to_string()));
        }
        idx += 1;
    }
    None
}

fn parse_template_body(body: &str) -> (String, Parameters) {
    let parts = split_top_level(body, '|');
    let type_name = parts.first().cloned().unwrap_or_default().trim().to_string();
    let mut params: Parameters = Vec::new();
    let mut unnamed_index = 1usize;
    for part in parts.iter().skip(1) {
        if let Some((key, value)) = split_key_value(part) {
            if key.is_empty() {
                params.push((unnamed_index.to_string(), value));
                unnamed_index += 1;
            } else {
                params.push((key, value));
            }
        } else if !part.trim().is_empty() {
            params.push((unnamed_index.to_string(), part.trim().to_string()));
            unnamed_index += 1;
        }
    }
    (type_name, params)
}

/// Infoboxes are distinguished from other templates by an "infobox" name
/// prefix; empty infoboxes (no parameters) are dropped.
fn extract_templates(wikitext: &str) -> (Vec<Infobox>, Vec<Template>) {
    let mut infoboxes = Vec::new();
    let mut templates = Vec::new();

    for body in find_template_bodies(wikitext) {
        let (type_name, parameters) = parse_template_body(&body);
        if type_name.is_empty() {
            continue;
        }
        if type_name.to_lowercase().starts_with("infobox") {
            if !parameters.is_empty() {
                infoboxes.push(Infobox {
                    type_name,
                    parameters,
                });
            }
        } else {
            templates.push(Template {
                type_name,
                parameters,
            });
        }

        // Recurse into any nested templates that the outer body swallowed.
        for nested in find_template_bodies(&body) {
            let (nested_name, nested_params) = parse_template_body(&nested);
            if nested_name.is_empty() {
                continue;
            }
            if nested_name.to_lowercase().starts_with("infobox") {
                if !nested_params.is_empty() {
                    infoboxes.push(Infobox {
                        type_name: nested_name,
                        parameters: nested_params,
                    });
                }
            } else {
                templates.push(Template {
                    type_name: nested_name,
                    parameters: nested_params,
                });
            }
        }
    }

    (infoboxes, templates)
}

fn extract_game_refs(wikitext: &str, templates: &[Template]) -> BTreeSet<String> {
    let mut refs = BTreeSet::new();
    let mut haystacks: Vec<&str> = vec![wikitext];
    for t in templates {
        for (_, v) in &t.parameters {
            haystacks.push(v.as_str());
        }
    }
    for haystack in haystacks {
        for caps in regexes().game_ref.captures_iter(haystack) {
            let token = caps[1].to_uppercase();
            if let Some((_, canonical)) = GAME_ABBREVIATIONS.iter().find(|(k, _)| *k == token) {
                refs.insert(canonical.to_string());
            }
        }
    }
    refs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clean::clean;
    use crate::model::Page;

    fn page(wikitext: &str) -> Page {
        Page {
            title: "Vault 13".to_string(),
            namespace: 0,
            timestamp: "2277-01-01T00:00:00Z".to_string(),
            wikitext: wikitext.to_string(),
            redirect_target: None,
        }
    }

    #[test]
    fn extracts_categories_in_first_occurrence_order() {
        let tree = clean(&page(
            "Text [[Category:Vaults]] more [[Category:California]] [[Category:Vaults]]",
        ))
        .unwrap();
        let cleaned = extract("Vault 13", &tree, usize::MAX, &ProcessingStats::new());
        assert_eq!(cleaned.categories, vec!["Vaults", "California"]);
    }

    #[test]
    fn extracts_infobox_parameters() {
        let tree = clean(&page(
            "{{Infobox vault|name=Vault 13|location=California|inhabitants=200}}",
        ))
        .unwrap();
        let cleaned = extract("Vault 13", &tree, usize::MAX, &ProcessingStats::new());
        assert_eq!(cleaned.infoboxes.len(), 1);
        let infobox = &cleaned.infoboxes[0];
        assert_eq!(infobox.type_name, "Infobox vault");
        assert!(infobox.parameters.contains(&("name".to_string(), "Vault 13".to_string())));
    }

    #[test]
    fn drops_empty_infoboxes() {
        let tree = clean(&page("{{Infobox vault}}")).unwrap();
        let cleaned = extract("Vault 13", &tree, usize::MAX, &ProcessingStats::new());
        assert!(cleaned.infoboxes.is_empty());
    }

    #[test]
    fn tags_category_and_file_wikilinks() {
        let tree = clean(&page("[[Category:Vaults]] and [[File:Vault13.png]] and [[Vault 13]]")).unwrap();
        let cleaned = extract("Vault 13", &tree, usize::MAX, &ProcessingStats::new());
        assert!(cleaned.wikilinks.iter().any(|l| l.is_category));
        assert!(cleaned.wikilinks.iter().any(|l| l.is_file));
        assert!(cleaned
            .wikilinks
            .iter()
            .any(|l| !l.is_category && !l.is_file && l.target == "Vault 13"));
    }

    #[test]
    fn detects_game_refs() {
        let tree = clean(&page("Appears in {{FO3}} and [[Fallout: New Vegas|FNV]].")).unwrap();
        let cleaned = extract("Vault 13", &tree, usize::MAX, &ProcessingStats::new());
        assert!(cleaned.game_refs.contains("FO3"));
    }

    #[test]
    fn page_over_size_cap_is_still_extracted_but_flagged() {
        let tree = clean(&page("{{Infobox vault|name=Vault 13}} A long vault history.")).unwrap();
        let stats = ProcessingStats::new();
        let cleaned = extract("Vault 13", &tree, 8, &stats);
        assert_eq!(cleaned.infoboxes.len(), 1, "extraction still runs to completion");
        assert_eq!(stats.snapshot(0.0, 0).pages_oversized, 1);
    }

    #[test]
    fn page_under_size_cap_is_not_flagged() {
        let tree = clean(&page("{{Infobox vault|name=Vault 13}}")).unwrap();
        let stats = ProcessingStats::new();
        let _ = extract("Vault 13", &tree, usize::MAX, &stats);
        assert_eq!(stats.snapshot(0.0, 0).pages_oversized, 0);
    }
}
