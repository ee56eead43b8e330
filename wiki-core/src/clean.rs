//! Wikitext cleaner (C2): strips markup into plain text while recording
//! the section boundaries C3 needs, in a single pass so offsets stay
//! valid. Block-level constructs (comments, refs, tables, templates)
//! that can span multiple lines are stripped first; everything else is
//! cleaned line by line so each line's start offset in the output can be
//! tracked precisely.

use crate::model::{Page, SectionInfo};
use crate::PipelineError;
use regex::Regex;
use std::sync::OnceLock;
use unicode_normalization::UnicodeNormalization;

struct Regexes {
    comment: Regex,
    reference: Regex,
    template: Regex,
    table: Regex,
    file_or_category: Regex,
    piped_link: Regex,
    simple_link: Regex,
    ext_link_named: Regex,
    ext_link_bare: Regex,
    bold_italic: Regex,
    heading: Regex,
    html: Regex,
    indent: Regex,
    whitespace: Regex,
}

fn regexes() -> &'static Regexes {
    static REGEXES: OnceLock<Regexes> = OnceLock::new();
    REGEXES.get_or_init(|| Regexes {
        comment: Regex::new(r"(?s)<!--.*?-->").unwrap(),
        reference: Regex::new(r"(?s)<ref[^>]*>.*?</ref>|<ref[^/]*/\s*>").unwrap(),
        template: Regex::new(r"(?s)\{\{[^{}]*\}\}").unwrap(),
        table: Regex::new(r"(?s)\{\|.*?\|\}").unwrap(),
        file_or_category: Regex::new(r"(?i)\[\[(File|Image|Category):[^\]]*\]\]").unwrap(),
        piped_link: Regex::new(r"\[\[[^|\]]*\|([^\]]*)\]\]").unwrap(),
        simple_link: Regex::new(r"\[\[([^\]]*)\]\]").unwrap(),
        ext_link_named: Regex::new(r"\[[^ \]]+ ([^\]]*)\]").unwrap(),
        ext_link_bare: Regex::new(r"\[https?://[^\]]*\]").unwrap(),
        bold_italic: Regex::new(r"'{2,5}").unwrap(),
        heading: Regex::new(r"^(=+)\s*(.*?)\s*=+$").unwrap(),
        html: Regex::new(r"<[^>]+>").unwrap(),
        indent: Regex::new(r"^[*#:;]+\s*").unwrap(),
        whitespace: Regex::new(r"[ \t]+").unwrap(),
    })
}

/// Carries the original wikitext (for C3 to re-scan for categories,
/// links, infoboxes, templates and game refs) plus the cleaned text and
/// the sections derived while cleaning.
pub struct ParseTree {
    pub wikitext: String,
    pub plain_text: String,
    pub sections: Vec<SectionInfo>,
}

pub fn clean(page: &Page) -> Result<ParseTree, PipelineError> {
    let re = regexes();

    // Remove multi-line block constructs first; templates are removed
    // twice to catch one level of nesting, matching the simple
    // regex-based approach used elsewhere in this pipeline.
    let mut stage1 = page.wikitext.clone();
    stage1 = re.comment.replace_all(&stage1, "").to_string();
    stage1 = re.reference.replace_all(&stage1, "").to_string();
    stage1 = re.template.replace_all(&stage1, "").to_string();
    stage1 = re.template.replace_all(&stage1, "").to_string();
    stage1 = re.table.replace_all(&stage1, "").to_string();

    let (plain_text, sections) = build_plain_text(&stage1, re);

    Ok(ParseTree {
        wikitext: page.wikitext.clone(),
        plain_text,
        sections,
    })
}

fn build_plain_text(raw: &str, re: &Regexes) -> (String, Vec<SectionInfo>) {
    let mut buffer = String::new();
    let mut sections: Vec<SectionInfo> = vec![SectionInfo {
        level: 1,
        title: "Introduction".to_string(),
        path: "Introduction".to_string(),
        start_offset: 0,
        end_offset: 0,
    }];
    let mut stack: Vec<(u8, String)> = vec![(1, "Introduction".to_string())];
    let mut last_was_blank = true; // suppress a leading blank line

    for line in raw.lines() {
        if let Some(caps) = re.heading.captures(line.trim()) {
            let eq_len = caps.get(1).unwrap().as_str().len();
            let title = normalize(caps.get(2).unwrap().as_str().trim());
            if title.is_empty() {
                continue;
            }
            let level = (eq_len as u8).clamp(1, 6);

            if let Some(last) = sections.last_mut() {
                last.end_offset = buffer.len();
            }
            while stack.last().is_some_and(|(l, _)| *l >= level) {
                stack.pop();
            }
            stack.push((level, title.clone()));
            let path = stack
                .iter()
                .map(|(_, t)| t.as_str())
                .collect::<Vec<_>>()
                .join(" > ");

            let start = buffer.len();
            buffer.push_str(&title);
            buffer.push('\n');
            sections.push(SectionInfo {
                level,
                title,
                path,
                start_offset: start,
                end_offset: buffer.len(),
            });
            last_was_blank = false;
            continue;
        }

        let cleaned = clean_inline(line, re);
        if cleaned.trim().is_empty() {
            if last_was_blank {
                continue;
            }
            buffer.push('\n');
            last_was_blank = true;
        } else {
            buffer.push_str(&cleaned);
            buffer.push('\n');
            last_was_blank = false;
        }
    }

    if let Some(last) = sections.last_mut() {
        last.end_offset = buffer.len();
    }
    (buffer, sections)
}

fn clean_inline(line: &str, re: &Regexes) -> String {
    let mut s = line.to_string();
    s = re.file_or_category.replace_all(&s, "").to_string();
    s = re.piped_link.replace_all(&s, "$1").to_string();
    s = re.simple_link.replace_all(&s, "$1").to_string();
    s = re.ext_link_named.replace_all(&s, "$1").to_string();
    s = re.ext_link_bare.replace_all(&s, "").to_string();
    s = re.bold_italic.replace_all(&s, "").to_string();
    s = re.html.replace_all(&s, "").to_string();
    s = re.indent.replace_all(&s, "").to_string();
    s = re.whitespace.replace_all(&s, " ").to_string();
    normalize(s.trim())
}

fn normalize(s: &str) -> String {
    s.nfc().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

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
    fn strips_links_and_formatting() {
        let tree = clean(&page("'''Vault 13''' is a [[Vault]] in [[California|the wastes]].")).unwrap();
        assert_eq!(
            tree.plain_text.trim(),
            "Vault 13 is a Vault in the wastes."
        );
    }

    #[test]
    fn sections_have_valid_offsets_and_breadcrumbs() {
        let tree = clean(&page("Intro text.\n\n== History ==\nFounded in 2063.\n=== War ===\nThe war came.")).unwrap();
        assert!(tree.sections.len() >= 3);
        for s in &tree.sections {
            assert!(s.start_offset <= s.end_offset);
            assert!(s.end_offset <= tree.plain_text.len());
        }
        let war = tree.sections.iter().find(|s| s.title == "War").unwrap();
        assert_eq!(war.path, "Introduction > History > War");
    }

    #[test]
    fn drops_comments_refs_and_templates() {
        let tree = clean(&page(
            "Visible text<!-- hidden -->.<ref>cite</ref> {{Infobox vault}} more text.",
        ))
        .unwrap();
        assert!(!tree.plain_text.contains("hidden"));
        assert!(!tree.plain_text.contains("cite"));
        assert!(!tree.plain_text.contains("Infobox"));
    }

    #[test]
    fn collapses_blank_lines() {
        let tree = clean(&page("Para one.\n\n\n\nPara two.")).unwrap();
        assert!(!tree.plain_text.contains("\n\n\n"));
    }
}
