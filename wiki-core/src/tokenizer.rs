//! Shared word tokenizer: C4 budgets chunks against the same token
//! boundaries C6 will later see, so both stages split text the same way
//! rather than each counting characters or words independently.

use tokenizers::pre_tokenizers::whitespace::WhitespaceSplit;
use tokenizers::{OffsetReferential, OffsetType, PreTokenizedString, PreTokenizer};

/// A single token's text and its byte range in the source string.
#[derive(Debug, Clone)]
pub struct TokenSpan {
    pub text: String,
    pub start: usize,
    pub end: usize,
}

/// Split `text` into tokens with byte offsets, in order.
pub fn tokenize(text: &str) -> Vec<TokenSpan> {
    let mut pretokenized = PreTokenizedString::from(text);
    // WhitespaceSplit only breaks on whitespace, unlike Whitespace (which
    // also isolates punctuation into its own token); that keeps trailing
    // punctuation attached to its word, matching "words" in the doc
    // comment above. Never errors on well-formed UTF-8 input.
    WhitespaceSplit
        .pre_tokenize(&mut pretokenized)
        .expect("whitespace pre-tokenizer failed on valid input");
    pretokenized
        .get_splits(OffsetReferential::Original, OffsetType::Byte)
        .into_iter()
        .map(|(s, (start, end), _)| TokenSpan {
            text: s.to_string(),
            start,
            end,
        })
        .collect()
}

pub fn count_tokens(text: &str) -> usize {
    tokenize(text).len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_whitespace_separated_words() {
        assert_eq!(count_tokens("Vault 13 is a fallout shelter."), 6);
    }

    #[test]
    fn empty_text_has_no_tokens() {
        assert_eq!(count_tokens(""), 0);
    }

    #[test]
    fn spans_cover_original_byte_ranges() {
        let spans = tokenize("Vault 13");
        assert_eq!(spans[0].text, "Vault");
        assert_eq!(&"Vault 13"[spans[0].start..spans[0].end], "Vault");
        assert_eq!(&"Vault 13"[spans[1].start..spans[1].end], "13");
    }
}
