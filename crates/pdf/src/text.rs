use std::sync::OnceLock;

use regex::Regex;
use unicode_normalization::UnicodeNormalization;

use crate::types::TextBlock;

const LIGATURES: [(char, &str); 5] = [
    ('\u{FB00}', "ff"),
    ('\u{FB01}', "fi"),
    ('\u{FB02}', "fl"),
    ('\u{FB03}', "ffi"),
    ('\u{FB04}', "ffl"),
];

/// Normalize the text of a single span.
///
/// NFC composition, ligature expansion, and removal of U+FFFD left behind by
/// undecodable glyphs. Whitespace is kept as-is so span boundaries survive.
pub fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.nfc() {
        match LIGATURES.iter().find(|(lig, _)| *lig == ch) {
            Some((_, expanded)) => out.push_str(expanded),
            None if ch == '\u{FFFD}' => {}
            None => out.push(ch),
        }
    }
    out
}

/// Plain text of a page: one line per block. Inside a block, a word split
/// by a line-end hyphen is rejoined and the other line breaks become spaces.
/// Runs of blanks are collapsed.
pub fn page_text(blocks: &[TextBlock]) -> String {
    static RE_HYPHEN: OnceLock<Regex> = OnceLock::new();
    static RE_SPACES: OnceLock<Regex> = OnceLock::new();

    let re_hyphen = RE_HYPHEN.get_or_init(|| {
        Regex::new(r"(\p{Alphabetic})-[ \t]*\n[ \t]*(\p{Lowercase})").unwrap()
    });
    let re_spaces = RE_SPACES.get_or_init(|| Regex::new(r"[ \t]{2,}").unwrap());

    blocks
        .iter()
        .map(|block| {
            let by_line = block.text_by_line();
            let repaired = re_hyphen.replace_all(&by_line, "$1$2").replace('\n', " ");
            re_spaces.replace_all(&repaired, " ").trim().to_string()
        })
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{SpanFlags, TextSpan};

    fn block(texts: &[&str]) -> TextBlock {
        let spans = texts
            .iter()
            .map(|t| TextSpan::new(0, *t, 10.0, "Body", SpanFlags::empty()).unwrap())
            .collect();
        TextBlock::new(0, spans).unwrap()
    }

    #[test]
    fn test_normalize_passthrough() {
        assert_eq!(normalize("Hello world."), "Hello world.");
    }

    #[test]
    fn test_normalize_ligatures() {
        assert_eq!(normalize("\u{FB01}nd a\u{FB04}e"), "find affle");
    }

    #[test]
    fn test_normalize_composes_accents() {
        assert_eq!(normalize("relato\u{0301}rio"), "relatório");
    }

    #[test]
    fn test_normalize_drops_replacement_char() {
        assert_eq!(normalize("Hello\u{FFFD}World"), "HelloWorld");
    }

    #[test]
    fn test_page_text_one_line_per_block() {
        let text = page_text(&[block(&["First", "block"]), block(&["Second"])]);
        assert_eq!(text, "First block\nSecond");
    }

    fn lines(lines: &[&str]) -> TextBlock {
        let lines = lines
            .iter()
            .map(|t| vec![TextSpan::new(0, *t, 10.0, "Body", SpanFlags::empty()).unwrap()])
            .collect();
        TextBlock::from_lines(0, lines).unwrap()
    }

    #[test]
    fn test_page_text_rejoins_hyphenated_words_inside_a_block() {
        let text = page_text(&[lines(&["a informa-", "mação foi útil"])]);
        assert_eq!(text, "a informação foi útil");
    }

    #[test]
    fn test_page_text_joins_block_lines_with_spaces() {
        let text = page_text(&[lines(&["first line", "second line"]), block(&["Next"])]);
        assert_eq!(text, "first line second line\nNext");
    }

    #[test]
    fn test_page_text_does_not_join_across_blocks() {
        let text = page_text(&[block(&["infor-"]), block(&["mação útil"])]);
        assert_eq!(text, "infor-\nmação útil");
    }

    #[test]
    fn test_page_text_keeps_numeric_ranges() {
        let text = page_text(&[lines(&["pages 123-", "456"])]);
        assert_eq!(text, "pages 123- 456");
    }

    #[test]
    fn test_page_text_collapses_spaces() {
        assert_eq!(page_text(&[block(&["a    b"])]), "a b");
    }

    #[test]
    fn test_page_text_empty() {
        assert_eq!(page_text(&[]), "");
    }
}
