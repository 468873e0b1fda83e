//! Corpus statistics over extracted document text
//!
//! Words are the `\b\w+\b` tokens of the lowercased text. Frequencies are
//! computed after removing Portuguese stop-words and single-character tokens.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;

/// Number of most frequent words reported.
pub const TOP_K: usize = 10;

/// Articles, prepositions, pronouns and other function words that would
/// otherwise dominate the frequency table.
pub const STOP_WORDS: &[&str] = &[
    "a", "à", "o", "os", "as", "um", "uma", "de", "da", "do", "das", "dos", "em", "no", "na",
    "nos", "nas", "por", "para", "com", "e", "é", "ou", "mas", "que", "quem", "qual", "se", "sem",
    "eu", "tu", "ele", "ela", "nós", "vos", "eles", "elas", "me", "te", "lhe", "lhes", "isso",
    "isto", "aquilo", "esse", "essa", "aquele", "aquela", "este", "esta", "sua", "seu", "suas",
    "seus", "não", "sim", "já", "ainda", "como", "quando", "onde", "muito", "muita", "muitos",
    "muitas", "pouco", "pouca", "poucos", "poucas",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WordCount {
    pub word: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorpusStats {
    /// Every token, stop-words included.
    pub total_words: usize,
    /// Distinct tokens left after filtering.
    pub distinct_words: usize,
    /// At most [`TOP_K`] entries, most frequent first. Equal counts keep the
    /// order in which the words first appear in the text.
    pub top_words: Vec<WordCount>,
}

/// Lowercase word tokens, in text order.
pub fn tokenize(text: &str) -> Vec<String> {
    static WORD: OnceLock<Regex> = OnceLock::new();
    let re = WORD.get_or_init(|| Regex::new(r"\b\w+\b").unwrap());
    let lowered = text.to_lowercase();
    re.find_iter(&lowered).map(|m| m.as_str().to_string()).collect()
}

pub fn is_stop_word(token: &str) -> bool {
    token.chars().count() <= 1 || STOP_WORDS.contains(&token)
}

/// The `k` most frequent tokens, ties broken by first occurrence.
pub fn top_words<S: AsRef<str>>(tokens: &[S], k: usize) -> Vec<WordCount> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut counts: Vec<WordCount> = Vec::new();

    for token in tokens {
        let token = token.as_ref();
        match index.get(token) {
            Some(&i) => counts[i].count += 1,
            None => {
                index.insert(token, counts.len());
                counts.push(WordCount {
                    word: token.to_string(),
                    count: 1,
                });
            }
        }
    }

    // Stable sort keeps first-occurrence order within equal counts.
    counts.sort_by(|a, b| b.count.cmp(&a.count));
    counts.truncate(k);
    counts
}

pub fn analyze_text(text: &str) -> CorpusStats {
    let tokens = tokenize(text);
    let filtered: Vec<&str> = tokens
        .iter()
        .map(String::as_str)
        .filter(|t| !is_stop_word(t))
        .collect();

    let mut distinct: Vec<&str> = filtered.clone();
    distinct.sort_unstable();
    distinct.dedup();

    CorpusStats {
        total_words: tokens.len(),
        distinct_words: distinct.len(),
        top_words: top_words(&filtered, TOP_K),
    }
}
