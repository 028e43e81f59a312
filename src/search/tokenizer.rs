use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;

static WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[a-z0-9]+$").unwrap());

/// Whether `token` is indexable: lowercase ASCII letters and digits only.
pub fn is_word(token: &str) -> bool {
    WORD.is_match(token)
}

/// Counts indexable words across `lines`, splitting on whitespace.
/// Tokens with any other character are dropped, not trimmed.
pub fn count_words<'a, I>(lines: I) -> HashMap<String, u32>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut counts: HashMap<String, u32> = HashMap::new();
    for line in lines {
        for token in line.split_whitespace().filter(|t| is_word(t)) {
            *counts.entry(token.to_string()).or_insert(0) += 1;
        }
    }
    counts
}

/// Splits a raw query into keywords, preserving order and dropping repeats.
pub fn parse_keywords(query: &str) -> Vec<String> {
    let mut keywords: Vec<String> = Vec::new();
    for token in query.split_whitespace() {
        if !keywords.iter().any(|k| k == token) {
            keywords.push(token.to_string());
        }
    }
    keywords
}
