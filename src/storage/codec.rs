//! Line formats shared by workers and orchestrators.
//!
//! - shard file line: `word,doc1|count1,doc2|count2,...`
//! - map-output line: `word,count`
//! - wire postings: `doc1|count1,doc2|count2` (shard line without the word)
//!
//! No escaping is done. Indexed words are `[a-z0-9]+`, so neither `,` nor `|`
//! can appear in a word. Document names are checked by `is_valid_document`
//! before anything is merged.

use super::types::{Posting, PostingList};
use crate::error::ClusterError;

use std::collections::HashMap;
use std::path::Path;

/// A document name survives the shard and wire formats when it is non-empty and
/// holds no `,` and no line break.
pub fn is_valid_document(name: &str) -> bool {
    !name.is_empty() && !name.contains([',', '\n', '\r'])
}

pub fn encode_postings(postings: &[Posting]) -> String {
    postings
        .iter()
        .map(|p| format!("{}|{}", p.document, p.frequency))
        .collect::<Vec<_>>()
        .join(",")
}

pub fn decode_postings(raw: &str) -> Option<PostingList> {
    if raw.is_empty() {
        return Some(Vec::new());
    }
    raw.split(',').map(decode_posting).collect()
}

fn decode_posting(group: &str) -> Option<Posting> {
    let (document, count) = group.rsplit_once('|')?;
    let frequency: u32 = count.parse().ok()?;
    if document.is_empty() || frequency == 0 {
        return None;
    }
    Some(Posting::new(document, frequency))
}

pub fn encode_shard_line(word: &str, postings: &[Posting]) -> String {
    if postings.is_empty() {
        word.to_string()
    } else {
        format!("{},{}", word, encode_postings(postings))
    }
}

pub fn decode_shard_line(line: &str) -> Option<(String, PostingList)> {
    let (word, rest) = match line.split_once(',') {
        Some((word, rest)) => (word, rest),
        None => (line, ""),
    };
    if word.is_empty() {
        return None;
    }
    Some((word.to_string(), decode_postings(rest)?))
}

pub fn encode_count_line(word: &str, count: u32) -> String {
    format!("{},{}", word, count)
}

pub fn decode_count_line(line: &str) -> Option<(String, u32)> {
    let (word, count) = line.split_once(',')?;
    let count: u32 = count.parse().ok()?;
    if word.is_empty() || count == 0 {
        return None;
    }
    Some((word.to_string(), count))
}

/// Renders a word→count table as map-output text, sorted by word.
pub fn encode_counts(counts: &HashMap<String, u32>) -> String {
    let mut words: Vec<&String> = counts.keys().collect();
    words.sort();
    let mut out = String::new();
    for word in words {
        out.push_str(&encode_count_line(word, counts[word]));
        out.push('\n');
    }
    out
}

/// Parses a whole map-output file. Any bad line fails the whole file.
pub fn decode_counts(path: &Path, contents: &str) -> Result<Vec<(String, u32)>, ClusterError> {
    let mut out = Vec::new();
    for (idx, line) in contents.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let entry = decode_count_line(line).ok_or_else(|| ClusterError::MalformedLine {
            path: path.display().to_string(),
            line_no: idx + 1,
            line: line.to_string(),
        })?;
        out.push(entry);
    }
    Ok(out)
}
