//! Task bodies, independent of sockets.
//!
//! The service reads a request, runs one of these against the shared working
//! directory and its own shard, then reports back.

use crate::search::tokenizer;
use crate::search::types::CategoryResults;
use crate::storage::codec;
use crate::storage::partitioner::{Category, category_of};
use crate::storage::shard::Shard;

use anyhow::{Context, Result, anyhow};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Counts the words of `segment` and writes them to `<output_dir>/<segment file name>`.
/// Returns the path written.
pub async fn map_segment(segment: &Path, output_dir: &Path) -> Result<PathBuf> {
    let contents = tokio::fs::read_to_string(segment)
        .await
        .with_context(|| format!("read segment {}", segment.display()))?;
    let counts = tokenizer::count_words(contents.lines());

    let file_name = segment
        .file_name()
        .ok_or_else(|| anyhow!("segment path {} has no file name", segment.display()))?;
    tokio::fs::create_dir_all(output_dir)
        .await
        .with_context(|| format!("create {}", output_dir.display()))?;

    let output = output_dir.join(file_name);
    tokio::fs::write(&output, codec::encode_counts(&counts))
        .await
        .with_context(|| format!("write map output {}", output.display()))?;

    tracing::debug!(
        "Mapped {} ({} distinct words) to {}",
        segment.display(),
        counts.len(),
        output.display()
    );
    Ok(output)
}

/// Sums the counts of every word in `category` across all map output files of
/// one transaction. Words of other categories are skipped; their owners run the
/// same scan.
pub async fn reduce_transaction(
    transaction_dir: &Path,
    category: &Category,
) -> Result<HashMap<String, u32>> {
    let mut files = Vec::new();
    let mut entries = tokio::fs::read_dir(transaction_dir)
        .await
        .with_context(|| format!("list {}", transaction_dir.display()))?;
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await?.is_file() {
            files.push(entry.path());
        }
    }
    files.sort();

    let mut totals: HashMap<String, u32> = HashMap::new();
    for path in &files {
        let contents = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("read map output {}", path.display()))?;
        for (word, count) in codec::decode_counts(path, &contents)? {
            if &category_of(&word) == category {
                *totals.entry(word).or_insert(0) += count;
            }
        }
    }

    tracing::debug!(
        "Reduced {} map outputs to {} words for {}",
        files.len(),
        totals.len(),
        category
    );
    Ok(totals)
}

/// Looks every keyword up in `shard`. Unknown keywords get empty postings.
pub fn search_shard(shard: &Shard, keywords: &[String]) -> CategoryResults {
    CategoryResults {
        category: shard.category().clone(),
        results: keywords
            .iter()
            .map(|keyword| (keyword.clone(), shard.get(keyword)))
            .collect(),
    }
}
