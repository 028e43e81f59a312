//! One worker's slice of the inverted index.
//!
//! The shard is read concurrently by search tasks while reduce tasks append to it,
//! so postings live in a `DashMap`. Merges and the file rewrite that follows each
//! merge are serialized by `persist_lock`. A merge is staged, written to disk,
//! and only then made visible in memory, so a failed write leaves the shard as
//! it was.

use super::codec;
use super::partitioner::Category;
use super::types::{Posting, PostingList};
use crate::error::ClusterError;

use anyhow::{Context, Result};
use dashmap::DashMap;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;

/// Distinguishes temp files of writers sharing one process.
static TMP_SEQ: AtomicU64 = AtomicU64::new(0);

#[derive(Debug)]
pub struct Shard {
    category: Category,
    path: PathBuf,
    index: DashMap<String, PostingList>,
    persist_lock: Mutex<()>,
}

impl Shard {
    /// Empty shard that will persist to `<dir>/<category>`.
    pub fn empty(dir: &Path, category: Category) -> Self {
        Self {
            path: dir.join(category.as_str()),
            category,
            index: DashMap::new(),
            persist_lock: Mutex::new(()),
        }
    }

    /// Loads `<dir>/<category>` if it exists, otherwise starts empty.
    /// A malformed line fails the load.
    pub async fn open(dir: &Path, category: Category) -> Result<Self> {
        let shard = Self::empty(dir, category);

        match tokio::fs::read_to_string(&shard.path).await {
            Ok(contents) => {
                shard.load_lines(&contents)?;
                tracing::info!(
                    "Loaded shard {} with {} words from {}",
                    shard.category,
                    shard.index.len(),
                    shard.path.display()
                );
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("No shard file for {}, starting empty", shard.category);
            }
            Err(e) => {
                return Err(e).with_context(|| format!("read shard {}", shard.path.display()));
            }
        }

        Ok(shard)
    }

    fn load_lines(&self, contents: &str) -> Result<(), ClusterError> {
        for (idx, line) in contents.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let (word, postings) =
                codec::decode_shard_line(line).ok_or_else(|| ClusterError::MalformedLine {
                    path: self.path.display().to_string(),
                    line_no: idx + 1,
                    line: line.to_string(),
                })?;
            self.index.insert(word, postings);
        }
        Ok(())
    }

    pub fn category(&self) -> &Category {
        &self.category
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Postings for `word`; an unknown word has none.
    pub fn get(&self, word: &str) -> PostingList {
        self.index
            .get(word)
            .map(|entry| entry.value().clone())
            .unwrap_or_default()
    }

    /// The postings each touched word will hold once `document` is appended.
    /// Existing postings for other documents are kept.
    fn stage(&self, counts: &HashMap<String, u32>, document: &str) -> HashMap<String, PostingList> {
        counts
            .iter()
            .map(|(word, count)| {
                let mut postings = self.get(word);
                postings.push(Posting::new(document, *count));
                (word.clone(), postings)
            })
            .collect()
    }

    /// Merges a document's counts and rewrites the shard file. Nothing changes
    /// in memory unless the file was written.
    pub async fn merge_and_persist(
        &self,
        counts: &HashMap<String, u32>,
        document: &str,
    ) -> Result<()> {
        if !codec::is_valid_document(document) {
            return Err(ClusterError::InvalidDocumentName(document.to_string()).into());
        }

        let _guard = self.persist_lock.lock().await;
        let staged = self.stage(counts, document);
        self.write_file(&staged).await?;
        for (word, postings) in staged {
            self.index.insert(word, postings);
        }
        Ok(())
    }

    /// Serializes every word, sorted, one line each.
    pub fn render(&self) -> String {
        self.render_with(&HashMap::new())
    }

    /// Like `render`, with `staged` entries replacing or adding to the index.
    fn render_with(&self, staged: &HashMap<String, PostingList>) -> String {
        let mut lines: Vec<String> = self
            .index
            .iter()
            .filter(|entry| !staged.contains_key(entry.key()))
            .map(|entry| codec::encode_shard_line(entry.key(), entry.value()))
            .chain(
                staged
                    .iter()
                    .map(|(word, postings)| codec::encode_shard_line(word, postings)),
            )
            .collect();
        lines.sort();
        let mut out = lines.join("\n");
        if !out.is_empty() {
            out.push('\n');
        }
        out
    }

    async fn write_file(&self, staged: &HashMap<String, PostingList>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("create {}", parent.display()))?;
        }

        // Workers of one category share the directory; each write gets its own temp file.
        let tmp = self.path.with_file_name(format!(
            "{}.{}.{}.tmp",
            self.category,
            std::process::id(),
            TMP_SEQ.fetch_add(1, Ordering::Relaxed)
        ));
        tokio::fs::write(&tmp, self.render_with(staged))
            .await
            .with_context(|| format!("write {}", tmp.display()))?;
        if let Err(e) = tokio::fs::rename(&tmp, &self.path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e).with_context(|| format!("replace {}", self.path.display()));
        }

        tracing::debug!(
            "Persisted shard {} ({} staged words) to {}",
            self.category,
            staged.len(),
            self.path.display()
        );
        Ok(())
    }
}
