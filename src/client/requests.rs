use super::cache::ResultCache;
use super::types::{IndexingOutcome, TransactionIds};
use crate::config::ClusterConfig;
use crate::error::ClusterError;
use crate::membership::types::PeerAddress;
use crate::search::types::{SearchOutcome, read_keyword_postings};
use crate::storage::types::PostingList;
use crate::transport::discovery;
use crate::transport::messenger::Messenger;
use crate::transport::tags::Tag;

use anyhow::{Context, Result};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::time::Instant;
use tokio::sync::Mutex;

/// Submits indexing and searching requests to one orchestrator.
pub struct ClusterClient {
    orchestrator: PeerAddress,
    ids: TransactionIds,
    cache: Mutex<ResultCache>,
}

impl ClusterClient {
    pub fn new(orchestrator: PeerAddress) -> Self {
        Self::with_parts(orchestrator, TransactionIds::new(), ResultCache::default())
    }

    pub fn with_parts(orchestrator: PeerAddress, ids: TransactionIds, cache: ResultCache) -> Self {
        Self {
            orchestrator,
            ids,
            cache: Mutex::new(cache),
        }
    }

    /// Reads the orchestrator address from its published discovery file.
    pub async fn discover(config: &ClusterConfig) -> Result<Self> {
        let orchestrator = discovery::lookup(&config.orchestrator_info_path)
            .await
            .context("locate orchestrator")?;
        Ok(Self::new(orchestrator))
    }

    pub fn orchestrator(&self) -> PeerAddress {
        self.orchestrator
    }

    /// Indexes every segment file in `dir` as one document named after `dir`.
    /// Waits until the job finishes.
    pub async fn request_indexing(&self, dir: &Path) -> Result<IndexingOutcome> {
        let dir = tokio::fs::canonicalize(dir)
            .await
            .with_context(|| format!("resolve {}", dir.display()))?;
        let transaction_id = self.ids.next();
        tracing::info!("Submitting {} as transaction {}", dir.display(), transaction_id);

        let mut messenger = Messenger::open(self.orchestrator, Tag::SubmitIndexing).await?;
        messenger.send_string(&dir.to_string_lossy()).await?;
        messenger.send_int(transaction_id).await?;
        messenger.flush().await?;

        let outcome = match messenger.receive_tag().await? {
            Tag::IndexingDone => IndexingOutcome::Done,
            Tag::IndexingFailed => IndexingOutcome::Failed,
            other => {
                return Err(
                    ClusterError::UnexpectedReply(format!("{:?} to an indexing request", other)).into(),
                );
            }
        };

        if outcome == IndexingOutcome::Done {
            // New postings make cached answers stale.
            self.cache.lock().await.clear();
        }
        Ok(outcome)
    }

    /// Looks up `keywords`, answering from the cache where possible. The
    /// result lists each distinct keyword once, in request order.
    pub async fn request_searching(&self, keywords: &[String]) -> Result<SearchOutcome> {
        let mut seen = HashSet::new();
        let wanted: Vec<&String> = keywords.iter().filter(|k| seen.insert(*k)).collect();

        let mut answered: HashMap<String, PostingList> = HashMap::new();
        let mut missing: Vec<String> = Vec::new();
        {
            let now = Instant::now();
            let cache = self.cache.lock().await;
            for keyword in &wanted {
                match cache.get(keyword, now) {
                    Some(postings) => {
                        answered.insert((*keyword).clone(), postings.clone());
                    }
                    None => missing.push((*keyword).clone()),
                }
            }
        }

        if !missing.is_empty() {
            tracing::debug!(
                "{} cached, querying {:?}",
                wanted.len() - missing.len(),
                missing
            );

            let mut messenger = Messenger::open(self.orchestrator, Tag::SubmitSearching).await?;
            messenger.send_string_list(&missing).await?;
            messenger.flush().await?;

            let results = read_keyword_postings(&mut messenger).await?;
            match messenger.receive_tag().await? {
                Tag::SearchingDone => {}
                Tag::SearchingFailed => return Ok(SearchOutcome::Failed),
                other => {
                    return Err(ClusterError::UnexpectedReply(format!(
                        "{:?} to a searching request",
                        other
                    ))
                    .into());
                }
            }

            let now = Instant::now();
            let mut cache = self.cache.lock().await;
            cache.purge(now);
            for (keyword, postings) in results {
                cache.insert(keyword.clone(), postings.clone(), now);
                answered.insert(keyword, postings);
            }
        }

        let ordered = wanted
            .into_iter()
            .map(|k| (k.clone(), answered.remove(k).unwrap_or_default()))
            .collect();
        Ok(SearchOutcome::Done(ordered))
    }
}
