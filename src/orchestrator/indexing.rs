use super::phase::{CallbackEndpoint, Phase, run_phase, send_tasks};
use crate::config::ClusterConfig;
use crate::error::ClusterError;
use crate::membership::client::RegistryClient;
use crate::membership::types::PeerAddress;
use crate::storage::codec;
use crate::storage::partitioner::{Category, all_categories};
use crate::transport::messenger::Messenger;
use crate::worker::types::Task;

use anyhow::{Context, Result, anyhow};
use std::path::{Path, PathBuf};
use tokio::net::TcpStream;

/// Map phase: one task per input segment, keyed by segment path.
pub struct MapPhase<'a> {
    registry: RegistryClient,
    config: &'a ClusterConfig,
    callback: PeerAddress,
    transaction_id: i32,
}

impl Phase for MapPhase<'_> {
    type Key = String;

    const NAME: &'static str = "map";

    async fn dispatch(&mut self, segments: &[String], _attempt: u32) {
        let workers = match self.registry.borrow_any(segments.len()).await {
            Ok(workers) => workers,
            Err(e) => {
                tracing::warn!("Cannot borrow {} mappers: {:#}", segments.len(), e);
                return;
            }
        };

        let assignments = workers
            .into_iter()
            .zip(segments)
            .map(|(worker, segment)| {
                let task = Task::Map {
                    segment: segment.clone(),
                    transaction_id: self.transaction_id,
                };
                (worker, task)
            })
            .collect();
        send_tasks(assignments, self.callback, self.config.callback_timeout()).await;
    }

    async fn receive(&mut self, messenger: &mut Messenger<TcpStream>) -> Result<String> {
        messenger.receive_string().await
    }
}

/// Reduce phase: one task per category, keyed by category.
///
/// The first round borrows one worker from every populated category; retries
/// borrow per missing category, so a category that had no worker at first is
/// picked up once one registers.
pub struct ReducePhase<'a> {
    registry: RegistryClient,
    config: &'a ClusterConfig,
    callback: PeerAddress,
    transaction_id: i32,
    document: String,
}

impl ReducePhase<'_> {
    fn task(&self) -> Task {
        Task::Reduce {
            transaction_id: self.transaction_id,
            document: self.document.clone(),
        }
    }
}

impl Phase for ReducePhase<'_> {
    type Key = Category;

    const NAME: &'static str = "reduce";

    async fn dispatch(&mut self, categories: &[Category], attempt: u32) {
        let workers = if attempt == 1 {
            match self.registry.borrow_one_per_category().await {
                Ok(workers) => workers,
                Err(e) => {
                    tracing::warn!("Cannot borrow reducers: {:#}", e);
                    return;
                }
            }
        } else {
            let mut workers = Vec::new();
            for category in categories {
                match self.registry.borrow_one_in_category(category).await {
                    Ok(worker) => workers.push(worker),
                    Err(e) => tracing::warn!("Cannot borrow reducer for {}: {:#}", category, e),
                }
            }
            workers
        };

        let assignments = workers.into_iter().map(|w| (w, self.task())).collect();
        send_tasks(assignments, self.callback, self.config.callback_timeout()).await;
    }

    async fn receive(&mut self, messenger: &mut Messenger<TcpStream>) -> Result<Category> {
        Ok(Category::new(messenger.receive_string().await?))
    }
}

/// Files directly inside `dir`, sorted by name.
pub async fn list_segments(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut segments = Vec::new();
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .with_context(|| format!("list segment directory {}", dir.display()))?;
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await?.is_file() {
            segments.push(entry.path());
        }
    }
    segments.sort();
    Ok(segments)
}

/// The document a segment directory is indexed as: its last path component.
/// Names the shard format cannot carry are rejected.
pub fn document_name(dir: &Path) -> Result<String> {
    let name = dir
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| anyhow!("cannot name a document after {}", dir.display()))?;
    if !codec::is_valid_document(&name) {
        return Err(ClusterError::InvalidDocumentName(name).into());
    }
    Ok(name)
}

/// Drives one indexing job from segment listing to cleanup.
pub async fn run_indexing(
    registry: RegistryClient,
    config: &ClusterConfig,
    segment_dir: &Path,
    transaction_id: i32,
) -> Result<()> {
    let document = document_name(segment_dir)?;
    let segments: Vec<String> = list_segments(segment_dir)
        .await?
        .into_iter()
        .map(|p| p.to_string_lossy().into_owned())
        .collect();

    if segments.is_empty() {
        tracing::warn!(
            "Transaction {}: {} has no segments, nothing to index",
            transaction_id,
            segment_dir.display()
        );
        return Ok(());
    }

    tracing::info!(
        "Transaction {}: indexing {} as {:?} ({} segments)",
        transaction_id,
        segment_dir.display(),
        document,
        segments.len()
    );

    let transaction_dir = config.transaction_dir(transaction_id);
    let mappers_dir = config.mappers_dir();
    tokio::fs::create_dir_all(&mappers_dir)
        .await
        .with_context(|| format!("create {}", mappers_dir.display()))?;
    // A live directory belongs to another job with the same id.
    tokio::fs::create_dir(&transaction_dir)
        .await
        .with_context(|| format!("claim transaction directory {}", transaction_dir.display()))?;

    let outcome = run_phases(registry, config, transaction_id, document, &segments).await;

    if let Err(e) = tokio::fs::remove_dir_all(&transaction_dir).await {
        tracing::warn!("Could not remove {}: {}", transaction_dir.display(), e);
    }
    outcome
}

async fn run_phases(
    registry: RegistryClient,
    config: &ClusterConfig,
    transaction_id: i32,
    document: String,
    segments: &[String],
) -> Result<()> {
    let endpoint = CallbackEndpoint::bind(config).await?;
    let mut map = MapPhase {
        registry,
        config,
        callback: endpoint.peer,
        transaction_id,
    };
    run_phase(
        &mut map,
        &endpoint,
        segments,
        config.callback_timeout(),
        config.max_attempts,
    )
    .await?;
    drop(endpoint);

    let endpoint = CallbackEndpoint::bind(config).await?;
    let mut reduce = ReducePhase {
        registry,
        config,
        callback: endpoint.peer,
        transaction_id,
        document,
    };
    run_phase(
        &mut reduce,
        &endpoint,
        &all_categories(),
        config.callback_timeout(),
        config.max_attempts,
    )
    .await?;

    tracing::info!("Transaction {}: indexing done", transaction_id);
    Ok(())
}
