use super::phase::{CallbackEndpoint, Phase, run_phase, send_tasks};
use crate::config::ClusterConfig;
use crate::membership::client::RegistryClient;
use crate::membership::types::PeerAddress;
use crate::search::engine::ResultSet;
use crate::search::types::CategoryResults;
use crate::storage::partitioner::{Category, group_by_category};
use crate::storage::types::PostingList;
use crate::transport::messenger::Messenger;
use crate::worker::types::Task;

use anyhow::Result;
use std::collections::BTreeMap;
use tokio::net::TcpStream;

/// Search phase: one task per category present in the query.
pub struct SearchPhase<'a> {
    registry: RegistryClient,
    config: &'a ClusterConfig,
    callback: PeerAddress,
    groups: BTreeMap<Category, Vec<String>>,
    results: ResultSet,
}

impl Phase for SearchPhase<'_> {
    type Key = Category;

    const NAME: &'static str = "search";

    async fn dispatch(&mut self, categories: &[Category], _attempt: u32) {
        let mut assignments = Vec::new();
        for category in categories {
            let Some(keywords) = self.groups.get(category) else {
                continue;
            };
            match self.registry.borrow_one_in_category(category).await {
                Ok(worker) => assignments.push((
                    worker,
                    Task::Search {
                        keywords: keywords.clone(),
                    },
                )),
                Err(e) => tracing::warn!("Cannot borrow searcher for {}: {:#}", category, e),
            }
        }
        send_tasks(assignments, self.callback, self.config.callback_timeout()).await;
    }

    async fn receive(&mut self, messenger: &mut Messenger<TcpStream>) -> Result<Category> {
        let partial = CategoryResults::read(messenger).await?;
        let category = partial.category.clone();
        if !self.results.merge(partial) {
            tracing::debug!("Repeat results for {} dropped", category);
        }
        Ok(category)
    }
}

/// Runs one search job and returns every keyword with its ranked postings.
/// Keywords no category can own are answered empty without asking a worker.
pub async fn run_search(
    registry: RegistryClient,
    config: &ClusterConfig,
    keywords: &[String],
) -> Result<Vec<(String, PostingList)>> {
    let mut groups = group_by_category(keywords);
    let mut results = ResultSet::new();

    if let Some(orphans) = groups.remove(&Category::unknown()) {
        tracing::debug!("No category owns {:?}, answering empty", orphans);
        for keyword in &orphans {
            results.insert_empty(keyword);
        }
    }

    let categories: Vec<Category> = groups.keys().cloned().collect();
    tracing::info!(
        "Searching {} keywords across {} categories",
        keywords.len(),
        categories.len()
    );

    let endpoint = CallbackEndpoint::bind(config).await?;
    let mut phase = SearchPhase {
        registry,
        config,
        callback: endpoint.peer,
        groups,
        results,
    };
    run_phase(
        &mut phase,
        &endpoint,
        &categories,
        config.callback_timeout(),
        config.max_attempts,
    )
    .await?;

    Ok(phase.results.into_ranked())
}
