use super::tasks;
use super::types::Task;
use crate::config::ClusterConfig;
use crate::error::ClusterError;
use crate::membership::client::RegistryClient;
use crate::membership::types::PeerAddress;
use crate::storage::partitioner::Category;
use crate::storage::shard::Shard;
use crate::transport::messenger::Messenger;

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};

/// A worker process: owns one category's shard and runs map, reduce and search
/// tasks handed to it by orchestrators.
pub struct WorkerService {
    pub local_peer: PeerAddress,
    category: Category,
    shard: Shard,
    registry: RegistryClient,
    listener: TcpListener,
    config: Arc<ClusterConfig>,
}

impl WorkerService {
    /// Binds, registers with the registry to learn the category, then loads
    /// that category's shard from disk (or starts it empty).
    pub async fn new(
        bind_addr: SocketAddr,
        registry: PeerAddress,
        config: Arc<ClusterConfig>,
    ) -> Result<Arc<Self>> {
        let listener = TcpListener::bind(bind_addr).await?;
        let local_peer = PeerAddress::advertised(listener.local_addr()?, config.advertise_host)?;
        let registry = RegistryClient::new(registry);

        let category = registry
            .register(local_peer)
            .await
            .with_context(|| format!("register with registry at {}", registry.address()))?;
        tracing::info!("Worker {} registered, owns category {}", local_peer, category);

        let shard = Shard::open(&config.reducers_dir(), category.clone()).await?;

        Ok(Arc::new(Self {
            local_peer,
            category,
            shard,
            registry,
            listener,
            config,
        }))
    }

    pub fn category(&self) -> &Category {
        &self.category
    }

    pub fn shard(&self) -> &Shard {
        &self.shard
    }

    /// Spawns the accept loop and the heartbeat loop.
    pub async fn start(self: Arc<Self>) {
        let _accept_handle = {
            let service = self.clone();
            tokio::spawn(async move {
                service.accept_loop().await;
            })
        };

        let _heartbeat_handle = {
            let service = self.clone();
            tokio::spawn(async move {
                service.heartbeat_loop().await;
            })
        };

        tracing::info!("Worker {} background tasks started", self.local_peer);
    }

    async fn accept_loop(self: Arc<Self>) {
        loop {
            match self.listener.accept().await {
                Ok((stream, remote)) => {
                    let service = self.clone();
                    tokio::spawn(async move {
                        if let Err(e) = service.handle_connection(stream).await {
                            tracing::warn!("Task from {} failed: {:#}", remote, e);
                        }
                    });
                }
                Err(e) => {
                    tracing::error!("Worker accept failed: {}", e);
                    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
                }
            }
        }
    }

    async fn heartbeat_loop(self: Arc<Self>) {
        let mut interval = tokio::time::interval(self.config.heartbeat_interval());

        loop {
            interval.tick().await;
            match self.registry.heartbeat(self.local_peer).await {
                Ok(()) => tracing::trace!("Heartbeat sent for {}", self.local_peer),
                Err(e) => tracing::warn!("Heartbeat to {} failed: {:#}", self.registry.address(), e),
            }
        }
    }

    async fn handle_connection(&self, stream: TcpStream) -> Result<()> {
        let mut messenger = Messenger::new(stream);
        let tag = messenger.receive_tag().await?;
        let Some((task, callback)) = Task::read(tag, &mut messenger).await? else {
            return Err(ClusterError::UnknownTag(tag.code()).into());
        };
        drop(messenger);

        tracing::info!("Running {} task, reporting to {}", task.kind(), callback);
        let outcome = self.run(&task, callback).await;

        // The borrow is released whether or not the task succeeded.
        if let Err(e) = self
            .registry
            .return_helper(self.local_peer, &self.category)
            .await
        {
            tracing::warn!("Could not return {} to the registry: {:#}", self.local_peer, e);
        }

        outcome.with_context(|| format!("{} task", task.kind()))
    }

    async fn run(&self, task: &Task, callback: PeerAddress) -> Result<()> {
        match task {
            Task::Map {
                segment,
                transaction_id,
            } => {
                let output_dir = self.config.transaction_dir(*transaction_id);
                tasks::map_segment(Path::new(segment), &output_dir).await?;

                let mut messenger = Messenger::connect(callback).await?;
                messenger.send_string(segment).await?;
                messenger.flush().await?;
            }
            Task::Reduce {
                transaction_id,
                document,
            } => {
                let transaction_dir = self.config.transaction_dir(*transaction_id);
                let counts = tasks::reduce_transaction(&transaction_dir, &self.category).await?;
                self.shard.merge_and_persist(&counts, document).await?;
                tracing::info!(
                    "Merged {} words of {} into shard {}",
                    counts.len(),
                    document,
                    self.category
                );

                let mut messenger = Messenger::connect(callback).await?;
                messenger.send_string(self.category.as_str()).await?;
                messenger.flush().await?;
            }
            Task::Search { keywords } => {
                let results = tasks::search_shard(&self.shard, keywords);
                let mut messenger = Messenger::connect(callback).await?;
                results.write(&mut messenger).await?;
            }
        }
        Ok(())
    }
}
