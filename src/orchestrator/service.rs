use super::indexing::run_indexing;
use super::searching::run_search;
use crate::config::ClusterConfig;
use crate::error::ClusterError;
use crate::membership::client::RegistryClient;
use crate::membership::types::PeerAddress;
use crate::search::types::write_keyword_postings;
use crate::transport::discovery;
use crate::transport::messenger::Messenger;
use crate::transport::tags::Tag;

use anyhow::Result;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};

/// Front door for clients: accepts indexing and searching requests and drives
/// each one as its own job.
pub struct OrchestratorService {
    pub local_peer: PeerAddress,
    registry: RegistryClient,
    listener: TcpListener,
    config: Arc<ClusterConfig>,
}

impl OrchestratorService {
    pub async fn new(
        bind_addr: SocketAddr,
        registry: PeerAddress,
        config: Arc<ClusterConfig>,
    ) -> Result<Arc<Self>> {
        let listener = TcpListener::bind(bind_addr).await?;
        let local_peer = PeerAddress::advertised(listener.local_addr()?, config.advertise_host)?;

        tracing::info!("Orchestrator listening on {} (registry {})", local_peer, registry);

        Ok(Arc::new(Self {
            local_peer,
            registry: RegistryClient::new(registry),
            listener,
            config,
        }))
    }

    /// Publishes the orchestrator address and spawns the accept loop.
    pub async fn start(self: Arc<Self>) -> Result<()> {
        discovery::publish(&self.config.orchestrator_info_path, self.local_peer).await?;

        let _accept_handle = {
            let service = self.clone();
            tokio::spawn(async move {
                service.accept_loop().await;
            })
        };

        tracing::info!("Orchestrator ready");
        Ok(())
    }

    async fn accept_loop(self: Arc<Self>) {
        loop {
            match self.listener.accept().await {
                Ok((stream, remote)) => {
                    let service = self.clone();
                    tokio::spawn(async move {
                        if let Err(e) = service.handle_connection(stream).await {
                            tracing::warn!("Request from {} failed: {:#}", remote, e);
                        }
                    });
                }
                Err(e) => {
                    tracing::error!("Orchestrator accept failed: {}", e);
                    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
                }
            }
        }
    }

    async fn handle_connection(&self, stream: TcpStream) -> Result<()> {
        let mut messenger = Messenger::new(stream);

        match messenger.receive_tag().await? {
            Tag::SubmitIndexing => {
                let dir = messenger.receive_string().await?;
                let transaction_id = messenger.receive_int().await?;

                let reply = match run_indexing(
                    self.registry,
                    &self.config,
                    Path::new(&dir),
                    transaction_id,
                )
                .await
                {
                    Ok(()) => Tag::IndexingDone,
                    Err(e) => {
                        tracing::error!("Transaction {} failed: {:#}", transaction_id, e);
                        Tag::IndexingFailed
                    }
                };
                messenger.send_tag(reply).await?;
            }
            Tag::SubmitSearching => {
                let keywords = messenger.receive_string_list().await?;

                match run_search(self.registry, &self.config, &keywords).await {
                    Ok(results) => {
                        write_keyword_postings(&mut messenger, &results).await?;
                        messenger.send_tag(Tag::SearchingDone).await?;
                    }
                    Err(e) => {
                        tracing::error!("Search for {:?} failed: {:#}", keywords, e);
                        write_keyword_postings(&mut messenger, &[]).await?;
                        messenger.send_tag(Tag::SearchingFailed).await?;
                    }
                }
            }
            other => {
                tracing::warn!("Orchestrator does not serve {:?}", other);
                return Err(ClusterError::UnknownTag(other.code()).into());
            }
        }

        messenger.flush().await
    }
}
