use super::table::RegistryTable;
use super::types::{CategorySnapshot, MemberSnapshot, PeerAddress};
use crate::config::ClusterConfig;
use crate::storage::partitioner::{Category, all_categories};
use crate::transport::messenger::Messenger;
use crate::transport::tags::{ReplyStatus, Tag};
use crate::transport::discovery;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;

/// The cluster's membership registry and load balancer.
///
/// Tracks which worker owns which category, how many outstanding borrows each
/// worker has, and when each worker last sent a heartbeat. All table access goes
/// through one mutex.
pub struct RegistryService {
    pub local_peer: PeerAddress,
    table: Arc<Mutex<RegistryTable>>,
    listener: TcpListener,
    config: Arc<ClusterConfig>,
}

impl RegistryService {
    pub async fn new(bind_addr: SocketAddr, config: Arc<ClusterConfig>) -> Result<Arc<Self>> {
        Self::with_categories(bind_addr, config, all_categories()).await
    }

    pub async fn with_categories(
        bind_addr: SocketAddr,
        config: Arc<ClusterConfig>,
        categories: Vec<Category>,
    ) -> Result<Arc<Self>> {
        let listener = TcpListener::bind(bind_addr).await?;
        let local_peer = PeerAddress::advertised(listener.local_addr()?, config.advertise_host)?;

        tracing::info!(
            "Registry listening on {} with {} categories",
            local_peer,
            categories.len()
        );

        Ok(Arc::new(Self {
            local_peer,
            table: Arc::new(Mutex::new(RegistryTable::new(categories))),
            listener,
            config,
        }))
    }

    /// Publishes the registry address and spawns the accept and eviction loops.
    pub async fn start(self: Arc<Self>) -> Result<()> {
        discovery::publish(&self.config.registry_info_path, self.local_peer).await?;

        let _accept_handle = {
            let service = self.clone();
            tokio::spawn(async move {
                service.accept_loop().await;
            })
        };

        let _eviction_handle = {
            let service = self.clone();
            tokio::spawn(async move {
                service.eviction_loop().await;
            })
        };

        tracing::info!("Registry background tasks started");
        Ok(())
    }

    async fn accept_loop(self: Arc<Self>) {
        loop {
            match self.listener.accept().await {
                Ok((stream, remote)) => {
                    let service = self.clone();
                    tokio::spawn(async move {
                        if let Err(e) = service.handle_connection(stream).await {
                            tracing::warn!("Registry request from {} failed: {:#}", remote, e);
                        }
                    });
                }
                Err(e) => {
                    tracing::error!("Registry accept failed: {}", e);
                    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
                }
            }
        }
    }

    async fn handle_connection(&self, stream: TcpStream) -> Result<()> {
        let mut messenger = Messenger::new(stream);

        match messenger.receive_tag().await? {
            Tag::HelperRegister => {
                let peer = messenger.receive_peer().await?;
                let category = self.register(peer).await;
                messenger.send_string(category.as_str()).await?;
            }
            Tag::BorrowCategorylessHelpers => {
                let n = messenger.receive_list_len().await?;
                match self.borrow_any(n).await {
                    Some(peers) => {
                        messenger.send_int(ReplyStatus::Ok as i32).await?;
                        messenger.send_peer_list(&peers).await?;
                    }
                    None => messenger.send_int(ReplyStatus::NoHelper as i32).await?,
                }
            }
            Tag::BorrowHelperSetOneEachCategory => {
                let peers = self.borrow_one_per_category().await;
                messenger.send_int(ReplyStatus::Ok as i32).await?;
                messenger.send_peer_list(&peers).await?;
            }
            Tag::BorrowHelperInCategory => {
                let category = Category::new(messenger.receive_string().await?);
                match self.borrow_one_in_category(&category).await {
                    Some(peer) => {
                        messenger.send_int(ReplyStatus::Ok as i32).await?;
                        messenger.send_peer(peer).await?;
                    }
                    None => messenger.send_int(ReplyStatus::NoHelper as i32).await?,
                }
            }
            Tag::ReturnHelper => {
                let peer = messenger.receive_peer().await?;
                let category = Category::new(messenger.receive_string().await?);
                self.return_helper(peer, &category).await;
            }
            Tag::HelperHeartbeat => {
                let peer = messenger.receive_peer().await?;
                self.heartbeat(peer).await;
            }
            other => {
                tracing::warn!("Registry does not serve {:?}", other);
                return Err(crate::error::ClusterError::UnknownTag(other.code()).into());
            }
        }

        messenger.flush().await
    }

    pub async fn register(&self, peer: PeerAddress) -> Category {
        let category = self.table.lock().await.register(peer, Instant::now());
        tracing::info!("{} registered and assigned category {}", peer, category);
        category
    }

    pub async fn borrow_any(&self, n: usize) -> Option<Vec<PeerAddress>> {
        match self.table.lock().await.borrow_any(n) {
            Ok(peers) => {
                tracing::debug!("Lent {} categoryless helpers: {:?}", peers.len(), peers);
                Some(peers)
            }
            Err(e) => {
                tracing::warn!("Cannot lend {} helpers: {}", n, e);
                None
            }
        }
    }

    pub async fn borrow_one_in_category(&self, category: &Category) -> Option<PeerAddress> {
        match self.table.lock().await.borrow_one_in_category(category) {
            Ok(peer) => {
                tracing::debug!("Lent {} for category {}", peer, category);
                Some(peer)
            }
            Err(e) => {
                tracing::warn!("{}", e);
                None
            }
        }
    }

    pub async fn borrow_one_per_category(&self) -> Vec<PeerAddress> {
        let peers = self.table.lock().await.borrow_one_per_category();
        tracing::debug!("Lent one helper per category: {:?}", peers);
        peers
    }

    pub async fn return_helper(&self, peer: PeerAddress, category: &Category) {
        if !self.table.lock().await.return_helper(&peer, category) {
            tracing::debug!("Return from unknown helper {} ({})", peer, category);
        }
    }

    pub async fn heartbeat(&self, peer: PeerAddress) {
        if !self.table.lock().await.heartbeat(&peer, Instant::now()) {
            tracing::debug!("Heartbeat from unregistered helper {}", peer);
        }
    }

    async fn eviction_loop(self: Arc<Self>) {
        let mut interval = tokio::time::interval(self.config.eviction_interval());
        let threshold = self.config.dead_threshold();

        loop {
            interval.tick().await;

            let (evicted, remaining) = {
                let mut table = self.table.lock().await;
                let evicted = table.evict_dead(Instant::now(), threshold);
                (evicted, table.len())
            };

            for peer in &evicted {
                tracing::warn!("Helper {} evicted (no heartbeat for {:?})", peer, threshold);
            }
            if !evicted.is_empty() {
                tracing::info!("Registry size now: {} helpers", remaining);
            }
        }
    }

    pub async fn members(&self) -> Vec<MemberSnapshot> {
        self.table.lock().await.members(Instant::now())
    }

    pub async fn category_summary(&self) -> Vec<CategorySnapshot> {
        self.table.lock().await.category_summary()
    }
}
