//! Caller side of the registry protocol.
//!
//! Every call opens its own connection, mirroring how the registry serves one
//! request per connection.

use super::types::PeerAddress;
use crate::error::ClusterError;
use crate::storage::partitioner::Category;
use crate::transport::messenger::Messenger;
use crate::transport::tags::{ReplyStatus, Tag};

use anyhow::{Context, Result};

#[derive(Debug, Clone, Copy)]
pub struct RegistryClient {
    registry: PeerAddress,
}

impl RegistryClient {
    pub fn new(registry: PeerAddress) -> Self {
        Self { registry }
    }

    pub fn address(&self) -> PeerAddress {
        self.registry
    }

    pub async fn register(&self, me: PeerAddress) -> Result<Category> {
        let mut messenger = Messenger::open(self.registry, Tag::HelperRegister).await?;
        messenger.send_peer(me).await?;
        let category = messenger
            .receive_string()
            .await
            .context("read assigned category")?;
        Ok(Category::new(category))
    }

    /// `n` least-loaded helpers from any category.
    pub async fn borrow_any(&self, n: usize) -> Result<Vec<PeerAddress>> {
        if n == 0 {
            return Ok(Vec::new());
        }

        let mut messenger =
            Messenger::open(self.registry, Tag::BorrowCategorylessHelpers).await?;
        messenger.send_int(i32::try_from(n)?).await?;
        Self::expect_ok(&mut messenger, None).await?;
        let peers = messenger.receive_peer_list().await?;
        if peers.len() != n {
            return Err(ClusterError::UnexpectedReply(format!(
                "asked for {} helpers, got {}",
                n,
                peers.len()
            ))
            .into());
        }
        Ok(peers)
    }

    /// One helper from every category that currently has members.
    pub async fn borrow_one_per_category(&self) -> Result<Vec<PeerAddress>> {
        let mut messenger =
            Messenger::open(self.registry, Tag::BorrowHelperSetOneEachCategory).await?;
        Self::expect_ok(&mut messenger, None).await?;
        messenger.receive_peer_list().await
    }

    pub async fn borrow_one_in_category(&self, category: &Category) -> Result<PeerAddress> {
        let mut messenger = Messenger::open(self.registry, Tag::BorrowHelperInCategory).await?;
        messenger.send_string(category.as_str()).await?;
        Self::expect_ok(&mut messenger, Some(category)).await?;
        messenger.receive_peer().await
    }

    pub async fn return_helper(&self, me: PeerAddress, category: &Category) -> Result<()> {
        let mut messenger = Messenger::open(self.registry, Tag::ReturnHelper).await?;
        messenger.send_peer(me).await?;
        messenger.send_string(category.as_str()).await?;
        messenger.flush().await
    }

    pub async fn heartbeat(&self, me: PeerAddress) -> Result<()> {
        let mut messenger = Messenger::open(self.registry, Tag::HelperHeartbeat).await?;
        messenger.send_peer(me).await?;
        messenger.flush().await
    }

    async fn expect_ok(messenger: &mut Messenger, category: Option<&Category>) -> Result<()> {
        let status = ReplyStatus::try_from(messenger.receive_int().await?)?;
        match status {
            ReplyStatus::Ok => Ok(()),
            ReplyStatus::NoHelper => Err(ClusterError::NoHelper {
                category: category.cloned(),
            }
            .into()),
        }
    }
}
