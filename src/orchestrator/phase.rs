//! The accept/timeout/retry loop shared by every job phase.
//!
//! A phase owns a set of work keys (segment paths, categories). It dispatches
//! tasks for all keys, then accepts completion callbacks on its own endpoint.
//! Each accept waits at most one callback timeout; when it expires with work
//! left, the still-unfinished keys are dispatched again to fresh workers. After
//! `max_attempts` dispatch rounds the phase gives up.

use crate::config::ClusterConfig;
use crate::error::ClusterError;
use crate::membership::types::PeerAddress;
use crate::transport::messenger::Messenger;
use crate::worker::types::Task;

use anyhow::Result;
use std::collections::HashSet;
use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinSet;

/// One phase of a job, as seen by `run_phase`.
pub trait Phase: Send {
    /// Identifies one unit of work; callbacks report it back.
    type Key: Clone + Eq + Hash + Debug + Send + Sync;

    const NAME: &'static str;

    /// Sends tasks for `keys`. Failures to borrow or reach a worker are logged
    /// and leave those keys unfinished; the next timeout retries them.
    fn dispatch(&mut self, keys: &[Self::Key], attempt: u32) -> impl Future<Output = ()> + Send;

    /// Reads one completion callback.
    fn receive(
        &mut self,
        messenger: &mut Messenger<TcpStream>,
    ) -> impl Future<Output = Result<Self::Key>> + Send;
}

/// A listening socket that workers report back to, plus the address they are
/// told to use.
pub struct CallbackEndpoint {
    pub peer: PeerAddress,
    listener: TcpListener,
}

impl CallbackEndpoint {
    /// Binds an ephemeral port on all interfaces, advertised as `advertise_host`.
    pub async fn bind(config: &ClusterConfig) -> Result<Self> {
        let listener = TcpListener::bind(SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0))).await?;
        let peer = PeerAddress::advertised(listener.local_addr()?, config.advertise_host)?;
        Ok(Self { peer, listener })
    }
}

pub async fn run_phase<P: Phase>(
    phase: &mut P,
    endpoint: &CallbackEndpoint,
    keys: &[P::Key],
    timeout: Duration,
    max_attempts: u32,
) -> Result<(), ClusterError> {
    let mut unfinished: HashSet<P::Key> = keys.iter().cloned().collect();
    if unfinished.is_empty() {
        return Ok(());
    }

    let mut attempt = 1;
    tracing::info!("{} phase: dispatching {} tasks", P::NAME, unfinished.len());
    phase.dispatch(keys, attempt).await;

    while !unfinished.is_empty() {
        match tokio::time::timeout(timeout, endpoint.listener.accept()).await {
            Ok(Ok((stream, remote))) => {
                let mut messenger = Messenger::new(stream);
                match tokio::time::timeout(timeout, phase.receive(&mut messenger)).await {
                    Ok(Ok(key)) => {
                        if unfinished.remove(&key) {
                            tracing::debug!(
                                "{} phase: {:?} finished ({} left)",
                                P::NAME,
                                key,
                                unfinished.len()
                            );
                        } else {
                            tracing::debug!("{} phase: ignoring repeat callback for {:?}", P::NAME, key);
                        }
                    }
                    Ok(Err(e)) => tracing::warn!("{} phase: bad callback from {}: {:#}", P::NAME, remote, e),
                    Err(_) => tracing::warn!("{} phase: callback from {} stalled", P::NAME, remote),
                }
            }
            Ok(Err(e)) => {
                tracing::warn!("{} phase: accept failed: {}", P::NAME, e);
            }
            Err(_) => {
                if attempt >= max_attempts {
                    tracing::error!(
                        "{} phase: giving up after {} attempts, {} unfinished",
                        P::NAME,
                        attempt,
                        unfinished.len()
                    );
                    return Err(ClusterError::RetryExhausted {
                        phase: P::NAME,
                        attempts: attempt,
                        remaining: unfinished.len(),
                    });
                }

                attempt += 1;
                let pending: Vec<P::Key> = keys
                    .iter()
                    .filter(|k| unfinished.contains(*k))
                    .cloned()
                    .collect();
                tracing::warn!(
                    "{} phase: timed out with {} unfinished, attempt {}/{}",
                    P::NAME,
                    pending.len(),
                    attempt,
                    max_attempts
                );
                phase.dispatch(&pending, attempt).await;
            }
        }
    }

    tracing::info!("{} phase: complete after {} attempt(s)", P::NAME, attempt);
    Ok(())
}

/// Sends every `(worker, task)` pair concurrently. Each send is bounded by
/// `timeout`; failures are logged and otherwise dropped.
pub async fn send_tasks(assignments: Vec<(PeerAddress, Task)>, callback: PeerAddress, timeout: Duration) {
    let mut sends = JoinSet::new();
    for (worker, task) in assignments {
        sends.spawn(async move {
            let sent = tokio::time::timeout(timeout, async {
                let mut messenger = Messenger::connect(worker).await?;
                task.write(&mut messenger, callback).await
            })
            .await;
            match sent {
                Ok(Ok(())) => tracing::debug!("Sent {} task to {}", task.kind(), worker),
                Ok(Err(e)) => tracing::warn!("Could not send {} task to {}: {:#}", task.kind(), worker, e),
                Err(_) => tracing::warn!("Sending {} task to {} timed out", task.kind(), worker),
            }
        });
    }
    while sends.join_next().await.is_some() {}
}
