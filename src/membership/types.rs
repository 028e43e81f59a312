use crate::storage::partitioner::Category;

use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, SocketAddrV4};

/// Network identity of a worker or orchestrator endpoint.
///
/// Compared and hashed by value: two records with the same octets and port
/// name the same peer.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeerAddress {
    pub ip: Ipv4Addr,
    pub port: u16,
}

impl PeerAddress {
    pub fn new(ip: Ipv4Addr, port: u16) -> Self {
        Self { ip, port }
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::V4(SocketAddrV4::new(self.ip, self.port))
    }

    /// The address others should use for a listener bound at `local`.
    /// An unspecified bind address (`0.0.0.0`) is replaced by `advertise`.
    pub fn advertised(local: SocketAddr, advertise: Ipv4Addr) -> Result<Self> {
        match local.ip() {
            IpAddr::V4(ip) if ip.is_unspecified() => Ok(Self::new(advertise, local.port())),
            IpAddr::V4(ip) => Ok(Self::new(ip, local.port())),
            IpAddr::V6(_) => Err(anyhow!("IPv6 endpoint {} is not supported", local)),
        }
    }
}

impl fmt::Display for PeerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.ip, self.port)
    }
}

impl TryFrom<SocketAddr> for PeerAddress {
    type Error = anyhow::Error;

    fn try_from(addr: SocketAddr) -> Result<Self> {
        match addr {
            SocketAddr::V4(v4) => Ok(Self::new(*v4.ip(), v4.port())),
            SocketAddr::V6(_) => Err(anyhow!("IPv6 endpoint {} is not supported", addr)),
        }
    }
}

/// One registered worker.
///
/// A worker keeps its category for as long as it stays registered. `load` counts
/// borrows not yet matched by a return.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RegistryEntry {
    pub peer: PeerAddress,
    pub category: Category,
    pub load: u32,
}

/// Read-only view of a member for the status endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberSnapshot {
    pub peer: String,
    pub category: Category,
    pub load: u32,
    pub since_heartbeat_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategorySnapshot {
    pub category: Category,
    pub members: usize,
    pub total_load: u32,
}
