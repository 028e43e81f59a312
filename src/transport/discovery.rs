//! Well-known address files.
//!
//! A published endpoint is written as two lines: the IPv4 address, then the port.

use crate::membership::types::PeerAddress;

use anyhow::{Context, Result, anyhow};
use std::net::Ipv4Addr;
use std::path::Path;

pub async fn publish(path: &Path, peer: PeerAddress) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("create {}", parent.display()))?;
    }
    let contents = format!("{}\n{}\n", peer.ip, peer.port);
    tokio::fs::write(path, contents)
        .await
        .with_context(|| format!("write discovery file {}", path.display()))?;
    tracing::info!("Published {} to {}", peer, path.display());
    Ok(())
}

pub async fn lookup(path: &Path) -> Result<PeerAddress> {
    let contents = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("read discovery file {}", path.display()))?;
    parse(&contents).with_context(|| format!("parse discovery file {}", path.display()))
}

pub fn parse(contents: &str) -> Result<PeerAddress> {
    let mut lines = contents.lines().map(str::trim).filter(|l| !l.is_empty());
    let ip: Ipv4Addr = lines
        .next()
        .ok_or_else(|| anyhow!("missing address line"))?
        .parse()
        .context("invalid IPv4 address")?;
    let port: u16 = lines
        .next()
        .ok_or_else(|| anyhow!("missing port line"))?
        .parse()
        .context("invalid port")?;
    Ok(PeerAddress::new(ip, port))
}
