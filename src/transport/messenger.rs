//! Typed primitives over a byte stream.
//!
//! Layout on the wire:
//! - int: big-endian `i32`
//! - string: big-endian `u32` byte length, then UTF-8 bytes
//! - peer: 4 IPv4 octets, then big-endian `u16` port
//! - peer list: int count, then that many peers

use super::tags::Tag;
use crate::membership::types::PeerAddress;

use anyhow::{Context, Result, anyhow};
use std::net::Ipv4Addr;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;

const MAX_STRING_BYTES: usize = 16 * 1024 * 1024;
const MAX_LIST_LEN: i32 = 1_000_000;

pub struct Messenger<S = TcpStream> {
    stream: S,
}

impl Messenger<TcpStream> {
    /// Opens a fresh connection to `peer`.
    pub async fn connect(peer: PeerAddress) -> Result<Self> {
        let stream = TcpStream::connect(peer.socket_addr())
            .await
            .with_context(|| format!("connect to {}", peer))?;
        stream.set_nodelay(true).ok();
        Ok(Self { stream })
    }

    /// Connects and immediately sends the request tag.
    pub async fn open(peer: PeerAddress, tag: Tag) -> Result<Self> {
        let mut messenger = Self::connect(peer).await?;
        messenger.send_tag(tag).await?;
        Ok(messenger)
    }
}

impl<S> Messenger<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S) -> Self {
        Self { stream }
    }

    pub async fn send_tag(&mut self, tag: Tag) -> Result<()> {
        self.send_int(tag.code()).await
    }

    pub async fn receive_tag(&mut self) -> Result<Tag> {
        let code = self.receive_int().await.context("read request tag")?;
        Ok(Tag::try_from(code)?)
    }

    pub async fn send_int(&mut self, value: i32) -> Result<()> {
        self.stream.write_i32(value).await.context("write int")?;
        Ok(())
    }

    pub async fn receive_int(&mut self) -> Result<i32> {
        Ok(self.stream.read_i32().await.context("read int")?)
    }

    pub async fn send_string(&mut self, value: &str) -> Result<()> {
        let len: u32 = value
            .len()
            .try_into()
            .map_err(|_| anyhow!("string too large to send: {} bytes", value.len()))?;
        self.stream.write_u32(len).await.context("write string len")?;
        self.stream
            .write_all(value.as_bytes())
            .await
            .context("write string bytes")?;
        Ok(())
    }

    pub async fn receive_string(&mut self) -> Result<String> {
        let len = self.stream.read_u32().await.context("read string len")? as usize;
        if len > MAX_STRING_BYTES {
            return Err(anyhow!(
                "string too large: {} bytes (max {})",
                len,
                MAX_STRING_BYTES
            ));
        }
        let mut buf = vec![0u8; len];
        self.stream
            .read_exact(&mut buf)
            .await
            .context("read string bytes")?;
        String::from_utf8(buf).context("string is not valid UTF-8")
    }

    pub async fn send_peer(&mut self, peer: PeerAddress) -> Result<()> {
        self.stream
            .write_all(&peer.ip.octets())
            .await
            .context("write peer address")?;
        self.stream
            .write_u16(peer.port)
            .await
            .context("write peer port")?;
        Ok(())
    }

    pub async fn receive_peer(&mut self) -> Result<PeerAddress> {
        let mut octets = [0u8; 4];
        self.stream
            .read_exact(&mut octets)
            .await
            .context("read peer address")?;
        let port = self.stream.read_u16().await.context("read peer port")?;
        Ok(PeerAddress::new(Ipv4Addr::from(octets), port))
    }

    pub async fn send_peer_list(&mut self, peers: &[PeerAddress]) -> Result<()> {
        let count: i32 = peers
            .len()
            .try_into()
            .map_err(|_| anyhow!("peer list too long"))?;
        self.send_int(count).await?;
        for peer in peers {
            self.send_peer(*peer).await?;
        }
        Ok(())
    }

    pub async fn receive_peer_list(&mut self) -> Result<Vec<PeerAddress>> {
        let count = self.receive_list_len().await?;
        let mut peers = Vec::with_capacity(count);
        for _ in 0..count {
            peers.push(self.receive_peer().await?);
        }
        Ok(peers)
    }

    pub async fn send_string_list(&mut self, values: &[String]) -> Result<()> {
        let count: i32 = values
            .len()
            .try_into()
            .map_err(|_| anyhow!("string list too long"))?;
        self.send_int(count).await?;
        for value in values {
            self.send_string(value).await?;
        }
        Ok(())
    }

    pub async fn receive_string_list(&mut self) -> Result<Vec<String>> {
        let count = self.receive_list_len().await?;
        let mut values = Vec::with_capacity(count);
        for _ in 0..count {
            values.push(self.receive_string().await?);
        }
        Ok(values)
    }

    /// Reads a count prefix and checks it is usable as a length.
    pub async fn receive_list_len(&mut self) -> Result<usize> {
        let count = self.receive_int().await.context("read list length")?;
        if !(0..=MAX_LIST_LEN).contains(&count) {
            return Err(anyhow!("invalid list length {}", count));
        }
        Ok(count as usize)
    }

    pub async fn flush(&mut self) -> Result<()> {
        self.stream.flush().await.context("flush stream")?;
        Ok(())
    }
}
