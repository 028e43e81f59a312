use crate::membership::types::PeerAddress;
use crate::transport::messenger::Messenger;
use crate::transport::tags::Tag;

use anyhow::Result;
use tokio::io::{AsyncRead, AsyncWrite};

/// One unit of work an orchestrator hands to a worker.
///
/// Each task travels on its own connection: the tag, the task fields, then the
/// orchestrator's callback address. The worker answers on a new connection to
/// that address once the task is finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Task {
    /// Count the words of one input segment.
    Map { segment: String, transaction_id: i32 },
    /// Fold a transaction's map output into the worker's shard under `document`.
    Reduce { transaction_id: i32, document: String },
    /// Look keywords up in the worker's shard.
    Search { keywords: Vec<String> },
}

impl Task {
    pub fn tag(&self) -> Tag {
        match self {
            Task::Map { .. } => Tag::DispatchIndexingMap,
            Task::Reduce { .. } => Tag::DispatchIndexingReduce,
            Task::Search { .. } => Tag::SubmitSearching,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Task::Map { .. } => "map",
            Task::Reduce { .. } => "reduce",
            Task::Search { .. } => "search",
        }
    }

    /// Writes the full request, tag included.
    pub async fn write<S>(&self, messenger: &mut Messenger<S>, callback: PeerAddress) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        messenger.send_tag(self.tag()).await?;
        match self {
            Task::Map {
                segment,
                transaction_id,
            } => {
                messenger.send_string(segment).await?;
                messenger.send_int(*transaction_id).await?;
            }
            Task::Reduce {
                transaction_id,
                document,
            } => {
                messenger.send_int(*transaction_id).await?;
                messenger.send_string(document).await?;
            }
            Task::Search { keywords } => {
                messenger.send_string_list(keywords).await?;
            }
        }
        messenger.send_peer(callback).await?;
        messenger.flush().await
    }

    /// Reads the task body that follows `tag`. Returns `None` for tags that do
    /// not start a worker task.
    pub async fn read<S>(tag: Tag, messenger: &mut Messenger<S>) -> Result<Option<(Task, PeerAddress)>>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let task = match tag {
            Tag::DispatchIndexingMap => Task::Map {
                segment: messenger.receive_string().await?,
                transaction_id: messenger.receive_int().await?,
            },
            Tag::DispatchIndexingReduce => Task::Reduce {
                transaction_id: messenger.receive_int().await?,
                document: messenger.receive_string().await?,
            },
            Tag::SubmitSearching => Task::Search {
                keywords: messenger.receive_string_list().await?,
            },
            _ => return Ok(None),
        };
        let callback = messenger.receive_peer().await?;
        Ok(Some((task, callback)))
    }
}
