use crate::error::ClusterError;
use crate::storage::codec;
use crate::storage::partitioner::Category;
use crate::storage::types::PostingList;
use crate::transport::messenger::Messenger;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncWrite};

/// One worker's answer to a search task.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CategoryResults {
    pub category: Category,
    pub results: Vec<(String, PostingList)>,
}

impl CategoryResults {
    /// Category, then the keyword/postings pairs.
    pub async fn write<S>(&self, messenger: &mut Messenger<S>) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        messenger.send_string(self.category.as_str()).await?;
        write_keyword_postings(messenger, &self.results).await?;
        messenger.flush().await
    }

    pub async fn read<S>(messenger: &mut Messenger<S>) -> Result<Self>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let category = Category::new(messenger.receive_string().await?);
        let results = read_keyword_postings(messenger).await?;
        Ok(Self { category, results })
    }
}

/// The final answer returned to a searching client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum SearchOutcome {
    Done(Vec<(String, PostingList)>),
    Failed,
}

/// Count, then `(keyword, serialized postings)` for each entry.
pub async fn write_keyword_postings<S>(
    messenger: &mut Messenger<S>,
    results: &[(String, PostingList)],
) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    messenger.send_int(i32::try_from(results.len())?).await?;
    for (keyword, postings) in results {
        messenger.send_string(keyword).await?;
        messenger.send_string(&codec::encode_postings(postings)).await?;
    }
    Ok(())
}

pub async fn read_keyword_postings<S>(
    messenger: &mut Messenger<S>,
) -> Result<Vec<(String, PostingList)>>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let count = messenger.receive_list_len().await?;
    let mut results = Vec::with_capacity(count);
    for _ in 0..count {
        let keyword = messenger.receive_string().await?;
        let raw = messenger.receive_string().await?;
        let postings = codec::decode_postings(&raw).ok_or_else(|| {
            ClusterError::UnexpectedReply(format!("bad postings for {:?}: {:?}", keyword, raw))
        })?;
        results.push((keyword, postings));
    }
    Ok(results)
}
