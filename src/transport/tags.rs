use crate::error::ClusterError;

/// The leading integer of every connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum Tag {
    HelperRegister = 1,
    BorrowCategorylessHelpers = 2,
    BorrowHelperSetOneEachCategory = 3,
    BorrowHelperInCategory = 4,
    SubmitIndexing = 5,
    DispatchIndexingMap = 6,
    DispatchIndexingReduce = 7,
    /// Used both for client→orchestrator submissions and orchestrator→worker search tasks.
    SubmitSearching = 8,
    ReturnHelper = 9,
    HelperHeartbeat = 10,
    IndexingDone = 11,
    IndexingFailed = 12,
    SearchingFailed = 13,
    SearchingDone = 14,
}

impl Tag {
    pub fn code(self) -> i32 {
        self as i32
    }
}

impl TryFrom<i32> for Tag {
    type Error = ClusterError;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        let tag = match code {
            1 => Tag::HelperRegister,
            2 => Tag::BorrowCategorylessHelpers,
            3 => Tag::BorrowHelperSetOneEachCategory,
            4 => Tag::BorrowHelperInCategory,
            5 => Tag::SubmitIndexing,
            6 => Tag::DispatchIndexingMap,
            7 => Tag::DispatchIndexingReduce,
            8 => Tag::SubmitSearching,
            9 => Tag::ReturnHelper,
            10 => Tag::HelperHeartbeat,
            11 => Tag::IndexingDone,
            12 => Tag::IndexingFailed,
            13 => Tag::SearchingFailed,
            14 => Tag::SearchingDone,
            other => return Err(ClusterError::UnknownTag(other)),
        };
        Ok(tag)
    }
}

/// First field of every registry borrow reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ReplyStatus {
    Ok = 0,
    NoHelper = 1,
}

impl TryFrom<i32> for ReplyStatus {
    type Error = ClusterError;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(ReplyStatus::Ok),
            1 => Ok(ReplyStatus::NoHelper),
            other => Err(ClusterError::UnexpectedReply(format!(
                "reply status {}",
                other
            ))),
        }
    }
}
