//! Reply placement rules for two-level threads.

use crate::domain::entities::{Message, MAX_THREAD_DEPTH};

/// Where a new reply lands in its thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThreadPlacement {
    /// Direct parent the reply quotes.
    pub reply_to_id: i64,
    pub thread_root_id: i64,
    pub depth: i16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ThreadError {
    #[error("Parent message is in another channel")]
    ChannelMismatch,

    #[error("Cannot reply to a deleted message")]
    ParentDeleted,
}

/// Compute the placement of a reply to `parent` posted in `channel_id`.
///
/// The thread root is inherited from the parent (or is the parent itself)
/// and depth is capped at [`MAX_THREAD_DEPTH`], so replies to depth-2
/// messages stay at depth 2 while still quoting their parent.
pub fn place_reply(parent: &Message, channel_id: i64) -> Result<ThreadPlacement, ThreadError> {
    if parent.channel_id != channel_id {
        return Err(ThreadError::ChannelMismatch);
    }
    if parent.is_deleted() {
        return Err(ThreadError::ParentDeleted);
    }

    Ok(ThreadPlacement {
        reply_to_id: parent.id,
        thread_root_id: parent.thread_root_id.unwrap_or(parent.id),
        depth: (parent.depth + 1).min(MAX_THREAD_DEPTH),
    })
}
