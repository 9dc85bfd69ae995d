//! Reconciliation of realtime events with fetched message pages.
//!
//! A [`MessageWindow`] is a client's local copy of a channel's root
//! messages (or a thread's replies). Pages arrive from the HTTP API while
//! events arrive from the broker, in any order and possibly duplicated;
//! the window converges to the same state either way.
//!
//! Channel history is paged backwards (`before=`, newest first) and thread
//! replies forwards (`after=`, oldest first), matching the listing
//! endpoints. [`MessageWindow::next_cursor`] hides the difference.

use crate::domain::entities::{Message, PinScope};
use crate::domain::events::RealtimeEvent;

/// What a window shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowScope {
    /// Root messages of a channel
    Channel(i64),
    /// Replies of a thread root
    Thread(i64),
}

/// Query cursor for the next page of a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageCursor {
    /// Older messages (`before=`)
    Before(i64),
    /// Newer messages (`after=`)
    After(i64),
}

#[derive(Debug, Clone)]
pub struct MessageWindow {
    scope: WindowScope,
    // Ascending by id (= creation order).
    messages: Vec<Message>,
    has_more: bool,
}

impl MessageWindow {
    pub fn for_channel(channel_id: i64) -> Self {
        Self::new(WindowScope::Channel(channel_id))
    }

    pub fn for_thread(root_id: i64) -> Self {
        Self::new(WindowScope::Thread(root_id))
    }

    fn new(scope: WindowScope) -> Self {
        Self {
            scope,
            messages: Vec::new(),
            has_more: true,
        }
    }

    pub fn scope(&self) -> WindowScope {
        self.scope
    }

    /// Messages in ascending order.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn get(&self, id: i64) -> Option<&Message> {
        self.position(id).map(|i| &self.messages[i])
    }

    /// Whether the server has more pages in the window's paging direction:
    /// older roots for a channel, newer replies for a thread.
    pub fn has_more(&self) -> bool {
        self.has_more
    }

    pub fn oldest_cursor(&self) -> Option<i64> {
        self.messages.first().map(|m| m.id)
    }

    pub fn newest_id(&self) -> Option<i64> {
        self.messages.last().map(|m| m.id)
    }

    /// Cursor for the next page, `None` before the first fetch.
    pub fn next_cursor(&self) -> Option<PageCursor> {
        match self.scope {
            WindowScope::Channel(_) => self.oldest_cursor().map(PageCursor::Before),
            WindowScope::Thread(_) => self.newest_id().map(PageCursor::After),
        }
    }

    /// Merge a fetched page in any order.
    ///
    /// `has_more` is taken from the page when it is empty or reaches at
    /// least as far as the window already did in its paging direction.
    pub fn merge_page(&mut self, page: Vec<Message>, has_more: bool) {
        let frontier = self.frontier();
        let page_reach = match self.scope {
            WindowScope::Channel(_) => page.iter().map(|m| m.id).min(),
            WindowScope::Thread(_) => page.iter().map(|m| m.id).max(),
        };

        for message in page {
            if self.in_scope(&message) {
                self.upsert(message, true);
            }
        }

        let reaches = match (frontier, page_reach) {
            (None, _) | (_, None) => true,
            (Some(frontier), Some(reach)) => match self.scope {
                WindowScope::Channel(_) => reach <= frontier,
                WindowScope::Thread(_) => reach >= frontier,
            },
        };
        if reaches {
            self.has_more = has_more;
        }
    }

    /// Apply a realtime event. Returns whether the window changed.
    pub fn apply(&mut self, event: &RealtimeEvent) -> bool {
        match event {
            RealtimeEvent::MessageCreated(message) => {
                if !self.in_scope(message) || self.belongs_to_unfetched_page(message.id) {
                    return false;
                }
                self.upsert(message.clone(), false)
            }
            RealtimeEvent::MessageUpdated(message) => {
                if self.get(message.id).is_none() {
                    return false;
                }
                self.upsert(message.clone(), false)
            }
            RealtimeEvent::MessagePinned { message, scope } => {
                self.set_pin(message.id, *scope, true)
            }
            RealtimeEvent::MessageUnpinned { message, scope } => {
                self.set_pin(message.id, *scope, false)
            }
            RealtimeEvent::MessageDeleted(message) => self.apply_delete(message),
            RealtimeEvent::ThreadReplyCount {
                channel_id,
                root_id,
                reply_count,
            } => {
                if self.scope != WindowScope::Channel(*channel_id) {
                    return false;
                }
                self.set_reply_count(*root_id, *reply_count)
            }
            _ => false,
        }
    }

    fn in_scope(&self, message: &Message) -> bool {
        match self.scope {
            WindowScope::Channel(id) => message.channel_id == id && message.is_root(),
            WindowScope::Thread(root) => message.thread_root_id == Some(root),
        }
    }

    // Deleted replies vanish; deleted roots linger while they have replies.
    fn is_displayed(&self, message: &Message) -> bool {
        match self.scope {
            WindowScope::Channel(_) => message.is_visible_in_channel(),
            WindowScope::Thread(_) => !message.is_deleted(),
        }
    }

    // Farthest id loaded in the paging direction.
    fn frontier(&self) -> Option<i64> {
        match self.scope {
            WindowScope::Channel(_) => self.oldest_cursor(),
            WindowScope::Thread(_) => self.newest_id(),
        }
    }

    // An id past the frontier while pages remain will be delivered by a
    // later page fetch instead. A thread window that has not loaded its
    // first page yet takes everything from that page.
    fn belongs_to_unfetched_page(&self, id: i64) -> bool {
        if !self.has_more {
            return false;
        }
        match (self.scope, self.frontier()) {
            (WindowScope::Channel(_), frontier) => frontier.is_some_and(|oldest| id < oldest),
            (WindowScope::Thread(_), None) => true,
            (WindowScope::Thread(_), Some(newest)) => id > newest,
        }
    }

    fn position(&self, id: i64) -> Option<usize> {
        self.messages.binary_search_by_key(&id, |m| m.id).ok()
    }

    /// Insert or replace, never letting an older copy overwrite a newer one.
    ///
    /// Reply counts on fetched pages are authoritative; event copies keep
    /// the local count, which only `thread.reply_count` moves.
    fn upsert(&mut self, incoming: Message, from_page: bool) -> bool {
        match self.messages.binary_search_by_key(&incoming.id, |m| m.id) {
            Ok(i) => {
                let current = &self.messages[i];
                let reply_count = if from_page || incoming.is_deleted() {
                    incoming.reply_count
                } else {
                    current.reply_count
                };
                let stale = (current.is_deleted() && !incoming.is_deleted())
                    || incoming.last_modified() < current.last_modified();
                let next = if stale {
                    Message {
                        reply_count,
                        ..current.clone()
                    }
                } else {
                    Message {
                        reply_count,
                        ..incoming
                    }
                };
                if next == *current {
                    return false;
                }
                if self.is_displayed(&next) {
                    self.messages[i] = next;
                } else {
                    self.messages.remove(i);
                }
                true
            }
            Err(i) => {
                if !self.is_displayed(&incoming) {
                    return false;
                }
                self.messages.insert(i, incoming);
                true
            }
        }
    }

    fn set_pin(&mut self, id: i64, scope: PinScope, pinned: bool) -> bool {
        let Some(i) = self.position(id) else {
            return false;
        };
        let message = &mut self.messages[i];
        let flag = match scope {
            PinScope::Channel => &mut message.pinned_in_channel,
            PinScope::Thread => &mut message.pinned_in_thread,
        };
        if *flag == pinned {
            return false;
        }
        *flag = pinned;
        true
    }

    fn apply_delete(&mut self, deleted: &Message) -> bool {
        let Some(i) = self.position(deleted.id) else {
            return false;
        };
        if self.is_displayed(deleted) {
            if self.messages[i].is_deleted() {
                return false;
            }
            self.messages[i] = deleted.clone();
        } else {
            self.messages.remove(i);
        }
        true
    }

    fn set_reply_count(&mut self, root_id: i64, reply_count: i32) -> bool {
        let Some(i) = self.position(root_id) else {
            return false;
        };
        if self.messages[i].reply_count == reply_count {
            return false;
        }
        self.messages[i].reply_count = reply_count;
        if !self.is_displayed(&self.messages[i]) {
            self.messages.remove(i);
        }
        true
    }
}
