//! Message reconciler: the ordered chat timeline of one room.
//!
//! Three sources feed a timeline: history fetched once on join, messages
//! broadcast by peers, and messages typed locally. The timeline keeps them in
//! one list without dropping or duplicating entries:
//!
//! - history is placed before everything that was appended while the fetch
//!   was in flight, and a later history load replaces only the previous
//!   history block;
//! - a message appended live that the store already returns in history is
//!   kept once, at its live position;
//! - remote messages are appended in arrival order;
//! - local messages are appended immediately as pending and flip to
//!   confirmed at most once when the store acknowledges them.
//!
//! Messages whose room differs from the timeline's room are dropped.

use tracing::debug;

use super::message::{ChatMessage, Origin};
use super::value_object::{LocalMessageId, RoomId, Timestamp};

#[derive(Debug, Clone)]
struct Entry {
    local_id: Option<LocalMessageId>,
    message: ChatMessage,
}

/// Ordered list of chat messages for a single room.
#[derive(Debug, Clone)]
pub struct Timeline {
    room_id: RoomId,
    /// When the room was joined; nothing appended live is older
    joined_at: Timestamp,
    entries: Vec<Entry>,
    /// Number of leading entries that came from the last history load
    history_len: usize,
    next_local_id: u64,
}

impl Timeline {
    pub fn new(room_id: RoomId) -> Self {
        Self::joined_at(room_id, Timestamp::now())
    }

    pub fn joined_at(room_id: RoomId, joined_at: Timestamp) -> Self {
        Self {
            room_id,
            joined_at,
            entries: Vec::new(),
            history_len: 0,
            next_local_id: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Messages in display order.
    pub fn messages(&self) -> impl Iterator<Item = &ChatMessage> {
        self.entries.iter().map(|entry| &entry.message)
    }

    pub fn snapshot(&self) -> Vec<ChatMessage> {
        self.messages().cloned().collect()
    }

    /// Number of local messages still waiting for acknowledgement.
    pub fn pending_count(&self) -> usize {
        self.messages().filter(|m| m.is_pending()).count()
    }

    /// Append a locally authored message as pending.
    ///
    /// Returns `None` when the message belongs to another room.
    pub fn append_local(&mut self, mut message: ChatMessage) -> Option<LocalMessageId> {
        if !self.accepts(&message) {
            return None;
        }
        self.next_local_id += 1;
        let local_id = LocalMessageId::new(self.next_local_id);
        message.origin = Origin::LocalPending;
        self.entries.push(Entry {
            local_id: Some(local_id),
            message,
        });
        Some(local_id)
    }

    /// Append a message broadcast by a peer.
    ///
    /// Returns `false` when the message was dropped because of a room
    /// mismatch.
    pub fn append_remote(&mut self, mut message: ChatMessage) -> bool {
        if !self.accepts(&message) {
            return false;
        }
        message.origin = Origin::Confirmed;
        self.entries.push(Entry {
            local_id: None,
            message,
        });
        true
    }

    /// Mark a local message as acknowledged by the store.
    ///
    /// Returns the message when this call changed its state; unknown ids and
    /// already confirmed messages yield `None`.
    pub fn confirm(&mut self, local_id: LocalMessageId) -> Option<&ChatMessage> {
        let entry = self
            .entries
            .iter_mut()
            .find(|entry| entry.local_id == Some(local_id))?;
        if entry.message.confirm() {
            Some(&entry.message)
        } else {
            None
        }
    }

    /// Install the room history ahead of every entry appended since join.
    ///
    /// Messages from other rooms are filtered out. Returns the number of
    /// history messages kept.
    pub fn load_history(&mut self, history: Vec<ChatMessage>) -> usize {
        let mut block: Vec<Entry> = history
            .into_iter()
            .filter(|message| self.accepts(message))
            .map(|mut message| {
                message.origin = Origin::Confirmed;
                Entry {
                    local_id: None,
                    message,
                }
            })
            .collect();
        let live = self.entries.split_off(self.history_len);
        drop_echoed_history(&mut block, &live, self.joined_at);
        let loaded = block.len();
        block.extend(live);
        self.entries = block;
        self.history_len = loaded;
        loaded
    }

    fn accepts(&self, message: &ChatMessage) -> bool {
        if message.room_id == self.room_id {
            return true;
        }
        debug!(
            "Dropping message for room {} (timeline room: {})",
            message.room_id, self.room_id
        );
        false
    }
}

/// Remove history entries that duplicate live entries.
///
/// A message shown live while the fetch was in flight may already be stored,
/// in which case it comes back among the newest history messages. Only
/// history stored since `joined_at` can be such a copy; older messages with
/// the same text are distinct and stay. The store stamps its own creation
/// time, so candidates are matched on their content and only within the last
/// `live.len()` history messages.
fn drop_echoed_history(history: &mut Vec<Entry>, live: &[Entry], joined_at: Timestamp) {
    let tail_start = history.len().saturating_sub(live.len());
    let mut echoed = vec![false; history.len()];
    for entry in live {
        let found = (tail_start..history.len()).find(|&i| {
            !echoed[i]
                && history[i].message.created_at >= joined_at
                && same_message(&history[i].message, &entry.message)
        });
        if let Some(i) = found {
            echoed[i] = true;
        }
    }
    if echoed.iter().any(|&e| e) {
        debug!(
            "Dropping {} history messages already on the timeline",
            echoed.iter().filter(|&&e| e).count()
        );
    }
    let mut flags = echoed.into_iter();
    history.retain(|_| !flags.next().unwrap_or(false));
}

fn same_message(a: &ChatMessage, b: &ChatMessage) -> bool {
    a.room_id == b.room_id && a.sender == b.sender && a.content == b.content && a.kind == b.kind
}
