//! Per-chat ordered message collections. Every admission path — history
//! fetch, push event, local optimistic action — goes through one of the four
//! operations here, and every operation is total: bad input degrades to a
//! no-op, never a panic.

use std::collections::HashMap;

use crate::state::{Message, MessageBody, MessageId};

/// Partial update applied to an existing message, located by id.
#[derive(Clone, Debug)]
pub(crate) struct MessagePatch {
    pub id: MessageId,
    pub content: Option<String>,
    pub edited: Option<bool>,
    pub edited_at: Option<i64>,
}

#[derive(Default)]
pub(crate) struct TimelineStore {
    timelines: HashMap<String, Vec<Message>>,
}

impl TimelineStore {
    /// Overwrite the whole timeline for `chat_id` with a freshly fetched
    /// history. No merge with whatever was already there: push events that
    /// raced an in-flight fetch are dropped by this overwrite. Idempotent.
    pub fn replace(&mut self, chat_id: &str, messages: Vec<Message>) {
        self.timelines.insert(chat_id.to_string(), messages);
    }

    /// Append to the end of the timeline, whatever the message's own
    /// timestamp says. Arrival order is the timeline order; duplicate
    /// delivery produces duplicate entries.
    pub fn append(&mut self, chat_id: &str, message: Message) {
        self.timelines
            .entry(chat_id.to_string())
            .or_default()
            .push(message);
    }

    /// Merge `patch` into the message with the matching id. Ids match on
    /// their canonical string form, so the plain and wrapped wire shapes are
    /// interchangeable. No match: the timeline is left untouched.
    pub fn update(&mut self, chat_id: &str, patch: MessagePatch) {
        let Some(timeline) = self.timelines.get_mut(chat_id) else {
            return;
        };
        let Some(message) = timeline
            .iter_mut()
            .find(|m| m.id.canonical() == patch.id.canonical())
        else {
            return;
        };
        if let Some(content) = patch.content {
            message.body = MessageBody::Text(content);
        }
        if let Some(edited) = patch.edited {
            message.edited = edited;
        }
        if let Some(edited_at) = patch.edited_at {
            message.edited_at = Some(edited_at);
        }
    }

    /// Remove the message with the matching id; absence is a silent no-op.
    pub fn remove(&mut self, chat_id: &str, id: &MessageId) {
        if let Some(timeline) = self.timelines.get_mut(chat_id) {
            timeline.retain(|m| m.id.canonical() != id.canonical());
        }
    }

    pub fn messages(&self, chat_id: &str) -> &[Message] {
        self.timelines
            .get(chat_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Drop a chat's timeline entirely (chat deleted or left).
    pub fn discard(&mut self, chat_id: &str) {
        self.timelines.remove(chat_id);
    }

    pub fn clear(&mut self) {
        self.timelines.clear();
    }
}
