use std::collections::HashMap;

use crate::common::Message;

/// Messages of the open conversation, in display order, keyed by id.
///
/// The id index makes replace-in-place and socket updates O(1); positions
/// only shift on insertion before the tail or on removal.
#[derive(Debug, Default)]
pub struct MessageStore {
    chat_id: Option<String>,
    messages: Vec<Message>,
    index: HashMap<String, usize>,
}

impl MessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn chat_id(&self) -> Option<&str> {
        self.chat_id.as_deref()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Message> {
        self.index.get(id).map(|&position| &self.messages[position])
    }

    pub fn pending(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter().filter(|message| message.is_temporary)
    }

    /// Drops everything and scopes the store to `chat_id`.
    pub fn reset(&mut self, chat_id: Option<&str>) {
        self.chat_id = chat_id.map(str::to_string);
        self.messages.clear();
        self.index.clear();
    }

    /// Replaces the history with `history`, keeping unconfirmed local messages at the end.
    pub fn load_history(&mut self, chat_id: &str, mut history: Vec<Message>) {
        let pending: Vec<Message> = if self.chat_id.as_deref() == Some(chat_id) {
            self.messages
                .drain(..)
                .filter(|message| message.is_temporary)
                .collect()
        } else {
            Vec::new()
        };

        self.reset(Some(chat_id));
        history.retain(|message| message.chat_id == chat_id);
        history.sort_by_key(|message| message.created_at);

        for message in history.into_iter().chain(pending) {
            if let Some(&position) = self.index.get(&message.id) {
                self.messages[position] = message;
            } else {
                self.push(message);
            }
        }
    }

    /// Appends an optimistic message at the end.
    pub fn insert_optimistic(&mut self, message: Message) {
        debug_assert!(message.is_temporary);
        self.push(message);
    }

    /// Swaps the temporary entry for its server copy, keeping its position.
    /// If the server copy already arrived through the socket, the temporary
    /// entry is dropped instead so the message is never listed twice.
    pub fn confirm(&mut self, temp_id: &str, confirmed: Message) -> bool {
        let Some(position) = self.index.remove(temp_id) else {
            return false;
        };

        if let Some(&existing) = self.index.get(&confirmed.id) {
            self.messages[existing] = confirmed;
            self.index.insert(temp_id.to_string(), position);
            self.remove_at(position);
        } else {
            self.index.insert(confirmed.id.clone(), position);
            self.messages[position] = confirmed;
        }
        true
    }

    /// Removes a temporary entry after its send failed.
    pub fn rollback(&mut self, temp_id: &str) -> Option<Message> {
        self.remove(temp_id)
    }

    /// Merges a pushed message. Messages for other conversations are ignored.
    pub fn apply_incoming(&mut self, message: Message) -> bool {
        if self.chat_id.as_deref() != Some(message.chat_id.as_str()) {
            return false;
        }
        if let Some(&position) = self.index.get(&message.id) {
            self.messages[position] = message;
            return true;
        }

        let position = self
            .messages
            .partition_point(|existing| existing.created_at <= message.created_at);
        if position == self.messages.len() {
            self.push(message);
        } else {
            self.messages.insert(position, message);
            self.reindex_from(position);
        }
        true
    }

    /// Replaces an existing message; unknown ids are ignored.
    pub fn apply_update(&mut self, message: Message) -> bool {
        if self.chat_id.as_deref() != Some(message.chat_id.as_str()) {
            return false;
        }
        match self.index.get(&message.id) {
            Some(&position) => {
                self.messages[position] = message;
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, id: &str) -> Option<Message> {
        let position = *self.index.get(id)?;
        Some(self.remove_at(position))
    }

    fn push(&mut self, message: Message) {
        self.index.insert(message.id.clone(), self.messages.len());
        self.messages.push(message);
    }

    fn remove_at(&mut self, position: usize) -> Message {
        let removed = self.messages.remove(position);
        self.index.retain(|_, index| *index != position);
        self.reindex_from(position);
        removed
    }

    fn reindex_from(&mut self, start: usize) {
        for (offset, message) in self.messages[start..].iter().enumerate() {
            self.index.insert(message.id.clone(), start + offset);
        }
    }
}
