//! Append-only conversation log.
//!
//! Owned exclusively by a session's dispatch loop. Workers never touch the
//! log — they receive an immutable snapshot at submission time and hand new
//! messages back for the dispatch loop to append.
//!
//! The log is seeded with one system message (model instructions, never
//! shown to the user) and one assistant greeting (shown to the user, never
//! sent to the model). Those are the only two entries where the display
//! transcript and the model input diverge.

use crate::message::{Message, Role};

pub struct ConversationLog {
    entries: Vec<Message>,
    /// Index of the UI-only greeting entry.
    greeting_idx: usize,
}

impl ConversationLog {
    /// Seed a new log with the system prompt and the UI-only greeting.
    pub fn seeded(system_prompt: impl Into<String>, greeting: impl Into<String>) -> Self {
        let entries = vec![Message::system(system_prompt), Message::assistant(greeting)];
        Self {
            entries,
            greeting_idx: 1,
        }
    }

    /// Append one message. Entries are never removed or reordered.
    pub fn append(&mut self, message: Message) {
        self.entries.push(message);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Copy-on-submit snapshot of the model-visible log. The greeting is
    /// excluded; everything else is included in order. A worker holding
    /// this snapshot cannot observe later appends.
    pub fn model_input(&self) -> Vec<Message> {
        self.entries
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != self.greeting_idx)
            .map(|(_, m)| m.clone())
            .collect()
    }

    /// Full display transcript, greeting included, system prompt excluded.
    pub fn transcript(&self) -> Vec<Message> {
        self.entries
            .iter()
            .filter(|m| m.role != Role::System)
            .cloned()
            .collect()
    }
}
