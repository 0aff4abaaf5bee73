//! Append-only conversation store.
//!
//! Holds the displayed message log and derives the subset forwarded as
//! conversation history on the next chat request. The injected persona
//! system message is never part of that history; it is added fresh by the
//! chat proxy on every request.

use crate::message::{Message, Role};

/// Ordered, append-only log of displayed messages.
#[derive(Debug, Default, Clone)]
pub struct ConversationStore {
    messages: Vec<Message>,
}

impl ConversationStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message. Messages are never reordered or removed.
    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// The full display log, in insertion order.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// The conversation history forwarded to the chat proxy: the ordered
    /// user/assistant subset, recomputed on each call.
    pub fn history(&self) -> Vec<Message> {
        self.messages
            .iter()
            .filter(|m| matches!(m.role, Role::User | Role::Assistant))
            .cloned()
            .collect()
    }

    /// Number of displayed messages.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether the log is empty.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;

    #[test]
    fn push_preserves_insertion_order() {
        let mut store = ConversationStore::new();
        store.push(Message::user("first"));
        store.push(Message::assistant("second"));
        store.push(Message::user("third"));

        let contents: Vec<&str> = store
            .messages()
            .iter()
            .map(|m| m.content.as_str())
            .collect();
        assert_eq!(contents, ["first", "second", "third"]);
    }

    #[test]
    fn history_excludes_system_messages() {
        let mut store = ConversationStore::new();
        store.push(Message::system("persona"));
        store.push(Message::user("hi"));
        store.push(Message::assistant("Hey. Ready when you are."));

        let history = store.history();
        assert_eq!(history.len(), 2);
        assert!(history.iter().all(|m| m.role != Role::System));
    }

    #[test]
    fn history_is_recomputed_per_call() {
        let mut store = ConversationStore::new();
        store.push(Message::user("hi"));
        assert_eq!(store.history().len(), 1);

        store.push(Message::assistant("hello"));
        assert_eq!(store.history().len(), 2);
    }

    #[test]
    fn empty_store() {
        let store = ConversationStore::new();
        assert!(store.is_empty());
        assert_eq!(store.len(), 0);
        assert!(store.history().is_empty());
    }
}
