//! A single user's bounded conversation history.

use crate::message::{Message, Role};
use std::collections::VecDeque;
use std::num::NonZeroUsize;
use std::sync::Arc;

/// Bounded, ordered message history with a fixed system prompt.
#[derive(Debug, Clone)]
pub struct Conversation {
    system_prompt: Arc<str>,
    max_messages: NonZeroUsize,
    history: VecDeque<Message>,
}

impl Conversation {
    /// Create an empty conversation.
    pub fn new(system_prompt: impl Into<Arc<str>>, max_messages: NonZeroUsize) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            max_messages,
            history: VecDeque::with_capacity(max_messages.get().min(64)),
        }
    }

    /// Append a message, evicting the single oldest entry when at capacity.
    ///
    /// The role is not checked here; callers pass [`Role::User`] or
    /// [`Role::Assistant`]. A [`Role::System`] entry is stored like any other
    /// turn and counts against the cap.
    pub fn add_message(&mut self, role: Role, content: impl Into<String>) {
        if self.history.len() >= self.max_messages.get() {
            self.history.pop_front();
        }
        self.history.push_back(Message::new(role, content));
    }

    /// Render the request payload: the system prompt followed by the history,
    /// oldest first.
    #[must_use]
    pub fn render(&self) -> Vec<Message> {
        let mut messages = Vec::with_capacity(self.history.len() + 1);
        messages.push(Message::system(&*self.system_prompt));
        messages.extend(self.history.iter().cloned());
        messages
    }

    /// Drop all history. The system prompt stays.
    pub fn reset(&mut self) {
        self.history.clear();
    }

    /// Number of non-system messages held.
    #[must_use]
    pub fn size(&self) -> usize {
        self.history.len()
    }

    /// Whether the history is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    /// The system prompt this conversation was created with.
    #[must_use]
    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// The history cap.
    #[must_use]
    pub const fn max_messages(&self) -> NonZeroUsize {
        self.max_messages
    }

    /// Iterate over the stored history, oldest first.
    pub fn messages(&self) -> impl ExactSizeIterator<Item = &Message> {
        self.history.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cap(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).unwrap()
    }

    fn contents(conversation: &Conversation) -> Vec<&str> {
        conversation.messages().map(Message::content).collect()
    }

    #[test]
    fn test_size_tracks_min_of_calls_and_cap() {
        let mut conversation = Conversation::new("sys", cap(3));
        for calls in 1..=7 {
            conversation.add_message(Role::User, format!("m{calls}"));
            assert_eq!(conversation.size(), calls.min(3));
        }
    }

    #[test]
    fn test_fifo_eviction_keeps_order() {
        let mut conversation = Conversation::new("sys", cap(4));
        for i in 1..=5 {
            conversation.add_message(Role::User, format!("m{i}"));
        }

        assert_eq!(contents(&conversation), ["m2", "m3", "m4", "m5"]);
    }

    #[test]
    fn test_cap_of_one() {
        let mut conversation = Conversation::new("sys", cap(1));
        conversation.add_message(Role::User, "first");
        conversation.add_message(Role::Assistant, "second");

        let rendered = conversation.render();
        assert_eq!(rendered.len(), 2);
        assert_eq!(rendered[1], Message::assistant("second"));
    }

    #[test]
    fn test_render_starts_with_single_system_entry() {
        let mut conversation = Conversation::new("be nice", cap(2));
        assert_eq!(conversation.render(), vec![Message::system("be nice")]);

        conversation.add_message(Role::User, "a");
        conversation.add_message(Role::Assistant, "b");
        conversation.add_message(Role::User, "c");
        conversation.reset();
        conversation.add_message(Role::User, "d");

        let rendered = conversation.render();
        assert_eq!(rendered[0], Message::system("be nice"));
        assert_eq!(
            rendered.iter().filter(|m| m.role() == Role::System).count(),
            1
        );
        assert_eq!(rendered[1], Message::user("d"));
    }

    #[test]
    fn test_render_does_not_mutate() {
        let mut conversation = Conversation::new("sys", cap(2));
        conversation.add_message(Role::User, "hi");

        let first = conversation.render();
        let second = conversation.render();
        assert_eq!(first, second);
        assert_eq!(conversation.size(), 1);
    }

    #[test]
    fn test_reset_is_idempotent() {
        let mut conversation = Conversation::new("sys", cap(2));
        conversation.reset();
        assert_eq!(conversation.size(), 0);
        assert_eq!(conversation.render(), vec![Message::system("sys")]);

        conversation.add_message(Role::User, "hi");
        conversation.reset();
        conversation.reset();
        assert!(conversation.is_empty());
        assert_eq!(conversation.system_prompt(), "sys");
    }
}
