//! Keyed registry of conversations.

use super::history::Conversation;
use crate::message::{Message, Role};
use dashmap::DashMap;
use dashmap::mapref::one::RefMut;
use std::num::NonZeroUsize;
use std::sync::Arc;
use tracing::debug;

/// Platform-assigned user identifier.
pub type UserId = u64;

/// Owns every user's [`Conversation`].
///
/// All access goes through keyed accessors. Each accessor locks only the
/// shard holding its key and releases it before returning, so it is safe to
/// call from many tasks at once and never blocks across an `.await`.
pub struct ConversationManager {
    conversations: DashMap<UserId, Conversation>,
    max_messages: NonZeroUsize,
    system_prompt: Arc<str>,
}

impl std::fmt::Debug for ConversationManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversationManager")
            .field("conversations", &self.conversations.len())
            .field("max_messages", &self.max_messages)
            .finish_non_exhaustive()
    }
}

impl ConversationManager {
    /// Create a manager whose conversations hold at most `max_messages`
    /// messages and start from `system_prompt`.
    pub fn new(max_messages: NonZeroUsize, system_prompt: impl Into<Arc<str>>) -> Self {
        Self {
            conversations: DashMap::new(),
            max_messages,
            system_prompt: system_prompt.into(),
        }
    }

    /// Get the conversation for `user_id`, creating it if absent.
    ///
    /// The returned guard holds the shard lock; drop it before awaiting.
    pub fn get_or_create(&self, user_id: UserId) -> RefMut<'_, UserId, Conversation> {
        self.conversations.entry(user_id).or_insert_with(|| {
            debug!(user_id, "created conversation");
            Conversation::new(Arc::clone(&self.system_prompt), self.max_messages)
        })
    }

    /// Run `f` against the user's conversation under its lock.
    pub fn with_conversation<R>(&self, user_id: UserId, f: impl FnOnce(&mut Conversation) -> R) -> R {
        let mut conversation = self.get_or_create(user_id);
        f(&mut conversation)
    }

    /// Append a message to the user's conversation.
    pub fn add_message(&self, user_id: UserId, role: Role, content: impl Into<String>) {
        self.get_or_create(user_id).add_message(role, content);
    }

    /// Render the user's conversation into a request payload.
    #[must_use]
    pub fn render(&self, user_id: UserId) -> Vec<Message> {
        self.get_or_create(user_id).render()
    }

    /// Clear the user's history, keeping the system prompt.
    pub fn reset(&self, user_id: UserId) {
        self.get_or_create(user_id).reset();
    }

    /// Number of messages held for the user; 0 for unknown users.
    ///
    /// Never creates state.
    #[must_use]
    pub fn size(&self, user_id: UserId) -> usize {
        self.conversations
            .get(&user_id)
            .map_or(0, |conversation| conversation.size())
    }

    /// Whether a conversation exists for the user.
    #[must_use]
    pub fn contains(&self, user_id: UserId) -> bool {
        self.conversations.contains_key(&user_id)
    }

    /// Number of tracked users.
    #[must_use]
    pub fn len(&self) -> usize {
        self.conversations.len()
    }

    /// Whether no user has a conversation yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.conversations.is_empty()
    }

    /// The per-conversation history cap.
    #[must_use]
    pub const fn max_messages(&self) -> NonZeroUsize {
        self.max_messages
    }

    /// The system prompt given to new conversations.
    #[must_use]
    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager(cap: usize) -> ConversationManager {
        ConversationManager::new(NonZeroUsize::new(cap).unwrap(), "system prompt")
    }

    #[test]
    fn test_get_or_create_is_idempotent() {
        let manager = manager(4);
        manager.get_or_create(7).add_message(Role::User, "hello");

        let conversation = manager.get_or_create(7);
        assert_eq!(conversation.size(), 1);
        drop(conversation);
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn test_users_are_isolated() {
        let manager = manager(4);
        manager.add_message(1, Role::User, "from a");
        let before_render = manager.render(2);
        let before_size = manager.size(2);

        manager.add_message(1, Role::Assistant, "to a");
        manager.add_message(1, Role::User, "again a");

        assert_eq!(manager.render(2), before_render);
        assert_eq!(manager.size(2), before_size);
        assert_eq!(manager.size(1), 3);
    }

    #[test]
    fn test_size_of_unknown_user_creates_nothing() {
        let manager = manager(4);
        assert_eq!(manager.size(99), 0);
        assert!(!manager.contains(99));
        assert!(manager.is_empty());

        assert_eq!(manager.render(99), vec![Message::system("system prompt")]);
        assert!(manager.contains(99));
    }

    #[test]
    fn test_reset_keeps_system_prompt() {
        let manager = manager(4);
        manager.add_message(5, Role::User, "hi");
        manager.reset(5);
        manager.reset(5);

        assert_eq!(manager.size(5), 0);
        assert_eq!(manager.render(5), vec![Message::system("system prompt")]);
    }

    #[test]
    fn test_exchange_scenario_at_cap() {
        let manager = manager(4);
        let user = 42;

        manager.add_message(user, Role::User, "hi");
        manager.add_message(user, Role::Assistant, "hello");
        manager.add_message(user, Role::User, "how are you");
        manager.add_message(user, Role::Assistant, "good");

        assert_eq!(
            manager.render(user),
            vec![
                Message::system("system prompt"),
                Message::user("hi"),
                Message::assistant("hello"),
                Message::user("how are you"),
                Message::assistant("good"),
            ]
        );

        manager.add_message(user, Role::User, "tell me a joke");
        assert_eq!(manager.size(user), 4);
        assert_eq!(manager.render(user)[1], Message::assistant("hello"));

        manager.add_message(user, Role::Assistant, "no");
        assert_eq!(
            manager.render(user)[1..],
            [
                Message::user("how are you"),
                Message::assistant("good"),
                Message::user("tell me a joke"),
                Message::assistant("no"),
            ]
        );
    }

    #[test]
    fn test_with_conversation_sees_mutations() {
        let manager = manager(2);
        manager.with_conversation(3, |c| c.add_message(Role::User, "x"));
        let size = manager.with_conversation(3, |c| c.size());
        assert_eq!(size, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_users_do_not_interfere() {
        let manager = Arc::new(manager(50));
        let mut handles = Vec::new();

        for user in 0..16_u64 {
            let manager = Arc::clone(&manager);
            handles.push(tokio::spawn(async move {
                for i in 0..40 {
                    manager.add_message(user, Role::User, format!("{user}:{i}"));
                    tokio::task::yield_now().await;
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(manager.len(), 16);
        for user in 0..16_u64 {
            let rendered = manager.render(user);
            let expected: Vec<Message> = (0..40)
                .map(|i| Message::user(format!("{user}:{i}")))
                .collect();
            assert_eq!(rendered[1..], expected[..]);
        }
    }
}
