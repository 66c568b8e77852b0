use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::ChatId;

/// Handle to a message the wallet posted or reacted to; enough to edit or
/// delete it later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRef {
    pub chat_id: ChatId,
    pub message_id: i64,
}

/// A chat-platform user as seen in group events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatUser {
    pub id: i64,
    pub username: Option<String>,
    pub first_name: String,
}

impl ChatUser {
    /// Display handle: `@username` when available, first name otherwise.
    pub fn display_name(&self) -> String {
        match &self.username {
            Some(name) => format!("@{}", name),
            None => self.first_name.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChatError(pub String);

impl fmt::Display for ChatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "chat adapter error: {}", self.0)
    }
}

impl std::error::Error for ChatError {}

/// The chat platform the wallet talks through. Bodies are HTML; inline
/// keyboards and callback payloads are the adapter's concern.
#[async_trait]
pub trait ChatAdapter: Send + Sync {
    /// `reply_to` threads the message under an earlier one when set.
    async fn send_message(
        &self,
        chat: ChatId,
        html: &str,
        reply_to: Option<i64>,
    ) -> Result<MessageRef, ChatError>;

    async fn send_photo(&self, chat: ChatId, photo_path: &str, caption: &str)
        -> Result<MessageRef, ChatError>;

    async fn edit_message(&self, msg: &MessageRef, html: &str) -> Result<(), ChatError>;

    async fn delete_message(&self, msg: &MessageRef) -> Result<(), ChatError>;

    async fn answer_callback(&self, callback_id: &str, text: &str) -> Result<(), ChatError>;

    /// Removes a member and bans re-entry until the given unix timestamp.
    async fn kick_member_until(&self, chat: ChatId, user: i64, until_unix: i64)
        -> Result<(), ChatError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_name_prefers_username() {
        let with = ChatUser {
            id: 1,
            username: Some("carol".to_string()),
            first_name: "Carol".to_string(),
        };
        let without = ChatUser {
            id: 2,
            username: None,
            first_name: "Dave".to_string(),
        };
        assert_eq!(with.display_name(), "@carol");
        assert_eq!(without.display_name(), "Dave");
    }
}
