use async_trait::async_trait;
use slog::Logger;

use core_types::{ChatAdapter, ChatError, ChatId, MessageRef};

/// Stand-in adapter for headless runs: delivers nothing, logs everything.
/// A deployment wires a real chat-platform adapter in its place.
pub struct LogOnlyChat {
    logger: Logger,
}

impl LogOnlyChat {
    pub fn new(logger: Logger) -> Self {
        Self { logger }
    }
}

#[async_trait]
impl ChatAdapter for LogOnlyChat {
    async fn send_message(
        &self,
        chat: ChatId,
        html: &str,
        _reply_to: Option<i64>,
    ) -> Result<MessageRef, ChatError> {
        slog::info!(self.logger, "chat message"; "chat" => chat, "body" => html);
        Ok(MessageRef {
            chat_id: chat,
            message_id: 0,
        })
    }

    async fn send_photo(
        &self,
        chat: ChatId,
        photo_path: &str,
        caption: &str,
    ) -> Result<MessageRef, ChatError> {
        slog::info!(self.logger, "chat photo"; "chat" => chat, "path" => photo_path, "caption" => caption);
        Ok(MessageRef {
            chat_id: chat,
            message_id: 0,
        })
    }

    async fn edit_message(&self, msg: &MessageRef, html: &str) -> Result<(), ChatError> {
        slog::info!(self.logger, "chat edit"; "chat" => msg.chat_id, "message" => msg.message_id, "body" => html);
        Ok(())
    }

    async fn delete_message(&self, msg: &MessageRef) -> Result<(), ChatError> {
        slog::info!(self.logger, "chat delete"; "chat" => msg.chat_id, "message" => msg.message_id);
        Ok(())
    }

    async fn answer_callback(&self, callback_id: &str, text: &str) -> Result<(), ChatError> {
        slog::info!(self.logger, "chat callback"; "id" => callback_id, "text" => text);
        Ok(())
    }

    async fn kick_member_until(
        &self,
        chat: ChatId,
        user: i64,
        until_unix: i64,
    ) -> Result<(), ChatError> {
        slog::info!(self.logger, "chat kick"; "chat" => chat, "user" => user, "until" => until_unix);
        Ok(())
    }
}
