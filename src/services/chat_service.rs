use crate::error::{AppError, AppResult};
use crate::models::message::validate_content;
use crate::models::{ConversationSummary, Message};
use crate::repositories::{MessageRepository, SocietyMemberRepository, UserRepository};
use crate::websocket::{ServerMessage, WebSocketServer};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 200;

/// Service for direct messages and society chat
pub struct ChatService {
    message_repo: Arc<MessageRepository>,
    user_repo: Arc<UserRepository>,
    member_repo: Arc<SocietyMemberRepository>,
    ws_server: Arc<WebSocketServer>,
}

impl ChatService {
    pub fn new(
        message_repo: Arc<MessageRepository>,
        user_repo: Arc<UserRepository>,
        member_repo: Arc<SocietyMemberRepository>,
        ws_server: Arc<WebSocketServer>,
    ) -> Self {
        Self {
            message_repo,
            user_repo,
            member_repo,
            ws_server,
        }
    }

    /// Send a direct message and push it to the recipient's live connections
    pub async fn send(
        &self,
        sender_id: Uuid,
        recipient_id: Uuid,
        content: &str,
        society_id: Option<Uuid>,
    ) -> AppResult<Message> {
        let content = validate_content(content).map_err(AppError::Validation)?;
        if sender_id == recipient_id {
            return Err(AppError::Validation("You cannot message yourself".to_string()));
        }
        if self.user_repo.find_by_id(recipient_id).await?.is_none() {
            return Err(AppError::NotFound(format!("User {} not found", recipient_id)));
        }
        if let Some(society_id) = society_id {
            let both_members = self.member_repo.is_active_member(society_id, sender_id).await?
                && self.member_repo.is_active_member(society_id, recipient_id).await?;
            if !both_members {
                return Err(AppError::Forbidden(
                    "Both users must be members of the society".to_string(),
                ));
            }
        }

        let message = self
            .message_repo
            .create(sender_id, Some(recipient_id), society_id, &content)
            .await?;
        debug!("Message {} from {} to {}", message.id, sender_id, recipient_id);

        self.ws_server
            .send_to_user(recipient_id, ServerMessage::NewMessage { message: message.clone() })
            .await;
        Ok(message)
    }

    /// Persist a society chat line and build the frame relayed to the society
    pub async fn post_society_message(&self, sender_id: Uuid, society_id: Uuid, content: &str) -> AppResult<ServerMessage> {
        let content = validate_content(content).map_err(AppError::Validation)?;
        if !self.member_repo.is_active_member(society_id, sender_id).await? {
            return Err(AppError::Forbidden("You are not a member of this society".to_string()));
        }
        let sender = self
            .user_repo
            .find_by_id(sender_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", sender_id)))?;

        let message = self
            .message_repo
            .create(sender_id, None, Some(society_id), &content)
            .await?;
        info!("Society {} chat line {} from {}", society_id, message.id, sender_id);

        Ok(ServerMessage::Chat {
            society_id,
            message_id: message.id,
            sender_id,
            sender_name: sender.name,
            content: message.content,
            sent_at: message.created_at,
        })
    }

    pub async fn conversation(&self, user_id: Uuid, other_id: Uuid, limit: Option<i64>) -> AppResult<Vec<Message>> {
        Ok(self
            .message_repo
            .conversation(user_id, other_id, clamp_limit(limit))
            .await?)
    }

    pub async fn conversations(&self, user_id: Uuid) -> AppResult<Vec<ConversationSummary>> {
        Ok(self.message_repo.conversations(user_id).await?)
    }

    /// Society chat history. Members only.
    pub async fn society_messages(&self, user_id: Uuid, society_id: Uuid, limit: Option<i64>) -> AppResult<Vec<Message>> {
        if !self.member_repo.is_active_member(society_id, user_id).await? {
            return Err(AppError::Forbidden("You are not a member of this society".to_string()));
        }
        Ok(self
            .message_repo
            .society_messages(society_id, clamp_limit(limit))
            .await?)
    }

    pub async fn mark_read(&self, user_id: Uuid, other_id: Uuid) -> AppResult<u64> {
        Ok(self.message_repo.mark_read(user_id, other_id).await?)
    }

    pub async fn unread_count(&self, user_id: Uuid) -> AppResult<i64> {
        Ok(self.message_repo.unread_count(user_id).await?)
    }
}

fn clamp_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_limit() {
        assert_eq!(clamp_limit(None), DEFAULT_LIMIT);
        assert_eq!(clamp_limit(Some(0)), 1);
        assert_eq!(clamp_limit(Some(10_000)), MAX_LIMIT);
        assert_eq!(clamp_limit(Some(20)), 20);
    }
}
