use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

pub const MAX_MESSAGE_LEN: usize = 2000;

/// Chat row. Direct messages have a recipient; society chat lines have only a society.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Message {
    pub id: Uuid,
    pub sender_id: Uuid,
    pub recipient_id: Option<Uuid>,
    pub society_id: Option<Uuid>,
    pub content: String,
    pub is_read: bool,
    pub created_at: NaiveDateTime,
}

/// Latest message with one counterpart, for the inbox view
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ConversationSummary {
    pub other_user_id: Uuid,
    pub other_user_name: String,
    pub last_message: String,
    pub last_message_at: NaiveDateTime,
    pub unread_count: i64,
}

/// Trim and bound message content
pub fn validate_content(content: &str) -> Result<String, String> {
    let content = content.trim();
    if content.is_empty() {
        return Err("Message cannot be empty".to_string());
    }
    if content.chars().count() > MAX_MESSAGE_LEN {
        return Err(format!("Message exceeds {} characters", MAX_MESSAGE_LEN));
    }
    Ok(content.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_content() {
        assert_eq!(validate_content("  hi there ").unwrap(), "hi there");
        assert!(validate_content("   ").is_err());
        assert!(validate_content(&"a".repeat(MAX_MESSAGE_LEN + 1)).is_err());
        assert!(validate_content(&"é".repeat(MAX_MESSAGE_LEN)).is_ok());
    }
}
