use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Residential community; the visibility boundary for listings and chat
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Society {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub join_code: String,
    pub created_by: Uuid,
    pub member_count: i32,
    pub book_count: i32,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SocietyMember {
    pub society_id: Uuid,
    pub user_id: Uuid,
    pub is_active: bool,
    pub joined_at: NaiveDateTime,
}

/// Member row joined with the user's display fields
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct MemberProfile {
    pub user_id: Uuid,
    pub name: String,
    pub email: String,
    pub joined_at: NaiveDateTime,
}

pub const JOIN_CODE_LEN: usize = 6;

/// Normalise a user-typed join code; `None` when it cannot be a valid code
pub fn normalize_join_code(code: &str) -> Option<String> {
    let code = code.trim().to_uppercase();
    if code.len() == JOIN_CODE_LEN && code.chars().all(|c| c.is_ascii_alphanumeric()) {
        Some(code)
    } else {
        None
    }
}

/// Derive a join code from a fresh UUID
pub fn generate_join_code() -> String {
    Uuid::new_v4()
        .simple()
        .to_string()
        .to_uppercase()
        .chars()
        .take(JOIN_CODE_LEN)
        .collect()
}
