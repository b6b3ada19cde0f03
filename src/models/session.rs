use chrono::NaiveDateTime;
use sqlx::FromRow;
use uuid::Uuid;

/// Login session keyed by the SHA-256 digest of the bearer token
#[derive(Debug, Clone, FromRow)]
pub struct Session {
    pub token_hash: String,
    pub user_id: Uuid,
    pub expires_at: NaiveDateTime,
    pub created_at: NaiveDateTime,
}

impl Session {
    pub fn is_expired_at(&self, now: NaiveDateTime) -> bool {
        self.expires_at <= now
    }
}
