use crate::error::RepoResult;
use crate::models::{ConversationSummary, Message};
use sqlx::PgPool;
use uuid::Uuid;

const MESSAGE_COLUMNS: &str = "id, sender_id, recipient_id, society_id, content, is_read, created_at";

/// Repository for direct messages and society chat lines
pub struct MessageRepository {
    pool: PgPool,
}

impl MessageRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Store a message. `recipient_id = None` makes it a society chat line.
    pub async fn create(
        &self,
        sender_id: Uuid,
        recipient_id: Option<Uuid>,
        society_id: Option<Uuid>,
        content: &str,
    ) -> RepoResult<Message> {
        let sql = format!(
            r#"
            INSERT INTO messages (sender_id, recipient_id, society_id, content)
            VALUES ($1, $2, $3, $4)
            RETURNING {MESSAGE_COLUMNS}
            "#
        );
        Ok(sqlx::query_as::<_, Message>(&sql)
            .bind(sender_id)
            .bind(recipient_id)
            .bind(society_id)
            .bind(content)
            .fetch_one(&self.pool)
            .await?)
    }

    /// Direct messages between two users, oldest first, capped at the latest `limit`
    pub async fn conversation(&self, user_id: Uuid, other_id: Uuid, limit: i64) -> RepoResult<Vec<Message>> {
        let sql = format!(
            r#"
            SELECT * FROM (
                SELECT {MESSAGE_COLUMNS}
                FROM messages
                WHERE (sender_id = $1 AND recipient_id = $2)
                   OR (sender_id = $2 AND recipient_id = $1)
                ORDER BY created_at DESC
                LIMIT $3
            ) recent
            ORDER BY created_at ASC
            "#
        );
        Ok(sqlx::query_as::<_, Message>(&sql)
            .bind(user_id)
            .bind(other_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?)
    }

    /// Society chat history, oldest first
    pub async fn society_messages(&self, society_id: Uuid, limit: i64) -> RepoResult<Vec<Message>> {
        let sql = format!(
            r#"
            SELECT * FROM (
                SELECT {MESSAGE_COLUMNS}
                FROM messages
                WHERE society_id = $1 AND recipient_id IS NULL
                ORDER BY created_at DESC
                LIMIT $2
            ) recent
            ORDER BY created_at ASC
            "#
        );
        Ok(sqlx::query_as::<_, Message>(&sql)
            .bind(society_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?)
    }

    /// Latest direct message per counterpart with the unread count from that counterpart
    pub async fn conversations(&self, user_id: Uuid) -> RepoResult<Vec<ConversationSummary>> {
        Ok(sqlx::query_as::<_, ConversationSummary>(
            r#"
            WITH direct AS (
                SELECT CASE WHEN sender_id = $1 THEN recipient_id ELSE sender_id END AS other_user_id,
                       sender_id, content, is_read, created_at
                FROM messages
                WHERE recipient_id IS NOT NULL
                  AND (sender_id = $1 OR recipient_id = $1)
            ),
            latest AS (
                SELECT DISTINCT ON (other_user_id) other_user_id, content, created_at
                FROM direct
                ORDER BY other_user_id, created_at DESC
            ),
            unread AS (
                SELECT other_user_id, COUNT(*) AS unread_count
                FROM direct
                WHERE sender_id <> $1 AND is_read = FALSE
                GROUP BY other_user_id
            )
            SELECT l.other_user_id,
                   u.name AS other_user_name,
                   l.content AS last_message,
                   l.created_at AS last_message_at,
                   COALESCE(un.unread_count, 0) AS unread_count
            FROM latest l
            JOIN users u ON u.id = l.other_user_id
            LEFT JOIN unread un ON un.other_user_id = l.other_user_id
            ORDER BY l.created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?)
    }

    /// Mark everything `other_id` sent to `user_id` as read
    pub async fn mark_read(&self, user_id: Uuid, other_id: Uuid) -> RepoResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE messages SET is_read = TRUE
            WHERE recipient_id = $1 AND sender_id = $2 AND is_read = FALSE
            "#,
        )
        .bind(user_id)
        .bind(other_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn unread_count(&self, user_id: Uuid) -> RepoResult<i64> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM messages WHERE recipient_id = $1 AND is_read = FALSE",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }
}
