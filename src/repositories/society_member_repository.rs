use crate::error::RepoResult;
use crate::models::{MemberProfile, SocietyMember};
use sqlx::PgPool;
use uuid::Uuid;

/// Outcome of a join attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
    Joined,
    Rejoined,
    AlreadyMember,
}

/// Repository for society membership data access
pub struct SocietyMemberRepository {
    pool: PgPool,
}

impl SocietyMemberRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Add or re-activate a membership, keeping `member_count` in step
    pub async fn join(&self, society_id: Uuid, user_id: Uuid) -> RepoResult<JoinOutcome> {
        let mut tx = self.pool.begin().await?;

        let existing = sqlx::query_as::<_, SocietyMember>(
            r#"
            SELECT society_id, user_id, is_active, joined_at
            FROM society_members
            WHERE society_id = $1 AND user_id = $2
            FOR UPDATE
            "#,
        )
        .bind(society_id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?;

        let outcome = match existing {
            Some(member) if member.is_active => JoinOutcome::AlreadyMember,
            Some(_) => {
                sqlx::query(
                    r#"
                    UPDATE society_members
                    SET is_active = TRUE, joined_at = (NOW() AT TIME ZONE 'utc')
                    WHERE society_id = $1 AND user_id = $2
                    "#,
                )
                .bind(society_id)
                .bind(user_id)
                .execute(&mut *tx)
                .await?;
                JoinOutcome::Rejoined
            }
            None => {
                sqlx::query(
                    r#"
                    INSERT INTO society_members (society_id, user_id, is_active)
                    VALUES ($1, $2, TRUE)
                    "#,
                )
                .bind(society_id)
                .bind(user_id)
                .execute(&mut *tx)
                .await?;
                JoinOutcome::Joined
            }
        };

        if outcome != JoinOutcome::AlreadyMember {
            sqlx::query("UPDATE societies SET member_count = member_count + 1 WHERE id = $1")
                .bind(society_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(outcome)
    }

    /// Deactivate a membership. Returns false if the user was not an active member.
    pub async fn leave(&self, society_id: Uuid, user_id: Uuid) -> RepoResult<bool> {
        let mut tx = self.pool.begin().await?;

        let rows = sqlx::query(
            r#"
            UPDATE society_members
            SET is_active = FALSE
            WHERE society_id = $1 AND user_id = $2 AND is_active
            "#,
        )
        .bind(society_id)
        .bind(user_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if rows > 0 {
            sqlx::query(
                "UPDATE societies SET member_count = GREATEST(member_count - 1, 0) WHERE id = $1",
            )
            .bind(society_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(rows > 0)
    }

    pub async fn is_active_member(&self, society_id: Uuid, user_id: Uuid) -> RepoResult<bool> {
        let row: Option<(i32,)> = sqlx::query_as(
            r#"
            SELECT 1
            FROM society_members
            WHERE society_id = $1 AND user_id = $2 AND is_active
            "#,
        )
        .bind(society_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.is_some())
    }

    /// Active members with their display names, oldest first
    pub async fn find_by_society(&self, society_id: Uuid) -> RepoResult<Vec<MemberProfile>> {
        Ok(sqlx::query_as::<_, MemberProfile>(
            r#"
            SELECT m.user_id, u.name, u.email, m.joined_at
            FROM society_members m
            JOIN users u ON u.id = m.user_id
            WHERE m.society_id = $1 AND m.is_active
            ORDER BY m.joined_at ASC
            "#,
        )
        .bind(society_id)
        .fetch_all(&self.pool)
        .await?)
    }

    /// Society ids where the user is an active member
    pub async fn active_society_ids(&self, user_id: Uuid) -> RepoResult<Vec<Uuid>> {
        let rows: Vec<(Uuid,)> = sqlx::query_as(
            "SELECT society_id FROM society_members WHERE user_id = $1 AND is_active",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    /// Whether two users are active members of at least one common society
    pub async fn share_society(&self, user_a: Uuid, user_b: Uuid) -> RepoResult<bool> {
        let row: Option<(i32,)> = sqlx::query_as(
            r#"
            SELECT 1
            FROM society_members a
            JOIN society_members b ON a.society_id = b.society_id
            WHERE a.user_id = $1 AND b.user_id = $2 AND a.is_active AND b.is_active
            LIMIT 1
            "#,
        )
        .bind(user_a)
        .bind(user_b)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.is_some())
    }
}
