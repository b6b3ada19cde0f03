use crate::error::RepoResult;
use crate::models::{NewUser, User};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

const USER_COLUMNS: &str = "id, email, name, phone, password_hash, oauth_provider, oauth_subject, \
                            is_admin, referral_code, referred_by, created_at";

/// Repository for user data access
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a new user inside a caller-owned transaction
    pub async fn create_in(&self, conn: &mut PgConnection, user: &NewUser) -> RepoResult<User> {
        let sql = format!(
            r#"
            INSERT INTO users
                (email, name, phone, password_hash, oauth_provider, oauth_subject, referral_code, referred_by)
            VALUES (LOWER($1), $2, $3, $4, $5, $6, $7, $8)
            RETURNING {USER_COLUMNS}
            "#
        );
        let created = sqlx::query_as::<_, User>(&sql)
            .bind(&user.email)
            .bind(&user.name)
            .bind(&user.phone)
            .bind(&user.password_hash)
            .bind(&user.oauth_provider)
            .bind(&user.oauth_subject)
            .bind(&user.referral_code)
            .bind(user.referred_by)
            .fetch_one(&mut *conn)
            .await?;
        Ok(created)
    }

    pub async fn find_by_id(&self, id: Uuid) -> RepoResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    /// Emails are stored lower-cased, so lookups are case-insensitive
    pub async fn find_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = LOWER($1)");
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(email.trim())
            .fetch_optional(&self.pool)
            .await?)
    }

    pub async fn find_by_oauth(&self, provider: &str, subject: &str) -> RepoResult<Option<User>> {
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users WHERE oauth_provider = $1 AND oauth_subject = $2"
        );
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(provider)
            .bind(subject)
            .fetch_optional(&self.pool)
            .await?)
    }

    pub async fn find_by_referral_code(&self, code: &str) -> RepoResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE referral_code = UPPER($1)");
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(code.trim())
            .fetch_optional(&self.pool)
            .await?)
    }

    /// Attach an OAuth identity to an existing (password) account
    pub async fn link_oauth(&self, user_id: Uuid, provider: &str, subject: &str) -> RepoResult<User> {
        let sql = format!(
            r#"
            UPDATE users SET oauth_provider = $2, oauth_subject = $3
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        );
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(user_id)
            .bind(provider)
            .bind(subject)
            .fetch_one(&self.pool)
            .await?)
    }

    pub async fn set_admin(&self, user_id: Uuid, is_admin: bool) -> RepoResult<bool> {
        let rows = sqlx::query("UPDATE users SET is_admin = $2 WHERE id = $1")
            .bind(user_id)
            .bind(is_admin)
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(rows > 0)
    }
}
