use crate::error::RepoResult;
use crate::models::Society;
use sqlx::PgPool;
use uuid::Uuid;

const SOCIETY_COLUMNS: &str = "s.id, s.name, s.description, s.location, s.join_code, s.created_by, \
                               s.member_count, s.book_count, s.created_at";

/// Repository for society data access
pub struct SocietyRepository {
    pool: PgPool,
}

impl SocietyRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a society and enrol its creator as the first active member
    pub async fn create_with_creator(
        &self,
        name: &str,
        description: Option<&str>,
        location: Option<&str>,
        join_code: &str,
        created_by: Uuid,
    ) -> RepoResult<Society> {
        let mut tx = self.pool.begin().await?;

        let sql = format!(
            r#"
            INSERT INTO societies AS s (name, description, location, join_code, created_by, member_count)
            VALUES ($1, $2, $3, $4, $5, 1)
            RETURNING {SOCIETY_COLUMNS}
            "#
        );
        let society = sqlx::query_as::<_, Society>(&sql)
            .bind(name)
            .bind(description)
            .bind(location)
            .bind(join_code)
            .bind(created_by)
            .fetch_one(&mut *tx)
            .await?;

        sqlx::query(
            r#"
            INSERT INTO society_members (society_id, user_id, is_active)
            VALUES ($1, $2, TRUE)
            "#,
        )
        .bind(society.id)
        .bind(created_by)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(society)
    }

    pub async fn find_by_id(&self, id: Uuid) -> RepoResult<Option<Society>> {
        let sql = format!("SELECT {SOCIETY_COLUMNS} FROM societies s WHERE s.id = $1");
        Ok(sqlx::query_as::<_, Society>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    pub async fn find_by_join_code(&self, code: &str) -> RepoResult<Option<Society>> {
        let sql = format!("SELECT {SOCIETY_COLUMNS} FROM societies s WHERE s.join_code = $1");
        Ok(sqlx::query_as::<_, Society>(&sql)
            .bind(code)
            .fetch_optional(&self.pool)
            .await?)
    }

    /// Societies the user is an active member of, newest membership first
    pub async fn list_for_user(&self, user_id: Uuid) -> RepoResult<Vec<Society>> {
        let sql = format!(
            r#"
            SELECT {SOCIETY_COLUMNS}
            FROM societies s
            JOIN society_members m ON m.society_id = s.id
            WHERE m.user_id = $1 AND m.is_active
            ORDER BY m.joined_at DESC
            "#
        );
        Ok(sqlx::query_as::<_, Society>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?)
    }

    pub async fn join_code_exists(&self, code: &str) -> RepoResult<bool> {
        let row: Option<(i32,)> = sqlx::query_as("SELECT 1 FROM societies WHERE join_code = $1")
            .bind(code)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }
}
