use crate::error::{RepoResult, RepositoryError};
use crate::models::{ExtensionRequest, ExtensionStatus};
use crate::pricing::ExtensionQuote;
use chrono::NaiveDate;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

const EXTENSION_COLUMNS: &str = "e.id, e.rental_id, e.requested_by, e.current_due_date, e.new_due_date, \
                                 e.extra_days, e.extension_fee, e.platform_fee, e.lender_amount, \
                                 e.reason, e.status, e.created_at, e.decided_at";

/// Repository for rental extension requests
pub struct ExtensionRepository {
    pool: PgPool,
}

impl ExtensionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a pending request. A second pending request for the same rental
    /// hits the partial unique index and surfaces as `Duplicate`.
    pub async fn create(
        &self,
        rental_id: Uuid,
        requested_by: Uuid,
        current_due_date: NaiveDate,
        new_due_date: NaiveDate,
        quote: &ExtensionQuote,
        reason: Option<&str>,
    ) -> RepoResult<ExtensionRequest> {
        let extra_days = i32::try_from(quote.extra_days)
            .map_err(|_| RepositoryError::InvalidInput("Extension is too long".to_string()))?;

        let sql = format!(
            r#"
            INSERT INTO rental_extensions AS e
                (rental_id, requested_by, current_due_date, new_due_date, extra_days,
                 extension_fee, platform_fee, lender_amount, reason, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, 'pending')
            RETURNING {EXTENSION_COLUMNS}
            "#
        );
        sqlx::query_as::<_, ExtensionRequest>(&sql)
            .bind(rental_id)
            .bind(requested_by)
            .bind(current_due_date)
            .bind(new_due_date)
            .bind(extra_days)
            .bind(quote.extension_fee)
            .bind(quote.platform_fee)
            .bind(quote.lender_amount)
            .bind(reason)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| match RepositoryError::from(e) {
                RepositoryError::Duplicate(_) => RepositoryError::Duplicate(
                    "An extension request is already pending for this rental".to_string(),
                ),
                other => other,
            })
    }

    pub async fn find_by_id(&self, id: Uuid) -> RepoResult<Option<ExtensionRequest>> {
        let sql = format!("SELECT {EXTENSION_COLUMNS} FROM rental_extensions e WHERE e.id = $1");
        Ok(sqlx::query_as::<_, ExtensionRequest>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    pub async fn list_for_rental(&self, rental_id: Uuid) -> RepoResult<Vec<ExtensionRequest>> {
        let sql = format!(
            "SELECT {EXTENSION_COLUMNS} FROM rental_extensions e \
             WHERE e.rental_id = $1 ORDER BY e.created_at DESC"
        );
        Ok(sqlx::query_as::<_, ExtensionRequest>(&sql)
            .bind(rental_id)
            .fetch_all(&self.pool)
            .await?)
    }

    /// Pending requests on rentals where `lender_id` is the lender
    pub async fn pending_for_lender(&self, lender_id: Uuid) -> RepoResult<Vec<ExtensionRequest>> {
        let sql = format!(
            r#"
            SELECT {EXTENSION_COLUMNS}
            FROM rental_extensions e
            JOIN book_rentals r ON r.id = e.rental_id
            WHERE r.lender_id = $1 AND e.status = 'pending'
            ORDER BY e.created_at ASC
            "#
        );
        Ok(sqlx::query_as::<_, ExtensionRequest>(&sql)
            .bind(lender_id)
            .fetch_all(&self.pool)
            .await?)
    }

    /// Settle a pending request. Fails with `StaleState` if it was already decided.
    pub async fn decide_in(
        &self,
        conn: &mut PgConnection,
        id: Uuid,
        decision: ExtensionStatus,
    ) -> RepoResult<ExtensionRequest> {
        if decision == ExtensionStatus::Pending {
            return Err(RepositoryError::InvalidInput(
                "An extension can only be approved or declined".to_string(),
            ));
        }

        let sql = format!(
            r#"
            UPDATE rental_extensions AS e
            SET status = $2, decided_at = (NOW() AT TIME ZONE 'utc')
            WHERE e.id = $1 AND e.status = 'pending'
            RETURNING {EXTENSION_COLUMNS}
            "#
        );
        sqlx::query_as::<_, ExtensionRequest>(&sql)
            .bind(id)
            .bind(decision.as_str())
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| {
                RepositoryError::StaleState("Extension request was already decided".to_string())
            })
    }

    pub async fn decide(&self, id: Uuid, decision: ExtensionStatus) -> RepoResult<ExtensionRequest> {
        let mut tx = self.pool.begin().await?;
        let request = self.decide_in(&mut tx, id, decision).await?;
        tx.commit().await?;
        Ok(request)
    }
}
