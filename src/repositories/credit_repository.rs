//! Repository for the Brocks ledger

use crate::error::{RepoResult, RepositoryError};
use crate::models::{CreditKind, CreditTransaction, UserCredits};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

/// One balance movement; `amount` is always positive, direction comes from the call
#[derive(Debug, Clone, Copy)]
pub struct CreditEntry<'a> {
    pub kind: CreditKind,
    pub description: Option<&'a str>,
    pub reference_id: Option<Uuid>,
}

impl<'a> CreditEntry<'a> {
    pub fn new(kind: CreditKind) -> Self {
        Self {
            kind,
            description: None,
            reference_id: None,
        }
    }

    pub fn describe(mut self, description: &'a str) -> Self {
        self.description = Some(description);
        self
    }

    pub fn reference(mut self, reference_id: Uuid) -> Self {
        self.reference_id = Some(reference_id);
        self
    }
}

pub struct CreditRepository {
    pool: PgPool,
}

impl CreditRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // =========================================================================
    // Balances
    // =========================================================================

    /// Create a zero balance row if the user has none
    pub async fn ensure_account_in(&self, conn: &mut PgConnection, user_id: Uuid) -> RepoResult<()> {
        sqlx::query(
            r#"
            INSERT INTO user_credits (user_id, balance, lifetime_earned)
            VALUES ($1, 0, 0)
            ON CONFLICT (user_id) DO NOTHING
            "#,
        )
        .bind(user_id)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    /// Get a user's balance, creating an empty one on first access
    pub async fn get_or_create(&self, user_id: Uuid) -> RepoResult<UserCredits> {
        let existing = sqlx::query_as::<_, UserCredits>(
            "SELECT user_id, balance, lifetime_earned, updated_at FROM user_credits WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(credits) = existing {
            return Ok(credits);
        }

        Ok(sqlx::query_as::<_, UserCredits>(
            r#"
            INSERT INTO user_credits (user_id, balance, lifetime_earned)
            VALUES ($1, 0, 0)
            ON CONFLICT (user_id) DO UPDATE SET updated_at = user_credits.updated_at
            RETURNING user_id, balance, lifetime_earned, updated_at
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn lock_in(&self, conn: &mut PgConnection, user_id: Uuid) -> RepoResult<UserCredits> {
        self.ensure_account_in(&mut *conn, user_id).await?;
        Ok(sqlx::query_as::<_, UserCredits>(
            r#"
            SELECT user_id, balance, lifetime_earned, updated_at
            FROM user_credits
            WHERE user_id = $1
            FOR UPDATE
            "#,
        )
        .bind(user_id)
        .fetch_one(&mut *conn)
        .await?)
    }

    // =========================================================================
    // Movements
    // =========================================================================

    /// Add Brocks inside the caller's transaction
    pub async fn award_in(
        &self,
        conn: &mut PgConnection,
        user_id: Uuid,
        amount: i64,
        entry: CreditEntry<'_>,
    ) -> RepoResult<UserCredits> {
        if amount <= 0 {
            return Err(RepositoryError::InvalidInput(format!(
                "Award amount must be positive, got {}",
                amount
            )));
        }

        let current = self.lock_in(&mut *conn, user_id).await?;
        let balance_after = current
            .balance
            .checked_add(amount)
            .ok_or_else(|| RepositoryError::InvalidInput("Balance overflow".to_string()))?;

        let updated = sqlx::query_as::<_, UserCredits>(
            r#"
            UPDATE user_credits
            SET balance = $2,
                lifetime_earned = lifetime_earned + $3,
                updated_at = (NOW() AT TIME ZONE 'utc')
            WHERE user_id = $1
            RETURNING user_id, balance, lifetime_earned, updated_at
            "#,
        )
        .bind(user_id)
        .bind(balance_after)
        .bind(amount)
        .fetch_one(&mut *conn)
        .await?;

        self.record_in(&mut *conn, user_id, amount, balance_after, &entry).await?;
        Ok(updated)
    }

    /// Remove Brocks inside the caller's transaction. The balance never goes negative.
    pub async fn spend_in(
        &self,
        conn: &mut PgConnection,
        user_id: Uuid,
        amount: i64,
        entry: CreditEntry<'_>,
    ) -> RepoResult<UserCredits> {
        if amount <= 0 {
            return Err(RepositoryError::InvalidInput(format!(
                "Spend amount must be positive, got {}",
                amount
            )));
        }

        let current = self.lock_in(&mut *conn, user_id).await?;
        if current.balance < amount {
            return Err(RepositoryError::BusinessRule(format!(
                "Insufficient Brocks: available {}, required {}",
                current.balance, amount
            )));
        }
        let balance_after = current.balance - amount;

        let updated = sqlx::query_as::<_, UserCredits>(
            r#"
            UPDATE user_credits
            SET balance = $2, updated_at = (NOW() AT TIME ZONE 'utc')
            WHERE user_id = $1
            RETURNING user_id, balance, lifetime_earned, updated_at
            "#,
        )
        .bind(user_id)
        .bind(balance_after)
        .fetch_one(&mut *conn)
        .await?;

        self.record_in(&mut *conn, user_id, -amount, balance_after, &entry).await?;
        Ok(updated)
    }

    pub async fn award(&self, user_id: Uuid, amount: i64, entry: CreditEntry<'_>) -> RepoResult<UserCredits> {
        let mut tx = self.pool.begin().await?;
        let updated = self.award_in(&mut tx, user_id, amount, entry).await?;
        tx.commit().await?;
        Ok(updated)
    }

    pub async fn spend(&self, user_id: Uuid, amount: i64, entry: CreditEntry<'_>) -> RepoResult<UserCredits> {
        let mut tx = self.pool.begin().await?;
        let updated = self.spend_in(&mut tx, user_id, amount, entry).await?;
        tx.commit().await?;
        Ok(updated)
    }

    async fn record_in(
        &self,
        conn: &mut PgConnection,
        user_id: Uuid,
        signed_amount: i64,
        balance_after: i64,
        entry: &CreditEntry<'_>,
    ) -> RepoResult<()> {
        sqlx::query(
            r#"
            INSERT INTO credit_transactions
            (user_id, amount, kind, description, reference_id, balance_after)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(user_id)
        .bind(signed_amount)
        .bind(entry.kind.as_str())
        .bind(entry.description)
        .bind(entry.reference_id)
        .bind(balance_after)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    // =========================================================================
    // History
    // =========================================================================

    pub async fn history(&self, user_id: Uuid, limit: i64) -> RepoResult<Vec<CreditTransaction>> {
        Ok(sqlx::query_as::<_, CreditTransaction>(
            r#"
            SELECT id, user_id, amount, kind, description, reference_id, balance_after, created_at
            FROM credit_transactions
            WHERE user_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?)
    }
}
