use crate::error::{RepoResult, RepositoryError};
use crate::models::{PlatformStats, RewardSettings};
use sqlx::PgPool;

const SETTINGS_COLUMNS: &str = "commission_rate, security_deposit, late_fee_multiplier, max_rental_days, \
                                signup_bonus, referral_reward, upload_reward, rental_completion_reward, \
                                brocks_per_unit, min_redeem_brocks, updated_at";

/// Repository for the single reward settings row and platform-wide aggregates
pub struct SettingsRepository {
    pool: PgPool,
}

impl SettingsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get(&self) -> RepoResult<RewardSettings> {
        let sql = format!("SELECT {SETTINGS_COLUMNS} FROM reward_settings WHERE id = 1");
        sqlx::query_as::<_, RewardSettings>(&sql)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| RepositoryError::NotFound("Reward settings row is missing".to_string()))
    }

    /// Persist a full, already-validated settings value
    pub async fn update(&self, settings: &RewardSettings) -> RepoResult<RewardSettings> {
        let sql = format!(
            r#"
            UPDATE reward_settings
            SET commission_rate = $1,
                security_deposit = $2,
                late_fee_multiplier = $3,
                max_rental_days = $4,
                signup_bonus = $5,
                referral_reward = $6,
                upload_reward = $7,
                rental_completion_reward = $8,
                brocks_per_unit = $9,
                min_redeem_brocks = $10,
                updated_at = (NOW() AT TIME ZONE 'utc')
            WHERE id = 1
            RETURNING {SETTINGS_COLUMNS}
            "#
        );
        Ok(sqlx::query_as::<_, RewardSettings>(&sql)
            .bind(settings.commission_rate)
            .bind(settings.security_deposit)
            .bind(settings.late_fee_multiplier)
            .bind(settings.max_rental_days)
            .bind(settings.signup_bonus)
            .bind(settings.referral_reward)
            .bind(settings.upload_reward)
            .bind(settings.rental_completion_reward)
            .bind(settings.brocks_per_unit)
            .bind(settings.min_redeem_brocks)
            .fetch_one(&self.pool)
            .await?)
    }

    pub async fn stats(&self) -> RepoResult<PlatformStats> {
        Ok(sqlx::query_as::<_, PlatformStats>(
            r#"
            SELECT
                (SELECT COUNT(*) FROM users) AS users,
                (SELECT COUNT(*) FROM societies) AS societies,
                (SELECT COUNT(*) FROM books) AS books,
                (SELECT COUNT(*) FROM book_rentals WHERE status <> 'returned') AS active_rentals,
                (SELECT COALESCE(SUM(platform_fee), 0) FROM book_rentals)
                    + (SELECT COALESCE(SUM(platform_fee), 0) FROM book_purchases) AS platform_fees
            "#,
        )
        .fetch_one(&self.pool)
        .await?)
    }
}
