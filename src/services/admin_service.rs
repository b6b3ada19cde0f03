use crate::error::{AppError, AppResult};
use crate::models::{PlatformStats, RewardSettings, SettingsUpdate, User, UserCredits};
use crate::repositories::{SettingsRepository, UserRepository};
use crate::services::CreditService;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Deserialize)]
pub struct CreditAdjustment {
    pub user_id: Uuid,
    /// Positive to award, negative to debit
    pub amount: i64,
    pub reason: String,
}

/// Service for platform settings and admin-only operations
pub struct AdminService {
    settings_repo: Arc<SettingsRepository>,
    user_repo: Arc<UserRepository>,
    credit_service: Arc<CreditService>,
}

impl AdminService {
    pub fn new(
        settings_repo: Arc<SettingsRepository>,
        user_repo: Arc<UserRepository>,
        credit_service: Arc<CreditService>,
    ) -> Self {
        Self {
            settings_repo,
            user_repo,
            credit_service,
        }
    }

    /// Current fees and rewards; readable by any signed-in user
    pub async fn get_settings(&self) -> AppResult<RewardSettings> {
        Ok(self.settings_repo.get().await?)
    }

    pub async fn update_settings(&self, admin: &User, patch: SettingsUpdate) -> AppResult<RewardSettings> {
        require_admin(admin)?;
        let current = self.settings_repo.get().await?;
        let candidate = current.merged(&patch);
        candidate.validate().map_err(AppError::Validation)?;

        let updated = self.settings_repo.update(&candidate).await?;
        info!("Reward settings updated by admin {}", admin.id);
        Ok(updated)
    }

    pub async fn adjust_credits(&self, admin: &User, adjustment: CreditAdjustment) -> AppResult<UserCredits> {
        require_admin(admin)?;
        let reason = adjustment.reason.trim();
        if reason.is_empty() {
            return Err(AppError::Validation("A reason is required".to_string()));
        }
        if self.user_repo.find_by_id(adjustment.user_id).await?.is_none() {
            return Err(AppError::NotFound(format!("User {} not found", adjustment.user_id)));
        }

        let credits = self
            .credit_service
            .adjust(adjustment.user_id, adjustment.amount, reason)
            .await?;
        info!(
            "Admin {} adjusted {} by {} Brocks: {}",
            admin.id, adjustment.user_id, adjustment.amount, reason
        );
        Ok(credits)
    }

    pub async fn platform_stats(&self, admin: &User) -> AppResult<PlatformStats> {
        require_admin(admin)?;
        Ok(self.settings_repo.stats().await?)
    }
}

pub fn require_admin(user: &User) -> AppResult<()> {
    if !user.is_admin {
        warn!("Non-admin {} attempted an admin operation", user.id);
        return Err(AppError::Forbidden("Administrator access required".to_string()));
    }
    Ok(())
}
