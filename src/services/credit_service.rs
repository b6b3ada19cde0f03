use crate::error::{AppError, AppResult};
use crate::models::{CreditKind, CreditTransaction, NotificationKind, UserCredits};
use crate::pricing::brocks_to_money;
use crate::repositories::{CreditEntry, CreditRepository, SettingsRepository};
use crate::services::NotificationService;
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

const DEFAULT_HISTORY_LIMIT: i64 = 50;
const MAX_HISTORY_LIMIT: i64 = 200;

/// Result of cashing out Brocks
#[derive(Debug, Clone, Serialize)]
pub struct Redemption {
    pub brocks: i64,
    pub cash_value: Decimal,
    pub balance: i64,
}

/// Service for the Brocks balance and ledger
pub struct CreditService {
    credit_repo: Arc<CreditRepository>,
    settings_repo: Arc<SettingsRepository>,
    notifications: Arc<NotificationService>,
}

impl CreditService {
    pub fn new(
        credit_repo: Arc<CreditRepository>,
        settings_repo: Arc<SettingsRepository>,
        notifications: Arc<NotificationService>,
    ) -> Self {
        Self {
            credit_repo,
            settings_repo,
            notifications,
        }
    }

    pub async fn balance(&self, user_id: Uuid) -> AppResult<UserCredits> {
        Ok(self.credit_repo.get_or_create(user_id).await?)
    }

    pub async fn history(&self, user_id: Uuid, limit: Option<i64>) -> AppResult<Vec<CreditTransaction>> {
        let limit = limit
            .unwrap_or(DEFAULT_HISTORY_LIMIT)
            .clamp(1, MAX_HISTORY_LIMIT);
        Ok(self.credit_repo.history(user_id, limit).await?)
    }

    pub async fn award(
        &self,
        user_id: Uuid,
        amount: i64,
        kind: CreditKind,
        description: &str,
        reference_id: Option<Uuid>,
    ) -> AppResult<UserCredits> {
        let mut entry = CreditEntry::new(kind).describe(description);
        if let Some(reference_id) = reference_id {
            entry = entry.reference(reference_id);
        }
        let credits = self.credit_repo.award(user_id, amount, entry).await?;
        info!("Awarded {} Brocks to {} ({})", amount, user_id, kind.as_str());
        Ok(credits)
    }

    pub async fn spend(
        &self,
        user_id: Uuid,
        amount: i64,
        kind: CreditKind,
        description: &str,
        reference_id: Option<Uuid>,
    ) -> AppResult<UserCredits> {
        let mut entry = CreditEntry::new(kind).describe(description);
        if let Some(reference_id) = reference_id {
            entry = entry.reference(reference_id);
        }
        let credits = self.credit_repo.spend(user_id, amount, entry).await?;
        info!("Debited {} Brocks from {} ({})", amount, user_id, kind.as_str());
        Ok(credits)
    }

    /// Convert Brocks to cash at the current rate. Requires the configured minimum.
    pub async fn redeem_for_cash(&self, user_id: Uuid, brocks: i64) -> AppResult<Redemption> {
        let settings = self.settings_repo.get().await?;
        if brocks < settings.min_redeem_brocks || brocks <= 0 {
            return Err(AppError::Validation(format!(
                "At least {} Brocks are required to redeem",
                settings.min_redeem_brocks.max(1)
            )));
        }

        let cash_value = brocks_to_money(brocks, &settings.fee_schedule());
        let credits = self
            .spend(
                user_id,
                brocks,
                CreditKind::RedeemCash,
                &format!("Redeemed for {}", cash_value),
                None,
            )
            .await?;

        self.notifications
            .notify_or_log(
                user_id,
                NotificationKind::CreditsRedeemed,
                "Brocks redeemed",
                &format!("You redeemed {} Brocks for {}", brocks, cash_value),
                None,
            )
            .await;

        Ok(Redemption {
            brocks,
            cash_value,
            balance: credits.balance,
        })
    }

    /// Signed manual adjustment; negative amounts debit and still cannot overdraw
    pub async fn adjust(&self, user_id: Uuid, amount: i64, reason: &str) -> AppResult<UserCredits> {
        match amount {
            0 => Err(AppError::Validation("Adjustment amount cannot be zero".to_string())),
            a if a > 0 => {
                self.award(user_id, a, CreditKind::AdminAdjustment, reason, None)
                    .await
            }
            a => {
                let debit = a
                    .checked_neg()
                    .ok_or_else(|| AppError::Validation("Adjustment amount out of range".to_string()))?;
                self.spend(user_id, debit, CreditKind::AdminAdjustment, reason, None)
                    .await
            }
        }
    }
}
