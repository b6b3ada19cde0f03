use crate::pricing::FeeSchedule;
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Platform-wide fee and reward settings (single row)
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RewardSettings {
    pub commission_rate: Decimal,
    pub security_deposit: Decimal,
    pub late_fee_multiplier: Decimal,
    pub max_rental_days: i32,
    pub signup_bonus: i64,
    pub referral_reward: i64,
    pub upload_reward: i64,
    pub rental_completion_reward: i64,
    pub brocks_per_unit: i64,
    pub min_redeem_brocks: i64,
    pub updated_at: NaiveDateTime,
}

impl RewardSettings {
    pub fn fee_schedule(&self) -> FeeSchedule {
        FeeSchedule {
            commission_rate: self.commission_rate,
            security_deposit: self.security_deposit,
            late_fee_multiplier: self.late_fee_multiplier,
            max_rental_days: i64::from(self.max_rental_days),
            brocks_per_unit: self.brocks_per_unit,
        }
    }

    /// Apply a partial update, returning the candidate settings for validation
    pub fn merged(&self, patch: &SettingsUpdate) -> Self {
        Self {
            commission_rate: patch.commission_rate.unwrap_or(self.commission_rate),
            security_deposit: patch.security_deposit.unwrap_or(self.security_deposit),
            late_fee_multiplier: patch.late_fee_multiplier.unwrap_or(self.late_fee_multiplier),
            max_rental_days: patch.max_rental_days.unwrap_or(self.max_rental_days),
            signup_bonus: patch.signup_bonus.unwrap_or(self.signup_bonus),
            referral_reward: patch.referral_reward.unwrap_or(self.referral_reward),
            upload_reward: patch.upload_reward.unwrap_or(self.upload_reward),
            rental_completion_reward: patch
                .rental_completion_reward
                .unwrap_or(self.rental_completion_reward),
            brocks_per_unit: patch.brocks_per_unit.unwrap_or(self.brocks_per_unit),
            min_redeem_brocks: patch.min_redeem_brocks.unwrap_or(self.min_redeem_brocks),
            updated_at: self.updated_at,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        self.fee_schedule().validate().map_err(|e| e.to_string())?;
        // Column precision: commission NUMERIC(5,4), money and multiplier 2 dp
        let precision = [
            ("commission_rate", self.commission_rate, 4),
            ("security_deposit", self.security_deposit, 2),
            ("late_fee_multiplier", self.late_fee_multiplier, 2),
        ];
        for (name, value, max_scale) in precision {
            if value.normalize().scale() > max_scale {
                return Err(format!("{} allows at most {} decimal places", name, max_scale));
            }
        }
        let rewards = [
            ("signup_bonus", self.signup_bonus),
            ("referral_reward", self.referral_reward),
            ("upload_reward", self.upload_reward),
            ("rental_completion_reward", self.rental_completion_reward),
            ("min_redeem_brocks", self.min_redeem_brocks),
        ];
        for (name, value) in rewards {
            if value < 0 {
                return Err(format!("{} cannot be negative", name));
            }
        }
        Ok(())
    }
}

/// Admin patch; absent fields keep their current value
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SettingsUpdate {
    pub commission_rate: Option<Decimal>,
    pub security_deposit: Option<Decimal>,
    pub late_fee_multiplier: Option<Decimal>,
    pub max_rental_days: Option<i32>,
    pub signup_bonus: Option<i64>,
    pub referral_reward: Option<i64>,
    pub upload_reward: Option<i64>,
    pub rental_completion_reward: Option<i64>,
    pub brocks_per_unit: Option<i64>,
    pub min_redeem_brocks: Option<i64>,
}

/// Headline counts for the admin dashboard
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PlatformStats {
    pub users: i64,
    pub societies: i64,
    pub books: i64,
    pub active_rentals: i64,
    pub platform_fees: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defaults() -> RewardSettings {
        RewardSettings {
            commission_rate: Decimal::new(5, 2),
            security_deposit: Decimal::new(100, 0),
            late_fee_multiplier: Decimal::ONE,
            max_rental_days: 30,
            signup_bonus: 10,
            referral_reward: 5,
            upload_reward: 1,
            rental_completion_reward: 5,
            brocks_per_unit: 10,
            min_redeem_brocks: 100,
            updated_at: chrono::Utc::now().naive_utc(),
        }
    }

    #[test]
    fn test_fee_schedule_matches_defaults() {
        assert_eq!(defaults().fee_schedule(), FeeSchedule::default());
    }

    #[test]
    fn test_merged_keeps_unset_fields() {
        let patch = SettingsUpdate {
            upload_reward: Some(3),
            ..SettingsUpdate::default()
        };
        let merged = defaults().merged(&patch);
        assert_eq!(merged.upload_reward, 3);
        assert_eq!(merged.referral_reward, 5);
        assert!(merged.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_negative_rewards() {
        let patch = SettingsUpdate {
            referral_reward: Some(-1),
            ..SettingsUpdate::default()
        };
        assert!(defaults().merged(&patch).validate().is_err());

        let patch = SettingsUpdate {
            commission_rate: Some(Decimal::new(15, 1)),
            ..SettingsUpdate::default()
        };
        assert!(defaults().merged(&patch).validate().is_err());
    }

    #[test]
    fn test_validate_rejects_excess_precision() {
        let too_fine = SettingsUpdate {
            commission_rate: Some(Decimal::new(123456, 6)),
            ..SettingsUpdate::default()
        };
        assert!(defaults().merged(&too_fine).validate().is_err());

        // Trailing zeros do not count
        let padded = SettingsUpdate {
            commission_rate: Some(Decimal::new(7500, 5)),
            security_deposit: Some(Decimal::new(150000, 3)),
            ..SettingsUpdate::default()
        };
        assert!(defaults().merged(&padded).validate().is_ok());

        let deposit = SettingsUpdate {
            security_deposit: Some(Decimal::new(100001, 3)),
            ..SettingsUpdate::default()
        };
        assert!(defaults().merged(&deposit).validate().is_err());
    }
}
