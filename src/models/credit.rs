//! Brocks ledger models

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A user's Brocks balance
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct UserCredits {
    pub user_id: Uuid,
    pub balance: i64,
    pub lifetime_earned: i64,
    pub updated_at: NaiveDateTime,
}

/// Reasons a balance moves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreditKind {
    SignupBonus,
    Referral,
    Upload,
    RentalCompleted,
    RentalDiscount,
    RedeemCash,
    AdminAdjustment,
}

impl CreditKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SignupBonus => "signup_bonus",
            Self::Referral => "referral",
            Self::Upload => "upload",
            Self::RentalCompleted => "rental_completed",
            Self::RentalDiscount => "rental_discount",
            Self::RedeemCash => "redeem_cash",
            Self::AdminAdjustment => "admin_adjustment",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "signup_bonus" => Some(Self::SignupBonus),
            "referral" => Some(Self::Referral),
            "upload" => Some(Self::Upload),
            "rental_completed" => Some(Self::RentalCompleted),
            "rental_discount" => Some(Self::RentalDiscount),
            "redeem_cash" => Some(Self::RedeemCash),
            "admin_adjustment" => Some(Self::AdminAdjustment),
            _ => None,
        }
    }
}

/// Ledger line; `amount` is signed (negative for spends)
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct CreditTransaction {
    pub id: Uuid,
    pub user_id: Uuid,
    pub amount: i64,
    pub kind: String,
    pub description: Option<String>,
    pub reference_id: Option<Uuid>,
    pub balance_after: i64,
    pub created_at: NaiveDateTime,
}

impl CreditTransaction {
    pub fn kind_enum(&self) -> Option<CreditKind> {
        CreditKind::from_str(&self.kind)
    }

    pub fn is_spend(&self) -> bool {
        self.amount < 0
    }
}
