use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtensionStatus {
    Pending,
    Approved,
    Declined,
}

impl ExtensionStatus {
    pub fn from_str(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(ExtensionStatus::Pending),
            "approved" => Ok(ExtensionStatus::Approved),
            "declined" => Ok(ExtensionStatus::Declined),
            _ => Err(format!("Invalid extension status: {}", s)),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ExtensionStatus::Pending => "pending",
            ExtensionStatus::Approved => "approved",
            ExtensionStatus::Declined => "declined",
        }
    }
}

/// Borrower's request to push a rental's due date, decided by the lender
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ExtensionRequest {
    pub id: Uuid,
    pub rental_id: Uuid,
    pub requested_by: Uuid,
    pub current_due_date: NaiveDate,
    pub new_due_date: NaiveDate,
    pub extra_days: i32,
    pub extension_fee: Decimal,
    pub platform_fee: Decimal,
    pub lender_amount: Decimal,
    pub reason: Option<String>,
    pub status: String,
    pub created_at: NaiveDateTime,
    pub decided_at: Option<NaiveDateTime>,
}

impl ExtensionRequest {
    pub fn status_enum(&self) -> ExtensionStatus {
        ExtensionStatus::from_str(&self.status).unwrap_or(ExtensionStatus::Declined)
    }

    pub fn is_pending(&self) -> bool {
        self.status_enum() == ExtensionStatus::Pending
    }
}
