use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    RentalRequested,
    ReturnRequested,
    ReturnConfirmed,
    ExtensionRequested,
    ExtensionApproved,
    ExtensionDeclined,
    BookPurchased,
    CreditsEarned,
    CreditsRedeemed,
    SocietyJoined,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::RentalRequested => "rental_requested",
            NotificationKind::ReturnRequested => "return_requested",
            NotificationKind::ReturnConfirmed => "return_confirmed",
            NotificationKind::ExtensionRequested => "extension_requested",
            NotificationKind::ExtensionApproved => "extension_approved",
            NotificationKind::ExtensionDeclined => "extension_declined",
            NotificationKind::BookPurchased => "book_purchased",
            NotificationKind::CreditsEarned => "credits_earned",
            NotificationKind::CreditsRedeemed => "credits_redeemed",
            NotificationKind::SocietyJoined => "society_joined",
        }
    }
}

/// User-targeted entry in the notification feed
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub kind: String,
    pub title: String,
    pub message: String,
    pub reference_id: Option<Uuid>,
    pub is_read: bool,
    pub created_at: NaiveDateTime,
}
