use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct BookPurchase {
    pub id: Uuid,
    pub book_id: Uuid,
    pub buyer_id: Uuid,
    pub seller_id: Uuid,
    pub price: Decimal,
    pub platform_fee: Decimal,
    pub seller_amount: Decimal,
    pub created_at: NaiveDateTime,
}
