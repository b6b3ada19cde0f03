use crate::error::RepoResult;
use crate::models::BookPurchase;
use crate::pricing::PurchaseQuote;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

/// Repository for completed book sales
pub struct PurchaseRepository {
    pool: PgPool,
}

impl PurchaseRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create_in(
        &self,
        conn: &mut PgConnection,
        book_id: Uuid,
        buyer_id: Uuid,
        seller_id: Uuid,
        quote: &PurchaseQuote,
    ) -> RepoResult<BookPurchase> {
        Ok(sqlx::query_as::<_, BookPurchase>(
            r#"
            INSERT INTO book_purchases (book_id, buyer_id, seller_id, price, platform_fee, seller_amount)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, book_id, buyer_id, seller_id, price, platform_fee, seller_amount, created_at
            "#,
        )
        .bind(book_id)
        .bind(buyer_id)
        .bind(seller_id)
        .bind(quote.price)
        .bind(quote.platform_fee)
        .bind(quote.seller_amount)
        .fetch_one(&mut *conn)
        .await?)
    }

    /// Purchases where the user was buyer or seller, newest first
    pub async fn list_for_user(&self, user_id: Uuid) -> RepoResult<Vec<BookPurchase>> {
        Ok(sqlx::query_as::<_, BookPurchase>(
            r#"
            SELECT id, book_id, buyer_id, seller_id, price, platform_fee, seller_amount, created_at
            FROM book_purchases
            WHERE buyer_id = $1 OR seller_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?)
    }

    pub async fn count_for_book(&self, book_id: Uuid) -> RepoResult<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM book_purchases WHERE book_id = $1")
            .bind(book_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
