use crate::error::{AppError, AppResult};
use crate::models::{BookPurchase, NotificationKind};
use crate::pricing::quote_purchase;
use crate::repositories::{BookRepository, PurchaseRepository, SettingsRepository};
use crate::services::NotificationService;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Service for outright book sales
pub struct PurchaseService {
    pool: PgPool,
    book_repo: Arc<BookRepository>,
    purchase_repo: Arc<PurchaseRepository>,
    settings_repo: Arc<SettingsRepository>,
    notifications: Arc<NotificationService>,
}

impl PurchaseService {
    pub fn new(
        pool: PgPool,
        book_repo: Arc<BookRepository>,
        purchase_repo: Arc<PurchaseRepository>,
        settings_repo: Arc<SettingsRepository>,
        notifications: Arc<NotificationService>,
    ) -> Self {
        Self {
            pool,
            book_repo,
            purchase_repo,
            settings_repo,
            notifications,
        }
    }

    /// Buy a book listed in one of the buyer's societies. Ownership moves to the buyer and the book leaves every shelf.
    pub async fn purchase(&self, buyer_id: Uuid, book_id: Uuid) -> AppResult<BookPurchase> {
        let book = self
            .book_repo
            .find_by_id(book_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Book {} not found", book_id)))?;

        let price = book
            .selling_price
            .ok_or_else(|| AppError::Validation("This book is not for sale".to_string()))?;
        if book.is_owned_by(buyer_id) {
            return Err(AppError::Validation("You already own this book".to_string()));
        }
        if !self.book_repo.is_visible_to(book.id, buyer_id).await? {
            return Err(AppError::Forbidden(
                "This book is not listed in any of your societies".to_string(),
            ));
        }
        if !book.is_available {
            return Err(AppError::Conflict("Book is not available".to_string()));
        }

        let settings = self.settings_repo.get().await?;
        let quote = quote_purchase(price, &settings.fee_schedule())?;
        let seller_id = book.owner_id;

        let mut tx = self.pool.begin().await?;
        self.book_repo.claim_in(&mut tx, book.id).await?;
        let purchase = self
            .purchase_repo
            .create_in(&mut tx, book.id, buyer_id, seller_id, &quote)
            .await?;
        self.book_repo.transfer_in(&mut tx, book.id, buyer_id).await?;
        tx.commit().await?;

        info!(
            "Book {} sold by {} to {} for {}",
            book.id, seller_id, buyer_id, purchase.price
        );

        self.notifications
            .notify_or_log(
                seller_id,
                NotificationKind::BookPurchased,
                "Book sold",
                &format!("\"{}\" sold for {} (you receive {})", book.title, purchase.price, purchase.seller_amount),
                Some(purchase.id),
            )
            .await;

        Ok(purchase)
    }

    pub async fn list_for_user(&self, user_id: Uuid) -> AppResult<Vec<BookPurchase>> {
        Ok(self.purchase_repo.list_for_user(user_id).await?)
    }
}
