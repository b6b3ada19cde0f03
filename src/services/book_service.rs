use crate::error::{AppError, AppResult};
use crate::models::{Book, BookDetails, BookFilter, CreditKind};
use crate::repositories::{
    BookRepository, CreditEntry, CreditRepository, PurchaseRepository, RentalRepository,
    SettingsRepository, SocietyMemberRepository,
};
use serde::Serialize;
use sqlx::PgPool;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// A book with the societies whose shelves it is on
#[derive(Debug, Clone, Serialize)]
pub struct BookListing {
    #[serde(flatten)]
    pub book: Book,
    pub society_ids: Vec<Uuid>,
}

/// Service for book listings
pub struct BookService {
    pool: PgPool,
    book_repo: Arc<BookRepository>,
    member_repo: Arc<SocietyMemberRepository>,
    rental_repo: Arc<RentalRepository>,
    purchase_repo: Arc<PurchaseRepository>,
    credit_repo: Arc<CreditRepository>,
    settings_repo: Arc<SettingsRepository>,
}

impl BookService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        pool: PgPool,
        book_repo: Arc<BookRepository>,
        member_repo: Arc<SocietyMemberRepository>,
        rental_repo: Arc<RentalRepository>,
        purchase_repo: Arc<PurchaseRepository>,
        credit_repo: Arc<CreditRepository>,
        settings_repo: Arc<SettingsRepository>,
    ) -> Self {
        Self {
            pool,
            book_repo,
            member_repo,
            rental_repo,
            purchase_repo,
            credit_repo,
            settings_repo,
        }
    }

    /// List a new book on the given society shelves and pay the upload reward
    pub async fn create_book(
        &self,
        owner_id: Uuid,
        details: BookDetails,
        society_ids: Vec<Uuid>,
    ) -> AppResult<BookListing> {
        let details = details.normalized().map_err(AppError::Validation)?;
        let society_ids: Vec<Uuid> = society_ids.into_iter().collect::<BTreeSet<_>>().into_iter().collect();
        for society_id in &society_ids {
            self.require_member(*society_id, owner_id).await?;
        }

        let settings = self.settings_repo.get().await?;
        let mut tx = self.pool.begin().await?;

        let book = self.book_repo.create_in(&mut tx, owner_id, &details).await?;
        for society_id in &society_ids {
            self.book_repo.tag_in(&mut tx, book.id, *society_id).await?;
        }
        if settings.upload_reward > 0 {
            let entry = CreditEntry::new(CreditKind::Upload)
                .describe("Book listed")
                .reference(book.id);
            self.credit_repo
                .award_in(&mut tx, owner_id, settings.upload_reward, entry)
                .await?;
        }

        tx.commit().await?;
        info!("User {} listed book {} in {} societ(ies)", owner_id, book.id, society_ids.len());

        Ok(BookListing { book, society_ids })
    }

    pub async fn update_book(&self, owner_id: Uuid, book_id: Uuid, details: BookDetails) -> AppResult<BookListing> {
        self.owned_book(owner_id, book_id).await?;
        let details = details.normalized().map_err(AppError::Validation)?;
        let book = self.book_repo.update(book_id, &details).await?;
        info!("Book {} updated by {}", book_id, owner_id);
        self.listing(book).await
    }

    /// Delete a book that has never been rented or sold
    pub async fn delete_book(&self, owner_id: Uuid, book_id: Uuid) -> AppResult<()> {
        let book = self.owned_book(owner_id, book_id).await?;

        if self.rental_repo.open_for_book(book.id).await?.is_some() {
            return Err(AppError::Conflict("Book is currently rented".to_string()));
        }
        if self.rental_repo.count_for_book(book.id).await? > 0
            || self.purchase_repo.count_for_book(book.id).await? > 0
        {
            return Err(AppError::Conflict(
                "Book has rental or sale history; mark it unavailable instead".to_string(),
            ));
        }

        self.book_repo.delete(book.id).await?;
        info!("Book {} deleted by {}", book_id, owner_id);
        Ok(())
    }

    /// A book, visible to its owner and to members of the societies it is listed in
    pub async fn get_book(&self, viewer_id: Uuid, book_id: Uuid) -> AppResult<BookListing> {
        let book = self.find_book(book_id).await?;
        if !book.is_owned_by(viewer_id) && !self.book_repo.is_visible_to(book.id, viewer_id).await? {
            return Err(AppError::Forbidden(
                "This book is not listed in any of your societies".to_string(),
            ));
        }
        self.listing(book).await
    }

    pub async fn list_owned(&self, owner_id: Uuid) -> AppResult<Vec<Book>> {
        Ok(self.book_repo.list_by_owner(owner_id).await?)
    }

    /// Browse a society shelf. Members only.
    pub async fn list_society_books(
        &self,
        viewer_id: Uuid,
        society_id: Uuid,
        filter: &BookFilter,
    ) -> AppResult<Vec<Book>> {
        self.require_member(society_id, viewer_id).await?;
        Ok(self.book_repo.list_for_society(society_id, filter).await?)
    }

    pub async fn tag_society(&self, owner_id: Uuid, book_id: Uuid, society_id: Uuid) -> AppResult<BookListing> {
        let book = self.owned_book(owner_id, book_id).await?;
        self.require_member(society_id, owner_id).await?;
        if self.book_repo.tag(book.id, society_id).await? {
            info!("Book {} tagged into society {}", book.id, society_id);
        }
        self.listing(book).await
    }

    pub async fn untag_society(&self, owner_id: Uuid, book_id: Uuid, society_id: Uuid) -> AppResult<BookListing> {
        let book = self.owned_book(owner_id, book_id).await?;
        if !self.book_repo.untag(book.id, society_id).await? {
            return Err(AppError::NotFound("Book is not listed in that society".to_string()));
        }
        info!("Book {} removed from society {}", book.id, society_id);
        self.listing(book).await
    }

    /// Owner toggles whether an idle book can be borrowed or bought
    pub async fn set_availability(&self, owner_id: Uuid, book_id: Uuid, available: bool) -> AppResult<BookListing> {
        let mut tx = self.pool.begin().await?;

        // Waits for any in-flight borrow or sale on this book to commit
        let book = self.book_repo.lock_in(&mut tx, book_id).await?;
        if !book.is_owned_by(owner_id) {
            return Err(AppError::Forbidden("Only the owner can change this book".to_string()));
        }
        let book = self.book_repo.set_available_in(&mut tx, book.id, available).await?;

        tx.commit().await?;
        info!("Book {} availability set to {} by {}", book.id, available, owner_id);
        self.listing(book).await
    }

    async fn listing(&self, book: Book) -> AppResult<BookListing> {
        let society_ids = self.book_repo.society_ids(book.id).await?;
        Ok(BookListing { book, society_ids })
    }

    async fn find_book(&self, book_id: Uuid) -> AppResult<Book> {
        self.book_repo
            .find_by_id(book_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Book {} not found", book_id)))
    }

    async fn owned_book(&self, owner_id: Uuid, book_id: Uuid) -> AppResult<Book> {
        let book = self.find_book(book_id).await?;
        if !book.is_owned_by(owner_id) {
            return Err(AppError::Forbidden("Only the owner can change this book".to_string()));
        }
        Ok(book)
    }

    async fn require_member(&self, society_id: Uuid, user_id: Uuid) -> AppResult<()> {
        if !self.member_repo.is_active_member(society_id, user_id).await? {
            return Err(AppError::Forbidden(format!(
                "You are not a member of society {}",
                society_id
            )));
        }
        Ok(())
    }
}
