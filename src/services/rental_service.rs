use crate::error::{AppError, AppResult};
use crate::models::{BookRental, CreditKind, NotificationKind, RentalStatus, RentalSummary};
use crate::pricing::{quote_rental, settle_return, RentalQuote, ReturnSettlement};
use crate::repositories::{
    BookRepository, CreditEntry, CreditRepository, NewRental, RentalRepository,
    SettingsRepository, SocietyMemberRepository,
};
use crate::services::NotificationService;
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Deserialize)]
pub struct BorrowRequest {
    pub book_id: Uuid,
    pub society_id: Uuid,
    pub start_date: NaiveDate,
    pub due_date: NaiveDate,
    #[serde(default)]
    pub brocks_to_apply: i64,
}

/// A closed rental with the settlement that closed it
#[derive(Debug, Clone, Serialize)]
pub struct ReturnReceipt {
    pub rental: BookRental,
    pub settlement: ReturnSettlement,
}

/// Service for the borrow / return lifecycle
pub struct RentalService {
    pool: PgPool,
    rental_repo: Arc<RentalRepository>,
    book_repo: Arc<BookRepository>,
    member_repo: Arc<SocietyMemberRepository>,
    credit_repo: Arc<CreditRepository>,
    settings_repo: Arc<SettingsRepository>,
    notifications: Arc<NotificationService>,
}

impl RentalService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        pool: PgPool,
        rental_repo: Arc<RentalRepository>,
        book_repo: Arc<BookRepository>,
        member_repo: Arc<SocietyMemberRepository>,
        credit_repo: Arc<CreditRepository>,
        settings_repo: Arc<SettingsRepository>,
        notifications: Arc<NotificationService>,
    ) -> Self {
        Self {
            pool,
            rental_repo,
            book_repo,
            member_repo,
            credit_repo,
            settings_repo,
            notifications,
        }
    }

    /// Price a borrow request without committing anything
    pub async fn quote(&self, borrower_id: Uuid, request: &BorrowRequest) -> AppResult<RentalQuote> {
        let (quote, _) = self.validated_quote(borrower_id, request).await?;
        Ok(quote)
    }

    /// Borrow a book: claim it, spend any Brocks discount and record the rental atomically
    pub async fn borrow(&self, borrower_id: Uuid, request: BorrowRequest) -> AppResult<BookRental> {
        let (quote, lender_id) = self.validated_quote(borrower_id, &request).await?;

        let mut tx = self.pool.begin().await?;

        let book = self.book_repo.claim_in(&mut tx, request.book_id).await?;

        if quote.brocks_used > 0 {
            let entry = CreditEntry::new(CreditKind::RentalDiscount)
                .describe("Rental discount")
                .reference(book.id);
            self.credit_repo
                .spend_in(&mut tx, borrower_id, quote.brocks_used, entry)
                .await?;
        }

        let rental = self
            .rental_repo
            .create_in(
                &mut tx,
                &NewRental {
                    book_id: book.id,
                    borrower_id,
                    lender_id,
                    society_id: request.society_id,
                    start_date: request.start_date,
                    due_date: request.due_date,
                },
                &quote,
            )
            .await?;

        tx.commit().await?;

        info!(
            "Rental {} created: book={}, borrower={}, total={}",
            rental.id, book.id, borrower_id, rental.total_amount
        );

        self.notifications
            .notify_or_log(
                lender_id,
                NotificationKind::RentalRequested,
                "Book borrowed",
                &format!("\"{}\" was borrowed until {}", book.title, rental.due_date),
                Some(rental.id),
            )
            .await;

        Ok(rental)
    }

    /// Borrower flags the book as handed back
    pub async fn request_return(&self, borrower_id: Uuid, rental_id: Uuid) -> AppResult<BookRental> {
        let rental = self.find_rental(rental_id).await?;
        if rental.borrower_id != borrower_id {
            return Err(AppError::Forbidden("Only the borrower can request a return".to_string()));
        }
        if rental.status_enum() != RentalStatus::Active {
            return Err(AppError::Conflict(format!(
                "Rental is {}, not active",
                rental.status
            )));
        }

        let rental = self
            .rental_repo
            .transition(
                rental.id,
                RentalStatus::Active,
                RentalStatus::ReturnRequested,
                Utc::now().date_naive(),
            )
            .await?;
        info!("Return requested for rental {}", rental.id);

        self.notifications
            .notify_or_log(
                rental.lender_id,
                NotificationKind::ReturnRequested,
                "Return requested",
                "The borrower has marked your book as returned. Please confirm.",
                Some(rental.id),
            )
            .await;

        Ok(rental)
    }

    /// Lender confirms the book is back: settle late fees, release the book, pay rewards.
    /// `returned_on` defaults to today and may not lie in the future. When the
    /// borrower already requested the return, late days stop at that request.
    pub async fn confirm_return(
        &self,
        lender_id: Uuid,
        rental_id: Uuid,
        returned_on: Option<NaiveDate>,
    ) -> AppResult<ReturnReceipt> {
        let settings = self.settings_repo.get().await?;
        let today = Utc::now().date_naive();
        let returned_on = returned_on.unwrap_or(today);
        if returned_on > today {
            return Err(AppError::Validation("Return date cannot be in the future".to_string()));
        }

        let mut tx = self.pool.begin().await?;

        let current = self.rental_repo.lock_in(&mut tx, rental_id).await?;
        if current.lender_id != lender_id {
            return Err(AppError::Forbidden("Only the lender can confirm a return".to_string()));
        }
        if !current.status_enum().is_open() {
            return Err(AppError::Conflict("Rental is already returned".to_string()));
        }

        let returned_on = current.settlement_date(returned_on);
        let settlement = settle_return(&current.terms(), returned_on, &settings.fee_schedule())?;

        let rental = self
            .rental_repo
            .mark_returned_in(
                &mut tx,
                current.id,
                returned_on,
                settlement.late_fee,
                settlement.deposit_refund,
            )
            .await?;
        self.book_repo.release_in(&mut tx, rental.book_id).await?;

        if settings.rental_completion_reward > 0 {
            for party in [rental.lender_id, rental.borrower_id] {
                let entry = CreditEntry::new(CreditKind::RentalCompleted)
                    .describe("Rental completed")
                    .reference(rental.id);
                self.credit_repo
                    .award_in(&mut tx, party, settings.rental_completion_reward, entry)
                    .await?;
            }
        }

        tx.commit().await?;

        if settlement.is_late() {
            warn!(
                "Rental {} returned {} day(s) late, late fee {}",
                rental.id, settlement.late_days, settlement.late_fee
            );
        }
        info!("Rental {} returned, deposit refund {}", rental.id, settlement.deposit_refund);

        let message = if settlement.is_late() {
            format!(
                "Return confirmed. Late fee {} applied, deposit refund {}",
                settlement.late_fee, settlement.deposit_refund
            )
        } else {
            format!("Return confirmed. Deposit refund {}", settlement.deposit_refund)
        };
        self.notifications
            .notify_or_log(
                rental.borrower_id,
                NotificationKind::ReturnConfirmed,
                "Return confirmed",
                &message,
                Some(rental.id),
            )
            .await;

        Ok(ReturnReceipt { rental, settlement })
    }

    /// A rental, visible to its borrower and lender only
    pub async fn get(&self, user_id: Uuid, rental_id: Uuid) -> AppResult<BookRental> {
        let rental = self.find_rental(rental_id).await?;
        if !rental.is_party(user_id) {
            return Err(AppError::Forbidden("You are not part of this rental".to_string()));
        }
        Ok(rental)
    }

    pub async fn list_borrowed(&self, user_id: Uuid) -> AppResult<Vec<RentalSummary>> {
        Ok(self.rental_repo.list_borrowed(user_id).await?)
    }

    pub async fn list_lent(&self, user_id: Uuid) -> AppResult<Vec<RentalSummary>> {
        Ok(self.rental_repo.list_lent(user_id).await?)
    }

    pub async fn overdue(&self, user_id: Uuid) -> AppResult<Vec<RentalSummary>> {
        Ok(self
            .rental_repo
            .list_overdue(user_id, Utc::now().date_naive())
            .await?)
    }

    /// Check the borrow preconditions and price the request. Returns the quote and lender.
    async fn validated_quote(&self, borrower_id: Uuid, request: &BorrowRequest) -> AppResult<(RentalQuote, Uuid)> {
        if request.start_date < Utc::now().date_naive() {
            return Err(AppError::Validation("Start date cannot be in the past".to_string()));
        }
        if request.brocks_to_apply < 0 {
            return Err(AppError::Validation("Brocks to apply cannot be negative".to_string()));
        }

        if !self
            .member_repo
            .is_active_member(request.society_id, borrower_id)
            .await?
        {
            return Err(AppError::Forbidden("You are not a member of this society".to_string()));
        }

        let book = self
            .book_repo
            .find_by_id(request.book_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Book {} not found", request.book_id)))?;
        if !self.book_repo.is_tagged(book.id, request.society_id).await? {
            return Err(AppError::NotFound("Book is not listed in this society".to_string()));
        }
        if book.is_owned_by(borrower_id) {
            return Err(AppError::Validation("You cannot borrow your own book".to_string()));
        }
        if !book.is_available {
            return Err(AppError::Conflict("Book is not available".to_string()));
        }

        let settings = self.settings_repo.get().await?;
        let quote = quote_rental(
            book.daily_fee,
            request.start_date,
            request.due_date,
            request.brocks_to_apply,
            &settings.fee_schedule(),
        )?;
        Ok((quote, book.owner_id))
    }

    async fn find_rental(&self, rental_id: Uuid) -> AppResult<BookRental> {
        self.rental_repo
            .find_by_id(rental_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Rental {} not found", rental_id)))
    }
}
