use crate::error::{AppError, AppResult};
use crate::models::{BookRental, ExtensionRequest, ExtensionStatus, NotificationKind, RentalStatus};
use crate::pricing::quote_extension;
use crate::repositories::{ExtensionRepository, RentalRepository, SettingsRepository};
use crate::services::NotificationService;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone, Deserialize)]
pub struct ExtensionRequestBody {
    pub new_due_date: NaiveDate,
    #[serde(default)]
    pub reason: Option<String>,
}

/// An approved extension with the rental it moved
#[derive(Debug, Clone, Serialize)]
pub struct ExtensionDecision {
    pub request: ExtensionRequest,
    pub rental: Option<BookRental>,
}

/// Service for due-date extension requests
pub struct ExtensionService {
    pool: PgPool,
    extension_repo: Arc<ExtensionRepository>,
    rental_repo: Arc<RentalRepository>,
    settings_repo: Arc<SettingsRepository>,
    notifications: Arc<NotificationService>,
}

impl ExtensionService {
    pub fn new(
        pool: PgPool,
        extension_repo: Arc<ExtensionRepository>,
        rental_repo: Arc<RentalRepository>,
        settings_repo: Arc<SettingsRepository>,
        notifications: Arc<NotificationService>,
    ) -> Self {
        Self {
            pool,
            extension_repo,
            rental_repo,
            settings_repo,
            notifications,
        }
    }

    /// Borrower asks to push the due date. One pending request per rental.
    pub async fn request_extension(
        &self,
        borrower_id: Uuid,
        rental_id: Uuid,
        body: ExtensionRequestBody,
    ) -> AppResult<ExtensionRequest> {
        let rental = self.find_rental(rental_id).await?;
        if rental.borrower_id != borrower_id {
            return Err(AppError::Forbidden("Only the borrower can request an extension".to_string()));
        }
        if rental.status_enum() != RentalStatus::Active {
            return Err(AppError::Conflict("Only active rentals can be extended".to_string()));
        }

        let settings = self.settings_repo.get().await?;
        let quote = quote_extension(&rental.terms(), body.new_due_date, &settings.fee_schedule())?;
        let reason = body
            .reason
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty());

        let request = self
            .extension_repo
            .create(
                rental.id,
                borrower_id,
                rental.due_date,
                body.new_due_date,
                &quote,
                reason,
            )
            .await?;

        info!(
            "Extension {} requested on rental {}: +{} day(s), fee {}",
            request.id, rental.id, quote.extra_days, quote.extension_fee
        );

        self.notifications
            .notify_or_log(
                rental.lender_id,
                NotificationKind::ExtensionRequested,
                "Extension requested",
                &format!(
                    "The borrower asked to keep your book until {} (fee {})",
                    request.new_due_date, request.extension_fee
                ),
                Some(request.id),
            )
            .await;

        Ok(request)
    }

    /// Lender approves: the request and the rental's new due date commit together
    pub async fn approve(&self, lender_id: Uuid, request_id: Uuid) -> AppResult<ExtensionDecision> {
        let (request, rental) = self.pending_for(lender_id, request_id).await?;

        let mut tx = self.pool.begin().await?;
        let request = self
            .extension_repo
            .decide_in(&mut tx, request.id, ExtensionStatus::Approved)
            .await?;
        let rental = self
            .rental_repo
            .apply_extension_in(
                &mut tx,
                rental.id,
                request.current_due_date,
                request.new_due_date,
                request.extension_fee,
                request.platform_fee,
                request.lender_amount,
            )
            .await?;
        tx.commit().await?;

        info!("Extension {} approved; rental {} now due {}", request.id, rental.id, rental.due_date);

        self.notifications
            .notify_or_log(
                rental.borrower_id,
                NotificationKind::ExtensionApproved,
                "Extension approved",
                &format!("Your rental is now due on {}", rental.due_date),
                Some(rental.id),
            )
            .await;

        Ok(ExtensionDecision {
            request,
            rental: Some(rental),
        })
    }

    pub async fn decline(&self, lender_id: Uuid, request_id: Uuid) -> AppResult<ExtensionDecision> {
        let (request, rental) = self.pending_for(lender_id, request_id).await?;
        let request = self
            .extension_repo
            .decide(request.id, ExtensionStatus::Declined)
            .await?;

        info!("Extension {} declined", request.id);

        self.notifications
            .notify_or_log(
                rental.borrower_id,
                NotificationKind::ExtensionDeclined,
                "Extension declined",
                &format!("Your rental is still due on {}", rental.due_date),
                Some(rental.id),
            )
            .await;

        Ok(ExtensionDecision { request, rental: None })
    }

    pub async fn list_for_rental(&self, user_id: Uuid, rental_id: Uuid) -> AppResult<Vec<ExtensionRequest>> {
        let rental = self.find_rental(rental_id).await?;
        if !rental.is_party(user_id) {
            return Err(AppError::Forbidden("You are not part of this rental".to_string()));
        }
        Ok(self.extension_repo.list_for_rental(rental.id).await?)
    }

    pub async fn pending_for_lender(&self, lender_id: Uuid) -> AppResult<Vec<ExtensionRequest>> {
        Ok(self.extension_repo.pending_for_lender(lender_id).await?)
    }

    /// Load a pending request and its rental, checking the caller is the lender
    async fn pending_for(&self, lender_id: Uuid, request_id: Uuid) -> AppResult<(ExtensionRequest, BookRental)> {
        let request = self
            .extension_repo
            .find_by_id(request_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Extension request {} not found", request_id)))?;
        let rental = self.find_rental(request.rental_id).await?;

        if rental.lender_id != lender_id {
            return Err(AppError::Forbidden("Only the lender can decide an extension".to_string()));
        }
        if !request.is_pending() {
            return Err(AppError::Conflict(format!(
                "Extension request is already {}",
                request.status
            )));
        }
        Ok((request, rental))
    }

    async fn find_rental(&self, rental_id: Uuid) -> AppResult<BookRental> {
        self.rental_repo
            .find_by_id(rental_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Rental {} not found", rental_id)))
    }
}
