use crate::error::{RepoResult, RepositoryError};
use crate::models::{BookRental, RentalStatus, RentalSummary};
use crate::pricing::RentalQuote;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

const RENTAL_COLUMNS: &str = "r.id, r.book_id, r.borrower_id, r.lender_id, r.society_id, r.start_date, \
                              r.due_date, r.returned_date, r.return_requested_on, r.rental_fee, \
                              r.platform_fee, r.lender_amount, r.security_deposit, r.brocks_used, \
                              r.discount_amount, r.total_amount, r.late_fee, r.deposit_refund, \
                              r.status, r.created_at";

const SUMMARY_SELECT: &str = r#"
    SELECT r.id, r.book_id, b.title AS book_title,
           r.borrower_id, bu.name AS borrower_name,
           r.lender_id, lu.name AS lender_name,
           r.start_date, r.due_date, r.returned_date, r.total_amount, r.status
    FROM book_rentals r
    JOIN books b ON b.id = r.book_id
    JOIN users bu ON bu.id = r.borrower_id
    JOIN users lu ON lu.id = r.lender_id
"#;

/// Parties and dates of a new rental; the money comes from a [`RentalQuote`]
#[derive(Debug, Clone)]
pub struct NewRental {
    pub book_id: Uuid,
    pub borrower_id: Uuid,
    pub lender_id: Uuid,
    pub society_id: Uuid,
    pub start_date: NaiveDate,
    pub due_date: NaiveDate,
}

/// Repository for rental rows
pub struct RentalRepository {
    pool: PgPool,
}

impl RentalRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create_in(
        &self,
        conn: &mut PgConnection,
        rental: &NewRental,
        quote: &RentalQuote,
    ) -> RepoResult<BookRental> {
        let sql = format!(
            r#"
            INSERT INTO book_rentals AS r
                (book_id, borrower_id, lender_id, society_id, start_date, due_date,
                 rental_fee, platform_fee, lender_amount, security_deposit,
                 brocks_used, discount_amount, total_amount, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, 'active')
            RETURNING {RENTAL_COLUMNS}
            "#
        );
        Ok(sqlx::query_as::<_, BookRental>(&sql)
            .bind(rental.book_id)
            .bind(rental.borrower_id)
            .bind(rental.lender_id)
            .bind(rental.society_id)
            .bind(rental.start_date)
            .bind(rental.due_date)
            .bind(quote.rental_fee)
            .bind(quote.platform_fee)
            .bind(quote.lender_amount)
            .bind(quote.security_deposit)
            .bind(quote.brocks_used)
            .bind(quote.discount_amount)
            .bind(quote.total_amount)
            .fetch_one(&mut *conn)
            .await?)
    }

    pub async fn find_by_id(&self, id: Uuid) -> RepoResult<Option<BookRental>> {
        let sql = format!("SELECT {RENTAL_COLUMNS} FROM book_rentals r WHERE r.id = $1");
        Ok(sqlx::query_as::<_, BookRental>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    /// Lock a rental row for the rest of the transaction
    pub async fn lock_in(&self, conn: &mut PgConnection, id: Uuid) -> RepoResult<BookRental> {
        let sql = format!("SELECT {RENTAL_COLUMNS} FROM book_rentals r WHERE r.id = $1 FOR UPDATE");
        sqlx::query_as::<_, BookRental>(&sql)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| RepositoryError::NotFound(format!("Rental {} not found", id)))
    }

    /// Move `from -> to`, guarded on the current status so a rental never regresses.
    /// Entering `return_requested` stamps `return_requested_on` with `on`.
    pub async fn transition(
        &self,
        id: Uuid,
        from: RentalStatus,
        to: RentalStatus,
        on: NaiveDate,
    ) -> RepoResult<BookRental> {
        if !from.can_transition_to(to) {
            return Err(RepositoryError::InvalidInput(format!(
                "Rental cannot move from {} to {}",
                from.as_str(),
                to.as_str()
            )));
        }

        let sql = format!(
            r#"
            UPDATE book_rentals AS r
            SET status = $3,
                return_requested_on = CASE WHEN $3 = 'return_requested' THEN $4
                                           ELSE r.return_requested_on END
            WHERE r.id = $1 AND r.status = $2
            RETURNING {RENTAL_COLUMNS}
            "#
        );
        sqlx::query_as::<_, BookRental>(&sql)
            .bind(id)
            .bind(from.as_str())
            .bind(to.as_str())
            .bind(on)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| {
                RepositoryError::StaleState(format!("Rental is no longer {}", from.as_str()))
            })
    }

    /// Close an open rental with its settlement figures
    pub async fn mark_returned_in(
        &self,
        conn: &mut PgConnection,
        id: Uuid,
        returned_date: NaiveDate,
        late_fee: Decimal,
        deposit_refund: Decimal,
    ) -> RepoResult<BookRental> {
        let sql = format!(
            r#"
            UPDATE book_rentals AS r
            SET status = 'returned', returned_date = $2, late_fee = $3, deposit_refund = $4
            WHERE r.id = $1 AND r.status IN ('active', 'return_requested')
            RETURNING {RENTAL_COLUMNS}
            "#
        );
        sqlx::query_as::<_, BookRental>(&sql)
            .bind(id)
            .bind(returned_date)
            .bind(late_fee)
            .bind(deposit_refund)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| RepositoryError::StaleState("Rental is already returned".to_string()))
    }

    /// Push the due date and fold the extension's money into the rental totals.
    /// Guarded on the due date the extension was priced against.
    pub async fn apply_extension_in(
        &self,
        conn: &mut PgConnection,
        id: Uuid,
        expected_due: NaiveDate,
        new_due: NaiveDate,
        extension_fee: Decimal,
        platform_fee: Decimal,
        lender_amount: Decimal,
    ) -> RepoResult<BookRental> {
        let sql = format!(
            r#"
            UPDATE book_rentals AS r
            SET due_date = $3,
                rental_fee = r.rental_fee + $4,
                platform_fee = r.platform_fee + $5,
                lender_amount = r.lender_amount + $6,
                total_amount = r.total_amount + $4
            WHERE r.id = $1 AND r.due_date = $2 AND r.status = 'active'
            RETURNING {RENTAL_COLUMNS}
            "#
        );
        sqlx::query_as::<_, BookRental>(&sql)
            .bind(id)
            .bind(expected_due)
            .bind(new_due)
            .bind(extension_fee)
            .bind(platform_fee)
            .bind(lender_amount)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| {
                RepositoryError::StaleState(
                    "Rental changed since the extension was requested".to_string(),
                )
            })
    }

    pub async fn list_borrowed(&self, borrower_id: Uuid) -> RepoResult<Vec<RentalSummary>> {
        let sql = format!("{SUMMARY_SELECT} WHERE r.borrower_id = $1 ORDER BY r.created_at DESC");
        Ok(sqlx::query_as::<_, RentalSummary>(&sql)
            .bind(borrower_id)
            .fetch_all(&self.pool)
            .await?)
    }

    pub async fn list_lent(&self, lender_id: Uuid) -> RepoResult<Vec<RentalSummary>> {
        let sql = format!("{SUMMARY_SELECT} WHERE r.lender_id = $1 ORDER BY r.created_at DESC");
        Ok(sqlx::query_as::<_, RentalSummary>(&sql)
            .bind(lender_id)
            .fetch_all(&self.pool)
            .await?)
    }

    /// Open rentals past due on `today` where the user is either party
    pub async fn list_overdue(&self, user_id: Uuid, today: NaiveDate) -> RepoResult<Vec<RentalSummary>> {
        let sql = format!(
            r#"{SUMMARY_SELECT}
            WHERE (r.borrower_id = $1 OR r.lender_id = $1)
              AND r.status <> 'returned'
              AND r.due_date < $2
            ORDER BY r.due_date ASC
            "#
        );
        Ok(sqlx::query_as::<_, RentalSummary>(&sql)
            .bind(user_id)
            .bind(today)
            .fetch_all(&self.pool)
            .await?)
    }

    /// The rental currently holding a book, if any
    pub async fn open_for_book(&self, book_id: Uuid) -> RepoResult<Option<BookRental>> {
        let sql = format!(
            "SELECT {RENTAL_COLUMNS} FROM book_rentals r WHERE r.book_id = $1 AND r.status <> 'returned'"
        );
        Ok(sqlx::query_as::<_, BookRental>(&sql)
            .bind(book_id)
            .fetch_optional(&self.pool)
            .await?)
    }

    /// Rentals ever recorded against a book
    pub async fn count_for_book(&self, book_id: Uuid) -> RepoResult<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM book_rentals WHERE book_id = $1")
            .bind(book_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
