use crate::pricing::RentalTerms;
use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Rental lifecycle. Transitions only move forward:
/// `active -> return_requested -> returned`, or `active -> returned` when the
/// lender confirms a hand-back the borrower never flagged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RentalStatus {
    Active,
    ReturnRequested,
    Returned,
}

impl RentalStatus {
    pub fn from_str(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "active" => Ok(RentalStatus::Active),
            "return_requested" => Ok(RentalStatus::ReturnRequested),
            "returned" => Ok(RentalStatus::Returned),
            _ => Err(format!("Invalid rental status: {}", s)),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RentalStatus::Active => "active",
            RentalStatus::ReturnRequested => "return_requested",
            RentalStatus::Returned => "returned",
        }
    }

    pub fn can_transition_to(&self, next: RentalStatus) -> bool {
        matches!(
            (self, next),
            (RentalStatus::Active, RentalStatus::ReturnRequested)
                | (RentalStatus::Active, RentalStatus::Returned)
                | (RentalStatus::ReturnRequested, RentalStatus::Returned)
        )
    }

    /// Whether the rental still holds the book
    pub fn is_open(&self) -> bool {
        !matches!(self, RentalStatus::Returned)
    }
}

impl From<RentalStatus> for String {
    fn from(status: RentalStatus) -> Self {
        status.as_str().to_string()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct BookRental {
    pub id: Uuid,
    pub book_id: Uuid,
    pub borrower_id: Uuid,
    pub lender_id: Uuid,
    pub society_id: Uuid,
    pub start_date: NaiveDate,
    pub due_date: NaiveDate,
    pub returned_date: Option<NaiveDate>,
    /// Day the borrower flagged the hand-back; late days stop accruing here
    pub return_requested_on: Option<NaiveDate>,
    pub rental_fee: Decimal,
    pub platform_fee: Decimal,
    pub lender_amount: Decimal,
    pub security_deposit: Decimal,
    pub brocks_used: i64,
    pub discount_amount: Decimal,
    pub total_amount: Decimal,
    pub late_fee: Option<Decimal>,
    pub deposit_refund: Option<Decimal>,
    pub status: String, // Stored as TEXT, use RentalStatus for type safety
    pub created_at: NaiveDateTime,
}

impl BookRental {
    pub fn status_enum(&self) -> RentalStatus {
        // Unknown values are treated as closed so they can never be advanced
        RentalStatus::from_str(&self.status).unwrap_or(RentalStatus::Returned)
    }

    pub fn is_party(&self, user_id: Uuid) -> bool {
        self.borrower_id == user_id || self.lender_id == user_id
    }

    pub fn is_overdue_on(&self, today: NaiveDate) -> bool {
        self.status_enum().is_open() && today > self.due_date
    }

    /// Date a return confirmed on `confirmed_on` is settled against.
    /// Capped at the borrower's return request, never before the start.
    pub fn settlement_date(&self, confirmed_on: NaiveDate) -> NaiveDate {
        match self.return_requested_on {
            Some(requested) => confirmed_on.min(requested.max(self.start_date)),
            None => confirmed_on,
        }
    }

    pub fn terms(&self) -> RentalTerms {
        RentalTerms {
            start_date: self.start_date,
            due_date: self.due_date,
            rental_fee: self.rental_fee,
            security_deposit: self.security_deposit,
        }
    }
}

/// Rental row joined with the book title for list views
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RentalSummary {
    pub id: Uuid,
    pub book_id: Uuid,
    pub book_title: String,
    pub borrower_id: Uuid,
    pub borrower_name: String,
    pub lender_id: Uuid,
    pub lender_name: String,
    pub start_date: NaiveDate,
    pub due_date: NaiveDate,
    pub returned_date: Option<NaiveDate>,
    pub total_amount: Decimal,
    pub status: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_transitions_only_move_forward() {
        use RentalStatus::*;
        assert!(Active.can_transition_to(ReturnRequested));
        assert!(Active.can_transition_to(Returned));
        assert!(ReturnRequested.can_transition_to(Returned));

        assert!(!ReturnRequested.can_transition_to(Active));
        assert!(!Returned.can_transition_to(Active));
        assert!(!Returned.can_transition_to(ReturnRequested));
        assert!(!Active.can_transition_to(Active));
    }

    #[test]
    fn test_status_strings() {
        for status in [RentalStatus::Active, RentalStatus::ReturnRequested, RentalStatus::Returned] {
            assert_eq!(RentalStatus::from_str(status.as_str()).unwrap(), status);
        }
        assert!(RentalStatus::from_str("lost").is_err());
    }

    fn rental(start: NaiveDate, due: NaiveDate, requested: Option<NaiveDate>) -> BookRental {
        BookRental {
            id: Uuid::new_v4(),
            book_id: Uuid::new_v4(),
            borrower_id: Uuid::new_v4(),
            lender_id: Uuid::new_v4(),
            society_id: Uuid::new_v4(),
            start_date: start,
            due_date: due,
            returned_date: None,
            return_requested_on: requested,
            rental_fee: Decimal::new(30, 0),
            platform_fee: Decimal::new(150, 2),
            lender_amount: Decimal::new(2850, 2),
            security_deposit: Decimal::new(100, 0),
            brocks_used: 0,
            discount_amount: Decimal::ZERO,
            total_amount: Decimal::new(130, 0),
            late_fee: None,
            deposit_refund: None,
            status: "return_requested".to_string(),
            created_at: chrono::Utc::now().naive_utc(),
        }
    }

    #[test]
    fn test_settlement_date_stops_at_return_request() {
        let day = |d| NaiveDate::from_ymd_opt(2024, 6, d).unwrap();

        // Flagged on the due date, confirmed four days later
        let flagged = rental(day(1), day(4), Some(day(4)));
        assert_eq!(flagged.settlement_date(day(8)), day(4));
        assert_eq!(flagged.settlement_date(day(3)), day(3));

        let unflagged = rental(day(1), day(4), None);
        assert_eq!(unflagged.settlement_date(day(8)), day(8));

        // A request logged before a future start settles on the start
        let early = rental(day(10), day(14), Some(day(2)));
        assert_eq!(early.settlement_date(day(20)), day(10));
    }

    #[test]
    fn test_open_status() {
        assert!(RentalStatus::Active.is_open());
        assert!(RentalStatus::ReturnRequested.is_open());
        assert!(!RentalStatus::Returned.is_open());
    }
}
