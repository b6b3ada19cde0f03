use chrono::NaiveDate;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error types for fee calculations
#[derive(Error, Debug, PartialEq, Eq)]
pub enum PricingError {
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Invalid rental period: {0}")]
    InvalidPeriod(String),

    #[error("Rental period of {requested} days exceeds the maximum of {max} days")]
    PeriodTooLong { requested: i64, max: i64 },

    #[error("Invalid fee schedule: {0}")]
    InvalidSchedule(String),

    #[error("Amount out of range")]
    Overflow,
}

pub type PricingResult<T> = Result<T, PricingError>;

/// The subset of reward settings that drives settlement arithmetic
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeSchedule {
    /// Platform share of every fee, 0.05 = 5%
    pub commission_rate: Decimal,
    pub security_deposit: Decimal,
    /// Late fee per overdue day, as a multiple of the daily fee
    pub late_fee_multiplier: Decimal,
    pub max_rental_days: i64,
    /// Brocks that make up one currency unit
    pub brocks_per_unit: i64,
}

impl FeeSchedule {
    pub fn validate(&self) -> PricingResult<()> {
        if self.commission_rate < Decimal::ZERO || self.commission_rate >= Decimal::ONE {
            return Err(PricingError::InvalidSchedule(
                "commission rate must be in [0, 1)".to_string(),
            ));
        }
        if self.security_deposit < Decimal::ZERO {
            return Err(PricingError::InvalidSchedule(
                "security deposit cannot be negative".to_string(),
            ));
        }
        if self.late_fee_multiplier < Decimal::ZERO {
            return Err(PricingError::InvalidSchedule(
                "late fee multiplier cannot be negative".to_string(),
            ));
        }
        if self.max_rental_days < 1 {
            return Err(PricingError::InvalidSchedule(
                "max rental days must be at least 1".to_string(),
            ));
        }
        if self.brocks_per_unit < 1 {
            return Err(PricingError::InvalidSchedule(
                "brocks per unit must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    fn commission_on(&self, amount: Decimal) -> Decimal {
        round_money(amount * self.commission_rate)
    }
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self {
            commission_rate: Decimal::new(5, 2),
            security_deposit: Decimal::new(100, 0),
            late_fee_multiplier: Decimal::ONE,
            max_rental_days: 30,
            brocks_per_unit: 10,
        }
    }
}

/// Date range and money already fixed on a rental, as needed to settle it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RentalTerms {
    pub start_date: NaiveDate,
    pub due_date: NaiveDate,
    pub rental_fee: Decimal,
    pub security_deposit: Decimal,
}

impl RentalTerms {
    /// Daily fee implied by the fee charged over the agreed period
    pub fn daily_fee(&self) -> PricingResult<Decimal> {
        let days = (self.due_date - self.start_date).num_days();
        if days < 1 {
            return Err(PricingError::InvalidPeriod(
                "due date must be after start date".to_string(),
            ));
        }
        Ok(self.rental_fee / Decimal::from(days))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RentalQuote {
    pub days: i64,
    pub rental_fee: Decimal,
    pub platform_fee: Decimal,
    pub lender_amount: Decimal,
    pub security_deposit: Decimal,
    pub discount_amount: Decimal,
    pub brocks_used: i64,
    /// What the borrower pays up front: fee + deposit − Brocks discount
    pub total_amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnSettlement {
    pub late_days: i64,
    pub late_fee: Decimal,
    pub deposit_deduction: Decimal,
    pub deposit_refund: Decimal,
    /// Late fee the deposit could not cover
    pub outstanding: Decimal,
    pub lender_late_share: Decimal,
}

impl ReturnSettlement {
    pub fn is_late(&self) -> bool {
        self.late_days > 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionQuote {
    pub extra_days: i64,
    pub extension_fee: Decimal,
    pub platform_fee: Decimal,
    pub lender_amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseQuote {
    pub price: Decimal,
    pub platform_fee: Decimal,
    pub seller_amount: Decimal,
}

/// Round to cents, halves away from zero
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Whole days between `start` and `due`, bounded by the schedule's maximum
pub fn rental_days(start: NaiveDate, due: NaiveDate, schedule: &FeeSchedule) -> PricingResult<i64> {
    let days = (due - start).num_days();
    if days < 1 {
        return Err(PricingError::InvalidPeriod(
            "due date must be at least one day after start date".to_string(),
        ));
    }
    if days > schedule.max_rental_days {
        return Err(PricingError::PeriodTooLong {
            requested: days,
            max: schedule.max_rental_days,
        });
    }
    Ok(days)
}

/// Currency value of `brocks`, truncated to cents so it never exceeds what the Brocks cover
pub fn brocks_to_money(brocks: i64, schedule: &FeeSchedule) -> Decimal {
    (Decimal::from(brocks) / Decimal::from(schedule.brocks_per_unit))
        .round_dp_with_strategy(2, RoundingStrategy::ToZero)
}

/// Brocks needed to cover `amount`, rounded up
pub fn money_to_brocks(amount: Decimal, schedule: &FeeSchedule) -> PricingResult<i64> {
    (amount * Decimal::from(schedule.brocks_per_unit))
        .ceil()
        .to_i64()
        .ok_or(PricingError::Overflow)
}

pub fn quote_rental(
    daily_fee: Decimal,
    start: NaiveDate,
    due: NaiveDate,
    brocks_offered: i64,
    schedule: &FeeSchedule,
) -> PricingResult<RentalQuote> {
    if daily_fee <= Decimal::ZERO {
        return Err(PricingError::InvalidAmount("daily fee must be positive".to_string()));
    }
    if brocks_offered < 0 {
        return Err(PricingError::InvalidAmount("Brocks offered cannot be negative".to_string()));
    }

    let days = rental_days(start, due, schedule)?;
    let rental_fee = round_money(daily_fee * Decimal::from(days));
    let platform_fee = schedule.commission_on(rental_fee);
    let discount_amount = brocks_to_money(brocks_offered, schedule).min(rental_fee);
    let brocks_used = money_to_brocks(discount_amount, schedule)?;

    Ok(RentalQuote {
        days,
        rental_fee,
        platform_fee,
        lender_amount: rental_fee - platform_fee,
        security_deposit: schedule.security_deposit,
        discount_amount,
        brocks_used,
        total_amount: rental_fee + schedule.security_deposit - discount_amount,
    })
}

pub fn settle_return(
    terms: &RentalTerms,
    returned_on: NaiveDate,
    schedule: &FeeSchedule,
) -> PricingResult<ReturnSettlement> {
    if returned_on < terms.start_date {
        return Err(PricingError::InvalidPeriod(
            "return date precedes the rental start".to_string(),
        ));
    }

    let late_days = (returned_on - terms.due_date).num_days().max(0);
    let late_fee = round_money(
        terms.daily_fee()? * schedule.late_fee_multiplier * Decimal::from(late_days),
    );
    let deposit_deduction = late_fee.min(terms.security_deposit);

    Ok(ReturnSettlement {
        late_days,
        late_fee,
        deposit_deduction,
        deposit_refund: terms.security_deposit - deposit_deduction,
        outstanding: late_fee - deposit_deduction,
        lender_late_share: deposit_deduction - schedule.commission_on(deposit_deduction),
    })
}

pub fn quote_extension(
    terms: &RentalTerms,
    new_due: NaiveDate,
    schedule: &FeeSchedule,
) -> PricingResult<ExtensionQuote> {
    let extra_days = (new_due - terms.due_date).num_days();
    if extra_days < 1 {
        return Err(PricingError::InvalidPeriod(
            "new due date must be after the current due date".to_string(),
        ));
    }
    rental_days(terms.start_date, new_due, schedule)?;

    let extension_fee = round_money(terms.daily_fee()? * Decimal::from(extra_days));
    let platform_fee = schedule.commission_on(extension_fee);

    Ok(ExtensionQuote {
        extra_days,
        extension_fee,
        platform_fee,
        lender_amount: extension_fee - platform_fee,
    })
}

pub fn quote_purchase(price: Decimal, schedule: &FeeSchedule) -> PricingResult<PurchaseQuote> {
    if price <= Decimal::ZERO {
        return Err(PricingError::InvalidAmount("price must be positive".to_string()));
    }
    let platform_fee = schedule.commission_on(price);
    Ok(PurchaseQuote {
        price,
        platform_fee,
        seller_amount: price - platform_fee,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn week_terms() -> RentalTerms {
        RentalTerms {
            start_date: date(2024, 3, 1),
            due_date: date(2024, 3, 8),
            rental_fee: Decimal::new(70, 0),
            security_deposit: Decimal::new(100, 0),
        }
    }

    #[test]
    fn test_quote_rental_without_brocks() {
        let schedule = FeeSchedule::default();
        let quote =
            quote_rental(Decimal::new(10, 0), date(2024, 3, 1), date(2024, 3, 8), 0, &schedule)
                .unwrap();

        assert_eq!(quote.days, 7);
        assert_eq!(quote.rental_fee, Decimal::new(70, 0));
        assert_eq!(quote.platform_fee, Decimal::new(350, 2));
        assert_eq!(quote.lender_amount, Decimal::new(6650, 2));
        assert_eq!(quote.total_amount, Decimal::new(170, 0));
        assert_eq!(quote.brocks_used, 0);
    }

    #[test]
    fn test_quote_rental_applies_brocks_discount() {
        let schedule = FeeSchedule::default();
        let quote =
            quote_rental(Decimal::new(10, 0), date(2024, 3, 1), date(2024, 3, 8), 250, &schedule)
                .unwrap();

        assert_eq!(quote.discount_amount, Decimal::new(25, 0));
        assert_eq!(quote.brocks_used, 250);
        assert_eq!(quote.total_amount, Decimal::new(145, 0));
    }

    #[test]
    fn test_brocks_discount_capped_at_rental_fee() {
        let schedule = FeeSchedule::default();
        let quote =
            quote_rental(Decimal::new(10, 0), date(2024, 3, 1), date(2024, 3, 8), 5_000, &schedule)
                .unwrap();

        assert_eq!(quote.discount_amount, Decimal::new(70, 0));
        assert_eq!(quote.brocks_used, 700);
        // Deposit is never discounted
        assert_eq!(quote.total_amount, Decimal::new(100, 0));
    }

    #[test]
    fn test_brocks_used_never_exceeds_offer() {
        let schedule = FeeSchedule {
            brocks_per_unit: 3,
            ..FeeSchedule::default()
        };
        let quote =
            quote_rental(Decimal::new(10, 0), date(2024, 3, 1), date(2024, 3, 2), 1, &schedule)
                .unwrap();

        assert_eq!(quote.discount_amount, Decimal::new(33, 2));
        assert_eq!(quote.brocks_used, 1);
    }

    #[test]
    fn test_rental_period_bounds() {
        let schedule = FeeSchedule::default();
        assert!(matches!(
            rental_days(date(2024, 3, 8), date(2024, 3, 8), &schedule),
            Err(PricingError::InvalidPeriod(_))
        ));
        assert_eq!(
            rental_days(date(2024, 3, 1), date(2024, 4, 5), &schedule),
            Err(PricingError::PeriodTooLong { requested: 35, max: 30 })
        );
        assert_eq!(rental_days(date(2024, 3, 1), date(2024, 3, 31), &schedule), Ok(30));
    }

    #[test]
    fn test_quote_rental_rejects_bad_input() {
        let schedule = FeeSchedule::default();
        assert!(quote_rental(Decimal::ZERO, date(2024, 3, 1), date(2024, 3, 8), 0, &schedule).is_err());
        assert!(
            quote_rental(Decimal::new(10, 0), date(2024, 3, 1), date(2024, 3, 8), -5, &schedule)
                .is_err()
        );
    }

    #[test]
    fn test_on_time_return_refunds_deposit() {
        let settlement =
            settle_return(&week_terms(), date(2024, 3, 8), &FeeSchedule::default()).unwrap();

        assert!(!settlement.is_late());
        assert_eq!(settlement.late_fee, Decimal::ZERO);
        assert_eq!(settlement.deposit_refund, Decimal::new(100, 0));
        assert_eq!(settlement.outstanding, Decimal::ZERO);
    }

    #[test]
    fn test_early_return_is_not_late() {
        let settlement =
            settle_return(&week_terms(), date(2024, 3, 4), &FeeSchedule::default()).unwrap();
        assert_eq!(settlement.late_days, 0);
        assert_eq!(settlement.deposit_refund, Decimal::new(100, 0));
    }

    #[test]
    fn test_late_return_deducts_from_deposit() {
        let settlement =
            settle_return(&week_terms(), date(2024, 3, 11), &FeeSchedule::default()).unwrap();

        assert_eq!(settlement.late_days, 3);
        assert_eq!(settlement.late_fee, Decimal::new(30, 0));
        assert_eq!(settlement.deposit_deduction, Decimal::new(30, 0));
        assert_eq!(settlement.deposit_refund, Decimal::new(70, 0));
        assert_eq!(settlement.lender_late_share, Decimal::new(2850, 2));
    }

    #[test]
    fn test_late_fee_beyond_deposit_is_outstanding() {
        let settlement =
            settle_return(&week_terms(), date(2024, 3, 23), &FeeSchedule::default()).unwrap();

        assert_eq!(settlement.late_fee, Decimal::new(150, 0));
        assert_eq!(settlement.deposit_refund, Decimal::ZERO);
        assert_eq!(settlement.outstanding, Decimal::new(50, 0));
    }

    #[test]
    fn test_late_fee_multiplier() {
        let schedule = FeeSchedule {
            late_fee_multiplier: Decimal::new(15, 1),
            ..FeeSchedule::default()
        };
        let settlement = settle_return(&week_terms(), date(2024, 3, 10), &schedule).unwrap();
        assert_eq!(settlement.late_fee, Decimal::new(30, 0));
    }

    #[test]
    fn test_return_before_start_rejected() {
        assert!(settle_return(&week_terms(), date(2024, 2, 28), &FeeSchedule::default()).is_err());
    }

    #[test]
    fn test_quote_extension() {
        let quote =
            quote_extension(&week_terms(), date(2024, 3, 11), &FeeSchedule::default()).unwrap();

        assert_eq!(quote.extra_days, 3);
        assert_eq!(quote.extension_fee, Decimal::new(30, 0));
        assert_eq!(quote.platform_fee, Decimal::new(150, 2));
        assert_eq!(quote.lender_amount, Decimal::new(2850, 2));
    }

    #[test]
    fn test_extension_limits() {
        let schedule = FeeSchedule::default();
        assert!(quote_extension(&week_terms(), date(2024, 3, 8), &schedule).is_err());
        assert!(matches!(
            quote_extension(&week_terms(), date(2024, 4, 2), &schedule),
            Err(PricingError::PeriodTooLong { .. })
        ));
    }

    #[test]
    fn test_quote_purchase() {
        let quote = quote_purchase(Decimal::new(250, 0), &FeeSchedule::default()).unwrap();
        assert_eq!(quote.platform_fee, Decimal::new(1250, 2));
        assert_eq!(quote.seller_amount, Decimal::new(23750, 2));
        assert!(quote_purchase(Decimal::ZERO, &FeeSchedule::default()).is_err());
    }

    #[test]
    fn test_brocks_conversion() {
        let schedule = FeeSchedule::default();
        assert_eq!(brocks_to_money(125, &schedule), Decimal::new(1250, 2));
        assert_eq!(money_to_brocks(Decimal::new(1251, 2), &schedule), Ok(126));
    }

    #[test]
    fn test_schedule_validation() {
        assert!(FeeSchedule::default().validate().is_ok());
        let bad = FeeSchedule {
            commission_rate: Decimal::ONE,
            ..FeeSchedule::default()
        };
        assert!(bad.validate().is_err());
        let bad = FeeSchedule {
            brocks_per_unit: 0,
            ..FeeSchedule::default()
        };
        assert!(bad.validate().is_err());
    }
}
