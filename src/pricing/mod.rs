//! Rental settlement arithmetic.
//!
//! Everything here is a pure function of amounts, dates and a [`FeeSchedule`]
//! snapshot, so the services can price a request before opening a
//! transaction and the formulas can be tested without a database.

pub mod fees;

pub use fees::{
    brocks_to_money, money_to_brocks, quote_extension, quote_purchase, quote_rental,
    rental_days, round_money, settle_return, ExtensionQuote, FeeSchedule, PricingError,
    PricingResult, PurchaseQuote, RentalQuote, RentalTerms, ReturnSettlement,
};
