use bookshare_backend::api::request::ApiRequest;
use bookshare_backend::api::router::Route;
use bookshare_backend::auth;
use bookshare_backend::error::{AppError, RepositoryError};
use bookshare_backend::models::society::normalize_join_code;
use bookshare_backend::models::*;
use bookshare_backend::pricing::{self, FeeSchedule, PricingError, RentalTerms};
use chrono::NaiveDate;
use hyper::body::Bytes;
use hyper::Method;
use rust_decimal::Decimal;
use tokio_test::{assert_err, assert_ok};
use uuid::Uuid;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn seeded_settings() -> RewardSettings {
    RewardSettings {
        commission_rate: Decimal::new(5, 2),
        security_deposit: Decimal::new(100, 0),
        late_fee_multiplier: Decimal::ONE,
        max_rental_days: 30,
        signup_bonus: 10,
        referral_reward: 5,
        upload_reward: 1,
        rental_completion_reward: 5,
        brocks_per_unit: 10,
        min_redeem_brocks: 100,
        updated_at: chrono::Utc::now().naive_utc(),
    }
}

// ============================================================================
// Rental pricing, start to finish
// ============================================================================

#[test]
fn test_rental_priced_extended_and_returned_late() {
    let schedule = seeded_settings().fee_schedule();
    let start = date(2024, 5, 1);
    let due = date(2024, 5, 8);

    // 12.50/day for a week, 50 Brocks offered
    let quote = pricing::quote_rental(Decimal::new(1250, 2), start, due, 50, &schedule).unwrap();
    assert_eq!(quote.days, 7);
    assert_eq!(quote.rental_fee, Decimal::new(8750, 2));
    assert_eq!(quote.platform_fee, Decimal::new(438, 2));
    assert_eq!(quote.lender_amount, Decimal::new(8312, 2));
    assert_eq!(quote.discount_amount, Decimal::new(5, 0));
    assert_eq!(quote.brocks_used, 50);
    assert_eq!(quote.total_amount, Decimal::new(18250, 2));

    let terms = RentalTerms {
        start_date: start,
        due_date: due,
        rental_fee: quote.rental_fee,
        security_deposit: quote.security_deposit,
    };

    let extension = pricing::quote_extension(&terms, date(2024, 5, 11), &schedule).unwrap();
    assert_eq!(extension.extra_days, 3);
    assert_eq!(extension.extension_fee, Decimal::new(3750, 2));
    assert_eq!(extension.platform_fee, Decimal::new(188, 2));
    assert_eq!(extension.lender_amount, Decimal::new(3562, 2));

    let extended = RentalTerms {
        due_date: date(2024, 5, 11),
        rental_fee: terms.rental_fee + extension.extension_fee,
        ..terms
    };
    assert_eq!(extended.daily_fee().unwrap(), Decimal::new(1250, 2));

    let settlement = pricing::settle_return(&extended, date(2024, 5, 14), &schedule).unwrap();
    assert!(settlement.is_late());
    assert_eq!(settlement.late_days, 3);
    assert_eq!(settlement.late_fee, Decimal::new(3750, 2));
    assert_eq!(settlement.deposit_refund, Decimal::new(6250, 2));
    assert_eq!(settlement.outstanding, Decimal::ZERO);
    assert_eq!(settlement.lender_late_share, Decimal::new(3562, 2));
}

#[test]
fn test_admin_settings_change_pricing() {
    let patch = SettingsUpdate {
        commission_rate: Some(Decimal::new(10, 2)),
        max_rental_days: Some(7),
        ..SettingsUpdate::default()
    };
    let settings = seeded_settings().merged(&patch);
    assert!(settings.validate().is_ok());
    let schedule = settings.fee_schedule();

    let quote = pricing::quote_purchase(Decimal::new(200, 0), &schedule).unwrap();
    assert_eq!(quote.platform_fee, Decimal::new(20, 0));
    assert_eq!(quote.seller_amount, Decimal::new(180, 0));

    let too_long =
        pricing::quote_rental(Decimal::new(5, 0), date(2024, 1, 1), date(2024, 1, 9), 0, &schedule);
    assert!(matches!(too_long, Err(PricingError::PeriodTooLong { requested: 8, max: 7 })));
}

#[test]
fn test_pricing_errors_are_client_errors() {
    let schedule = FeeSchedule::default();
    let err: AppError = pricing::quote_purchase(Decimal::ZERO, &schedule)
        .unwrap_err()
        .into();
    assert_eq!(err.status_code(), 400);
}

// ============================================================================
// Error mapping
// ============================================================================

#[test]
fn test_repository_errors_map_to_http_statuses() {
    let cases = [
        (RepositoryError::NotFound("book".into()), 404),
        (RepositoryError::Duplicate("email".into()), 409),
        (RepositoryError::StaleState("book already lent".into()), 409),
        (RepositoryError::InvalidInput("bad".into()), 400),
        (RepositoryError::BusinessRule("insufficient Brocks".into()), 422),
    ];
    for (repo_err, status) in cases {
        let err: AppError = repo_err.into();
        assert_eq!(err.status_code(), status, "{}", err);
    }
}

#[test]
fn test_internal_errors_are_not_echoed() {
    let err = AppError::Message("connection string leaked".to_string());
    assert_eq!(err.status_code(), 500);
    assert_eq!(err.client_message(), "Internal server error");

    let err = AppError::Conflict("Book is not available".to_string());
    assert!(err.client_message().contains("Book is not available"));
}

// ============================================================================
// Accounts
// ============================================================================

#[test]
fn test_login_credentials_flow() {
    let email = assert_ok!(auth::normalize_email("  Reader@Example.COM "));
    assert_eq!(email, "reader@example.com");

    assert_ok!(auth::validate_password("long-enough"));
    let stored = assert_ok!(auth::hash_password("long-enough"));
    assert!(auth::verify_password("long-enough", &stored));
    assert!(!auth::verify_password("long-enougH", &stored));

    let token = auth::generate_session_token();
    let header = format!("Bearer {}", token);
    let presented = auth::bearer_token(Some(&header)).unwrap();
    assert_eq!(auth::hash_token(presented), auth::hash_token(&token));
}

#[test]
fn test_bad_credentials_rejected() {
    assert_err!(auth::normalize_email("no-at-sign"));
    assert_eq!(auth::validate_password("short").unwrap_err().status_code(), 400);
    assert_eq!(auth::bearer_token(None).unwrap_err().status_code(), 401);
    assert!(!auth::verify_password("anything", "not-a-phc-string"));
}

// ============================================================================
// Listings & rentals
// ============================================================================

#[test]
fn test_book_listing_validation() {
    let details = BookDetails {
        title: "  A Wizard of Earthsea ".to_string(),
        author: "Ursula K. Le Guin".to_string(),
        genre: "Fantasy".to_string(),
        isbn: Some("   ".to_string()),
        description: None,
        image_url: None,
        condition: BookCondition::LikeNew,
        daily_fee: Decimal::new(8, 0),
        selling_price: Some(Decimal::new(250, 0)),
    };
    let details = details.normalized().unwrap();
    assert_eq!(details.title, "A Wizard of Earthsea");
    assert_eq!(details.isbn, None);

    let free = BookDetails {
        daily_fee: Decimal::ZERO,
        ..details
    };
    assert_err!(free.normalized());
}

#[test]
fn test_rental_lifecycle_statuses() {
    use RentalStatus::*;

    assert!(Active.can_transition_to(ReturnRequested));
    assert!(Active.can_transition_to(Returned));
    assert!(ReturnRequested.can_transition_to(Returned));
    assert!(!Returned.can_transition_to(Active));
    assert!(!ReturnRequested.can_transition_to(Active));

    for status in [Active, ReturnRequested, Returned] {
        assert_eq!(RentalStatus::from_str(status.as_str()).unwrap(), status);
    }
}

#[test]
fn test_join_codes() {
    let code = normalize_join_code(" ab12cd").unwrap();
    assert_eq!(code, "AB12CD");
    assert!(normalize_join_code("AB12").is_none());
}

// ============================================================================
// Routing
// ============================================================================

#[test]
fn test_routes_resolve_for_client_calls() {
    let book_id = Uuid::new_v4();
    let society_id = Uuid::new_v4();

    assert_eq!(Route::resolve(&Method::POST, "/api/auth/login"), Some(Route::Login));
    assert_eq!(
        Route::resolve(&Method::GET, &format!("/api/societies/{}/books", society_id)),
        Some(Route::SocietyBooks(society_id))
    );
    assert_eq!(
        Route::resolve(
            &Method::DELETE,
            &format!("/api/books/{}/societies/{}", book_id, society_id)
        ),
        Some(Route::UntagBook { book_id, society_id })
    );
    assert_eq!(Route::resolve(&Method::GET, "/api/books/not-a-uuid"), None);
    assert!(!Route::Me.is_public());
}

#[test]
fn test_shelf_query_parsing() {
    let society_id = Uuid::new_v4();
    let req = ApiRequest::new(
        Route::SocietyBooks(society_id),
        Some("search=le+guin&genre=Fantasy&available=yes"),
        Some("Bearer abc123".to_string()),
        Bytes::new(),
    );

    let filter = req.book_filter().unwrap();
    assert_eq!(filter.search.as_deref(), Some("le guin"));
    assert_eq!(filter.genre.as_deref(), Some("Fantasy"));
    assert!(filter.available_only);
    assert_eq!(req.bearer_token().unwrap(), "abc123");
}
