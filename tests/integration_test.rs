mod helpers;

use bookshare_backend::error::AppError;
use bookshare_backend::models::*;
use bookshare_backend::services::*;
use chrono::Duration;
use helpers::*;
use rust_decimal::Decimal;
use sqlx::PgPool;

/// Register → login → authenticate → logout
#[sqlx::test]
#[ignore = "requires a running PostgreSQL instance (DATABASE_URL)"]
async fn test_account_lifecycle(pool: PgPool) {
    let db = TestDatabase::from_pool(pool).await;
    let auth = &db.state.auth_service;

    let session = register_user(&db, "alice").await;
    assert_eq!(session.user.email, "alice@example.com");
    assert_eq!(balance(&db, session.user.id).await, 10);

    let duplicate = auth
        .register(RegisterRequest {
            email: "ALICE@example.com".to_string(),
            name: "Alice Again".to_string(),
            password: TEST_PASSWORD.to_string(),
            phone: None,
            referral_code: None,
        })
        .await;
    assert!(matches!(duplicate, Err(AppError::Conflict(_))));

    let wrong = auth.login("alice@example.com", "not-the-password").await;
    assert!(matches!(wrong, Err(AppError::Unauthorized(_))));

    let login = auth
        .login("alice@example.com", TEST_PASSWORD)
        .await
        .expect("login failed");
    let user = auth.authenticate(&login.token).await.expect("token rejected");
    assert_eq!(user.id, session.user.id);

    auth.logout(&login.token).await.unwrap();
    assert!(matches!(
        auth.authenticate(&login.token).await,
        Err(AppError::Unauthorized(_))
    ));
    // The registration session is independent
    assert!(auth.authenticate(&session.token).await.is_ok());
}

#[sqlx::test]
#[ignore = "requires a running PostgreSQL instance (DATABASE_URL)"]
async fn test_referral_rewards_referrer(pool: PgPool) {
    let db = TestDatabase::from_pool(pool).await;
    let referrer = register_user(&db, "referrer").await;

    // Codes match case-insensitively
    let newcomer = db
        .state
        .auth_service
        .register(RegisterRequest {
            email: "newcomer@example.com".to_string(),
            name: "Newcomer".to_string(),
            password: TEST_PASSWORD.to_string(),
            phone: None,
            referral_code: Some(referrer.user.referral_code.to_lowercase()),
        })
        .await
        .expect("registration with referral failed");

    assert_eq!(balance(&db, newcomer.user.id).await, 10);
    assert_eq!(balance(&db, referrer.user.id).await, 15);

    let unknown = db
        .state
        .auth_service
        .register(RegisterRequest {
            email: "stranger@example.com".to_string(),
            name: "Stranger".to_string(),
            password: TEST_PASSWORD.to_string(),
            phone: None,
            referral_code: Some("NOSUCHCD".to_string()),
        })
        .await;
    assert!(matches!(unknown, Err(AppError::Validation(_))));
}

/// List → borrow → request return → confirm return
#[sqlx::test]
#[ignore = "requires a running PostgreSQL instance (DATABASE_URL)"]
async fn test_rental_flow(pool: PgPool) {
    let db = TestDatabase::from_pool(pool).await;
    let fx = TestFixtures::create(&db).await;
    let owner = fx.owner.user.id;
    let borrower = fx.borrower.user.id;

    let book = list_book(&db, owner, &fx.society, "A Wizard of Earthsea").await;
    assert_eq!(balance(&db, owner).await, 11);

    let rentals = &db.state.rental_service;
    let rental = rentals
        .borrow(borrower, borrow_request(&book, &fx.society, 7, 0))
        .await
        .expect("borrow failed");
    assert_eq!(rental.status_enum(), RentalStatus::Active);
    assert_eq!(rental.rental_fee, Decimal::new(70, 0));
    assert_eq!(rental.total_amount, Decimal::new(170, 0));
    assert_eq!(rental.lender_id, owner);

    let shelved = db.book_repo.find_by_id(book.id).await.unwrap().unwrap();
    assert!(!shelved.is_available);

    // Lender was told
    let notes = db.state.notification_service.list(owner, true, None).await.unwrap();
    assert!(notes
        .iter()
        .any(|n| n.kind == NotificationKind::RentalRequested.as_str() && n.reference_id == Some(rental.id)));

    // Only the borrower may flag a return, only the lender may confirm
    assert!(matches!(
        rentals.request_return(owner, rental.id).await,
        Err(AppError::Forbidden(_))
    ));
    let rental = rentals.request_return(borrower, rental.id).await.unwrap();
    assert_eq!(rental.status_enum(), RentalStatus::ReturnRequested);
    assert!(matches!(
        rentals.confirm_return(borrower, rental.id, None).await,
        Err(AppError::Forbidden(_))
    ));

    let receipt = rentals.confirm_return(owner, rental.id, None).await.unwrap();
    assert_eq!(receipt.rental.status_enum(), RentalStatus::Returned);
    assert!(!receipt.settlement.is_late());
    assert_eq!(receipt.settlement.deposit_refund, Decimal::new(100, 0));

    // Back on the shelf, and both parties rewarded
    assert!(db.book_repo.find_by_id(book.id).await.unwrap().unwrap().is_available);
    assert_eq!(balance(&db, owner).await, 16);
    assert_eq!(balance(&db, borrower).await, 15);

    // Returned rentals never move again
    assert!(matches!(
        rentals.confirm_return(owner, rental.id, None).await,
        Err(AppError::Conflict(_))
    ));

    let lent = rentals.list_lent(owner).await.unwrap();
    assert_eq!(lent.len(), 1);
}

#[sqlx::test]
#[ignore = "requires a running PostgreSQL instance (DATABASE_URL)"]
async fn test_book_cannot_be_borrowed_twice(pool: PgPool) {
    let db = TestDatabase::from_pool(pool).await;
    let fx = TestFixtures::create(&db).await;
    let third = register_user(&db, "third").await;
    join_society(&db, third.user.id, &fx.society).await;

    let book = list_book(&db, fx.owner.user.id, &fx.society, "The Left Hand of Darkness").await;
    let rentals = &db.state.rental_service;

    rentals
        .borrow(fx.borrower.user.id, borrow_request(&book, &fx.society, 5, 0))
        .await
        .expect("first borrow failed");

    let second = rentals
        .borrow(third.user.id, borrow_request(&book, &fx.society, 5, 0))
        .await;
    assert!(matches!(second, Err(AppError::Conflict(_))));

    let own = rentals
        .borrow(fx.owner.user.id, borrow_request(&book, &fx.society, 5, 0))
        .await;
    assert!(own.is_err());
}

#[sqlx::test]
#[ignore = "requires a running PostgreSQL instance (DATABASE_URL)"]
async fn test_borrow_with_brocks_is_atomic(pool: PgPool) {
    let db = TestDatabase::from_pool(pool).await;
    let fx = TestFixtures::create(&db).await;
    let borrower = fx.borrower.user.id;
    let book = list_book(&db, fx.owner.user.id, &fx.society, "Tehanu").await;
    let rentals = &db.state.rental_service;

    // 50 Brocks offered, only 10 held: nothing may change
    let overspend = rentals
        .borrow(borrower, borrow_request(&book, &fx.society, 7, 50))
        .await;
    assert!(matches!(overspend, Err(AppError::BusinessLogic(_))));
    assert_eq!(balance(&db, borrower).await, 10);
    assert!(db.book_repo.find_by_id(book.id).await.unwrap().unwrap().is_available);
    assert!(rentals.list_borrowed(borrower).await.unwrap().is_empty());

    let rental = rentals
        .borrow(borrower, borrow_request(&book, &fx.society, 7, 10))
        .await
        .expect("discounted borrow failed");
    assert_eq!(rental.brocks_used, 10);
    assert_eq!(rental.discount_amount, Decimal::new(1, 0));
    assert_eq!(rental.total_amount, Decimal::new(169, 0));
    assert_eq!(balance(&db, borrower).await, 0);
}

/// Shift a rental's dates back by `days`, as if it had been borrowed earlier
async fn backdate_rental(db: &TestDatabase, rental_id: uuid::Uuid, days: i32) {
    sqlx::query(
        r#"
        UPDATE book_rentals
        SET start_date = start_date - $2,
            due_date = due_date - $2,
            return_requested_on = return_requested_on - $2
        WHERE id = $1
        "#,
    )
    .bind(rental_id)
    .bind(days)
    .execute(&db.pool)
    .await
    .expect("Failed to backdate rental");
}

#[sqlx::test]
#[ignore = "requires a running PostgreSQL instance (DATABASE_URL)"]
async fn test_late_return_is_settled(pool: PgPool) {
    let db = TestDatabase::from_pool(pool).await;
    let fx = TestFixtures::create(&db).await;
    let book = list_book(&db, fx.owner.user.id, &fx.society, "The Tombs of Atuan").await;
    let rentals = &db.state.rental_service;

    let rental = rentals
        .borrow(fx.borrower.user.id, borrow_request(&book, &fx.society, 3, 0))
        .await
        .unwrap();
    // Borrowed five days ago for three days: two days late today
    backdate_rental(&db, rental.id, 5).await;

    let receipt = rentals
        .confirm_return(fx.owner.user.id, rental.id, None)
        .await
        .unwrap();

    assert!(receipt.settlement.is_late());
    assert_eq!(receipt.settlement.late_days, 2);
    assert_eq!(receipt.settlement.late_fee, Decimal::new(20, 0));
    assert_eq!(receipt.settlement.deposit_refund, Decimal::new(80, 0));
    assert_eq!(receipt.rental.returned_date, Some(today()));
    assert_eq!(receipt.rental.late_fee, Some(receipt.settlement.late_fee));
}

#[sqlx::test]
#[ignore = "requires a running PostgreSQL instance (DATABASE_URL)"]
async fn test_future_return_date_rejected(pool: PgPool) {
    let db = TestDatabase::from_pool(pool).await;
    let fx = TestFixtures::create(&db).await;
    let book = list_book(&db, fx.owner.user.id, &fx.society, "The Lathe of Heaven").await;
    let rentals = &db.state.rental_service;

    let rental = rentals
        .borrow(fx.borrower.user.id, borrow_request(&book, &fx.society, 3, 0))
        .await
        .unwrap();

    let result = rentals
        .confirm_return(fx.owner.user.id, rental.id, Some(today() + Duration::days(30)))
        .await;
    assert!(matches!(result, Err(AppError::Validation(_))));

    let rental = rentals.get(fx.owner.user.id, rental.id).await.unwrap();
    assert_eq!(rental.status_enum(), RentalStatus::Active);
    assert!(rental.late_fee.is_none());
    assert!(!db.book_repo.find_by_id(book.id).await.unwrap().unwrap().is_available);
}

#[sqlx::test]
#[ignore = "requires a running PostgreSQL instance (DATABASE_URL)"]
async fn test_late_days_stop_at_return_request(pool: PgPool) {
    let db = TestDatabase::from_pool(pool).await;
    let fx = TestFixtures::create(&db).await;
    let book = list_book(&db, fx.owner.user.id, &fx.society, "The Word for World Is Forest").await;
    let rentals = &db.state.rental_service;

    let rental = rentals
        .borrow(fx.borrower.user.id, borrow_request(&book, &fx.society, 3, 0))
        .await
        .unwrap();
    let rental = rentals.request_return(fx.borrower.user.id, rental.id).await.unwrap();
    assert_eq!(rental.return_requested_on, Some(today()));

    // Flagged on the due date, confirmed by the lender ten days later
    backdate_rental(&db, rental.id, 10).await;
    sqlx::query("UPDATE book_rentals SET return_requested_on = due_date WHERE id = $1")
        .bind(rental.id)
        .execute(&db.pool)
        .await
        .unwrap();

    let receipt = rentals
        .confirm_return(fx.owner.user.id, rental.id, None)
        .await
        .unwrap();

    assert!(!receipt.settlement.is_late());
    assert_eq!(receipt.settlement.late_fee, Decimal::ZERO);
    assert_eq!(receipt.settlement.deposit_refund, Decimal::new(100, 0));
    assert_eq!(receipt.rental.returned_date, receipt.rental.return_requested_on);
}

#[sqlx::test]
#[ignore = "requires a running PostgreSQL instance (DATABASE_URL)"]
async fn test_availability_toggle_cannot_free_rented_book(pool: PgPool) {
    let db = TestDatabase::from_pool(pool).await;
    let fx = TestFixtures::create(&db).await;
    let owner = fx.owner.user.id;
    let borrower = fx.borrower.user.id;
    let books = &db.state.book_service;
    let rentals = &db.state.rental_service;

    let book = list_book(&db, owner, &fx.society, "Four Ways to Forgiveness").await;
    rentals
        .borrow(borrower, borrow_request(&book, &fx.society, 3, 0))
        .await
        .unwrap();
    assert!(matches!(
        books.set_availability(owner, book.id, true).await,
        Err(AppError::Conflict(_))
    ));
    assert!(!db.book_repo.find_by_id(book.id).await.unwrap().unwrap().is_available);

    // Toggle racing the borrow must never leave a rented book on the shelf
    for i in 0..20 {
        let book = list_book(&db, owner, &fx.society, &format!("Volume {}", i)).await;
        let _ = tokio::join!(
            rentals.borrow(borrower, borrow_request(&book, &fx.society, 3, 0)),
            books.set_availability(owner, book.id, true),
        );
    }

    let (leaked,): (i64,) = sqlx::query_as(
        r#"
        SELECT COUNT(*)
        FROM books b
        JOIN book_rentals r ON r.book_id = b.id
        WHERE r.status <> 'returned' AND b.is_available
        "#,
    )
    .fetch_one(&db.pool)
    .await
    .unwrap();
    assert_eq!(leaked, 0);
}

#[sqlx::test]
#[ignore = "requires a running PostgreSQL instance (DATABASE_URL)"]
async fn test_books_stay_inside_society_boundary(pool: PgPool) {
    let db = TestDatabase::from_pool(pool).await;
    let fx = TestFixtures::create(&db).await;
    let owner = fx.owner.user.id;
    let outsider = register_user(&db, "outsider").await.user.id;

    let listing = db
        .state
        .book_service
        .create_book(
            owner,
            book_details("Searoad", Decimal::new(5, 0), Some(Decimal::new(50, 0))),
            vec![fx.society.id],
        )
        .await
        .unwrap();
    let book_id = listing.book.id;
    let books = &db.state.book_service;

    assert!(matches!(books.get_book(outsider, book_id).await, Err(AppError::Forbidden(_))));
    assert!(matches!(
        db.state.purchase_service.purchase(outsider, book_id).await,
        Err(AppError::Forbidden(_))
    ));
    assert!(db.book_repo.find_by_id(book_id).await.unwrap().unwrap().is_available);

    assert_eq!(books.get_book(owner, book_id).await.unwrap().book.id, book_id);
    assert_eq!(books.get_book(fx.borrower.user.id, book_id).await.unwrap().book.id, book_id);

    // Joining the society opens the listing
    join_society(&db, outsider, &fx.society).await;
    assert!(books.get_book(outsider, book_id).await.is_ok());
}

#[sqlx::test]
#[ignore = "requires a running PostgreSQL instance (DATABASE_URL)"]
async fn test_extension_approval_moves_due_date(pool: PgPool) {
    let db = TestDatabase::from_pool(pool).await;
    let fx = TestFixtures::create(&db).await;
    let owner = fx.owner.user.id;
    let borrower = fx.borrower.user.id;
    let book = list_book(&db, owner, &fx.society, "The Farthest Shore").await;

    let rental = db
        .state
        .rental_service
        .borrow(borrower, borrow_request(&book, &fx.society, 7, 0))
        .await
        .unwrap();

    let extensions = &db.state.extension_service;
    let new_due = rental.due_date + Duration::days(3);
    let request = extensions
        .request_extension(
            borrower,
            rental.id,
            ExtensionRequestBody {
                new_due_date: new_due,
                reason: Some("  Exams  ".to_string()),
            },
        )
        .await
        .expect("extension request failed");
    assert!(request.is_pending());
    assert_eq!(request.extra_days, 3);
    assert_eq!(request.extension_fee, Decimal::new(30, 0));
    assert_eq!(request.reason.as_deref(), Some("Exams"));

    // One pending request per rental
    let again = extensions
        .request_extension(
            borrower,
            rental.id,
            ExtensionRequestBody {
                new_due_date: new_due + Duration::days(1),
                reason: None,
            },
        )
        .await;
    assert!(matches!(again, Err(AppError::Conflict(_))));

    assert_eq!(extensions.pending_for_lender(owner).await.unwrap().len(), 1);
    assert!(matches!(
        extensions.approve(borrower, request.id).await,
        Err(AppError::Forbidden(_))
    ));

    let decision = extensions.approve(owner, request.id).await.unwrap();
    assert_eq!(decision.request.status_enum(), ExtensionStatus::Approved);
    let extended = decision.rental.expect("approved decision carries the rental");
    assert_eq!(extended.due_date, new_due);

    // Decided requests cannot be decided again
    assert!(matches!(
        extensions.decline(owner, request.id).await,
        Err(AppError::Conflict(_))
    ));
    assert!(extensions.pending_for_lender(owner).await.unwrap().is_empty());
}

#[sqlx::test]
#[ignore = "requires a running PostgreSQL instance (DATABASE_URL)"]
async fn test_purchase_transfers_ownership(pool: PgPool) {
    let db = TestDatabase::from_pool(pool).await;
    let fx = TestFixtures::create(&db).await;
    let owner = fx.owner.user.id;
    let buyer = fx.borrower.user.id;

    let listing = db
        .state
        .book_service
        .create_book(
            owner,
            book_details("Always Coming Home", Decimal::new(5, 0), Some(Decimal::new(200, 0))),
            vec![fx.society.id],
        )
        .await
        .unwrap();
    let book_id = listing.book.id;

    let purchases = &db.state.purchase_service;
    assert!(matches!(
        purchases.purchase(owner, book_id).await,
        Err(AppError::Validation(_))
    ));

    let purchase = purchases.purchase(buyer, book_id).await.expect("purchase failed");
    assert_eq!(purchase.seller_id, owner);
    assert_eq!(purchase.price, Decimal::new(200, 0));
    assert_eq!(purchase.platform_fee, Decimal::new(10, 0));
    assert_eq!(purchase.seller_amount, Decimal::new(190, 0));

    let book = db.book_repo.find_by_id(book_id).await.unwrap().unwrap();
    assert_eq!(book.owner_id, buyer);
    assert!(!book.is_available);
    assert!(book.selling_price.is_none());
    assert!(db.book_repo.society_ids(book_id).await.unwrap().is_empty());

    assert_eq!(purchases.list_for_user(owner).await.unwrap().len(), 1);
    assert_eq!(purchases.list_for_user(buyer).await.unwrap().len(), 1);

    // A sold book cannot be deleted
    assert!(matches!(
        db.state.book_service.delete_book(buyer, book_id).await,
        Err(AppError::Conflict(_))
    ));
}

#[sqlx::test]
#[ignore = "requires a running PostgreSQL instance (DATABASE_URL)"]
async fn test_direct_messages(pool: PgPool) {
    let db = TestDatabase::from_pool(pool).await;
    let fx = TestFixtures::create(&db).await;
    let chat = &db.state.chat_service;
    let owner = fx.owner.user.id;
    let borrower = fx.borrower.user.id;

    chat.send(borrower, owner, "Is the book still free?", Some(fx.society.id))
        .await
        .unwrap();
    chat.send(borrower, owner, "Happy to pick it up today", None)
        .await
        .unwrap();
    assert!(matches!(
        chat.send(owner, owner, "note to self", None).await,
        Err(AppError::Validation(_))
    ));

    assert_eq!(chat.unread_count(owner).await.unwrap(), 2);
    let conversations = chat.conversations(owner).await.unwrap();
    assert_eq!(conversations.len(), 1);

    let thread = chat.conversation(owner, borrower, None).await.unwrap();
    assert_eq!(thread.len(), 2);
    assert_eq!(thread[0].content, "Is the book still free?");

    assert_eq!(chat.mark_read(owner, borrower).await.unwrap(), 2);
    assert_eq!(chat.unread_count(owner).await.unwrap(), 0);
}

#[sqlx::test]
#[ignore = "requires a running PostgreSQL instance (DATABASE_URL)"]
async fn test_admin_operations_require_admin(pool: PgPool) {
    let db = TestDatabase::from_pool(pool).await;
    let member = register_user(&db, "member").await;
    let member_user = db.user_repo.find_by_id(member.user.id).await.unwrap().unwrap();
    let admin_session = register_user(&db, "admin").await;
    let admin = make_admin(&db, admin_session.user.id).await;
    let admin_service = &db.state.admin_service;

    let patch = SettingsUpdate {
        signup_bonus: Some(25),
        ..SettingsUpdate::default()
    };
    assert!(matches!(
        admin_service.update_settings(&member_user, patch.clone()).await,
        Err(AppError::Forbidden(_))
    ));
    let updated = admin_service.update_settings(&admin, patch).await.unwrap();
    assert_eq!(updated.signup_bonus, 25);

    let invalid = SettingsUpdate {
        commission_rate: Some(Decimal::new(2, 0)),
        ..SettingsUpdate::default()
    };
    assert!(matches!(
        admin_service.update_settings(&admin, invalid).await,
        Err(AppError::Validation(_))
    ));

    let credits = admin_service
        .adjust_credits(
            &admin,
            CreditAdjustment {
                user_id: member.user.id,
                amount: -4,
                reason: "Damaged book".to_string(),
            },
        )
        .await
        .unwrap();
    assert_eq!(credits.balance, 6);

    let overdraw = admin_service
        .adjust_credits(
            &admin,
            CreditAdjustment {
                user_id: member.user.id,
                amount: -100,
                reason: "Too much".to_string(),
            },
        )
        .await;
    assert!(matches!(overdraw, Err(AppError::BusinessLogic(_))));

    assert!(admin_service.platform_stats(&admin).await.is_ok());
    assert!(matches!(
        admin_service.platform_stats(&member_user).await,
        Err(AppError::Forbidden(_))
    ));
}
