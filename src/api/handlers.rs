use crate::api::request::ApiRequest;
use crate::api::response::{self, created, no_content, ok, BoxBody};
use crate::api::router::Route;
use crate::error::{AppError, AppResult};
use crate::models::{BookDetails, SettingsUpdate, User};
use crate::repositories::JoinOutcome;
use crate::services::{
    BorrowRequest, CreateSocietyRequest, CreditAdjustment, ExtensionRequestBody, RegisterRequest,
};
use crate::AppState;
use chrono::NaiveDate;
use hyper::{Response, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tracing::warn;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
struct LoginRequest {
    email: String,
    password: String,
}

#[derive(Debug, Deserialize)]
struct JoinSocietyRequest {
    join_code: String,
}

#[derive(Debug, Deserialize)]
struct NewBookRequest {
    #[serde(flatten)]
    details: BookDetails,
    #[serde(default)]
    society_ids: Vec<Uuid>,
}

#[derive(Debug, Deserialize)]
struct TagSocietyRequest {
    society_id: Uuid,
}

#[derive(Debug, Deserialize)]
struct AvailabilityRequest {
    is_available: bool,
}

#[derive(Debug, Default, Deserialize)]
struct ConfirmReturnRequest {
    #[serde(default)]
    returned_on: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
struct RedeemRequest {
    brocks: i64,
}

#[derive(Debug, Deserialize)]
struct SendMessageRequest {
    content: String,
    #[serde(default)]
    society_id: Option<Uuid>,
}

fn join_outcome_label(outcome: JoinOutcome) -> &'static str {
    match outcome {
        JoinOutcome::Joined => "joined",
        JoinOutcome::Rejoined => "rejoined",
        JoinOutcome::AlreadyMember => "already_member",
    }
}

/// Run the handler for a routed request, authenticating first unless the route is public
pub async fn dispatch(state: &AppState, req: ApiRequest) -> AppResult<Response<BoxBody>> {
    if req.route.is_public() {
        return public(state, &req).await;
    }
    let user = state.auth_service.authenticate(req.bearer_token()?).await?;
    authenticated(state, &req, &user).await
}

async fn public(state: &AppState, req: &ApiRequest) -> AppResult<Response<BoxBody>> {
    match req.route {
        Route::Health => match state.database.ping().await {
            Ok(()) => ok(&json!({
                "status": "ok",
                "database": "up",
                "realtime_users": state.ws_server.connected_users().await,
            })),
            Err(e) => {
                warn!("Health check failed: {}", e);
                response::json(
                    StatusCode::SERVICE_UNAVAILABLE,
                    &json!({ "status": "degraded", "database": "down" }),
                )
            }
        },
        Route::Register => {
            let session = state.auth_service.register(req.json::<RegisterRequest>()?).await?;
            created(&session)
        }
        Route::Login => {
            let body: LoginRequest = req.json()?;
            ok(&state.auth_service.login(&body.email, &body.password).await?)
        }
        Route::GoogleStart => {
            let url = state.auth_service.google_authorization_url().await?;
            ok(&json!({ "url": url }))
        }
        Route::GoogleCallback => {
            let code = req.required_query("code")?;
            let oauth_state = req.required_query("state")?;
            ok(&state.auth_service.complete_oauth(code, oauth_state).await?)
        }
        // `dispatch` sends everything else through `authenticated`
        _ => Err(AppError::Unauthorized("Missing bearer token".to_string())),
    }
}

async fn authenticated(state: &AppState, req: &ApiRequest, user: &User) -> AppResult<Response<BoxBody>> {
    let me = user.id;

    match req.route {
        // Auth
        Route::Logout => {
            state.auth_service.logout(req.bearer_token()?).await?;
            Ok(no_content())
        }
        Route::Me => {
            let credits = state.credit_service.balance(me).await?;
            ok(&json!({ "user": user.public(), "credits": credits }))
        }

        // Societies
        Route::ListSocieties => ok(&state.society_service.list_for_user(me).await?),
        Route::CreateSociety => {
            let body: CreateSocietyRequest = req.json()?;
            created(&state.society_service.create_society(me, body).await?)
        }
        Route::JoinSociety => {
            let body: JoinSocietyRequest = req.json()?;
            let (society, outcome) = state.society_service.join_by_code(me, &body.join_code).await?;
            ok(&json!({ "society": society, "status": join_outcome_label(outcome) }))
        }
        Route::GetSociety(id) => ok(&state.society_service.get(me, id).await?),
        Route::LeaveSociety(id) => {
            state.society_service.leave(me, id).await?;
            Ok(no_content())
        }
        Route::SocietyMembers(id) => ok(&state.society_service.members(me, id).await?),
        Route::SocietyBooks(id) => {
            let filter = req.book_filter()?;
            ok(&state.book_service.list_society_books(me, id, &filter).await?)
        }
        Route::SocietyMessages(id) => {
            let limit = req.query_parsed("limit")?;
            ok(&state.chat_service.society_messages(me, id, limit).await?)
        }

        // Books
        Route::CreateBook => {
            let body: NewBookRequest = req.json()?;
            created(&state.book_service.create_book(me, body.details, body.society_ids).await?)
        }
        Route::MyBooks => ok(&state.book_service.list_owned(me).await?),
        Route::GetBook(id) => ok(&state.book_service.get_book(me, id).await?),
        Route::UpdateBook(id) => {
            let details: BookDetails = req.json()?;
            ok(&state.book_service.update_book(me, id, details).await?)
        }
        Route::DeleteBook(id) => {
            state.book_service.delete_book(me, id).await?;
            Ok(no_content())
        }
        Route::PurchaseBook(id) => created(&state.purchase_service.purchase(me, id).await?),
        Route::TagBook(id) => {
            let body: TagSocietyRequest = req.json()?;
            ok(&state.book_service.tag_society(me, id, body.society_id).await?)
        }
        Route::UntagBook { book_id, society_id } => {
            ok(&state.book_service.untag_society(me, book_id, society_id).await?)
        }
        Route::SetBookAvailability(id) => {
            let body: AvailabilityRequest = req.json()?;
            ok(&state.book_service.set_availability(me, id, body.is_available).await?)
        }
        Route::ListPurchases => ok(&state.purchase_service.list_for_user(me).await?),

        // Rentals
        Route::Borrow => {
            let body: BorrowRequest = req.json()?;
            created(&state.rental_service.borrow(me, body).await?)
        }
        Route::QuoteRental => {
            let body: BorrowRequest = req.json()?;
            ok(&state.rental_service.quote(me, &body).await?)
        }
        Route::Borrowed => ok(&state.rental_service.list_borrowed(me).await?),
        Route::Lent => ok(&state.rental_service.list_lent(me).await?),
        Route::Overdue => ok(&state.rental_service.overdue(me).await?),
        Route::GetRental(id) => ok(&state.rental_service.get(me, id).await?),
        Route::RequestReturn(id) => ok(&state.rental_service.request_return(me, id).await?),
        Route::ConfirmReturn(id) => {
            let body: ConfirmReturnRequest = req.json_or_default()?;
            ok(&state.rental_service.confirm_return(me, id, body.returned_on).await?)
        }

        // Extensions
        Route::RequestExtension(id) => {
            let body: ExtensionRequestBody = req.json()?;
            created(&state.extension_service.request_extension(me, id, body).await?)
        }
        Route::ListExtensions(id) => ok(&state.extension_service.list_for_rental(me, id).await?),
        Route::PendingExtensions => ok(&state.extension_service.pending_for_lender(me).await?),
        Route::ApproveExtension(id) => ok(&state.extension_service.approve(me, id).await?),
        Route::DeclineExtension(id) => ok(&state.extension_service.decline(me, id).await?),

        // Credits
        Route::Credits => ok(&state.credit_service.balance(me).await?),
        Route::CreditHistory => {
            let limit = req.query_parsed("limit")?;
            ok(&state.credit_service.history(me, limit).await?)
        }
        Route::RedeemCredits => {
            let body: RedeemRequest = req.json()?;
            ok(&state.credit_service.redeem_for_cash(me, body.brocks).await?)
        }

        // Messages
        Route::Conversations => ok(&state.chat_service.conversations(me).await?),
        Route::UnreadMessages => {
            let count = state.chat_service.unread_count(me).await?;
            ok(&json!({ "count": count }))
        }
        Route::Conversation(other) => {
            let limit = req.query_parsed("limit")?;
            ok(&state.chat_service.conversation(me, other, limit).await?)
        }
        Route::SendMessage(recipient) => {
            let body: SendMessageRequest = req.json()?;
            let message = state
                .chat_service
                .send(me, recipient, &body.content, body.society_id)
                .await?;
            created(&message)
        }
        Route::MarkConversationRead(other) => {
            let marked = state.chat_service.mark_read(me, other).await?;
            ok(&json!({ "marked": marked }))
        }

        // Notifications
        Route::Notifications => {
            let unread_only = req.query_flag("unread")?;
            let limit = req.query_parsed("limit")?;
            ok(&state.notification_service.list(me, unread_only, limit).await?)
        }
        Route::UnreadNotifications => {
            let count = state.notification_service.unread_count(me).await?;
            ok(&json!({ "count": count }))
        }
        Route::ReadAllNotifications => {
            let marked = state.notification_service.mark_all_read(me).await?;
            ok(&json!({ "marked": marked }))
        }
        Route::ReadNotification(id) => {
            state.notification_service.mark_read(me, id).await?;
            Ok(no_content())
        }

        // Admin
        Route::GetSettings => ok(&state.admin_service.get_settings().await?),
        Route::UpdateSettings => {
            let patch: SettingsUpdate = req.json()?;
            ok(&state.admin_service.update_settings(user, patch).await?)
        }
        Route::PlatformStats => ok(&state.admin_service.platform_stats(user).await?),
        Route::AdjustCredits => {
            let adjustment: CreditAdjustment = req.json()?;
            ok(&state.admin_service.adjust_credits(user, adjustment).await?)
        }

        Route::Health
        | Route::Register
        | Route::Login
        | Route::GoogleStart
        | Route::GoogleCallback => public(state, req).await,
    }
}
