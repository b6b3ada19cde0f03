use hyper::Method;
use uuid::Uuid;

/// Every REST endpoint, with its path parameters already parsed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Health,

    // Auth
    Register,
    Login,
    Logout,
    Me,
    GoogleStart,
    GoogleCallback,

    // Societies
    ListSocieties,
    CreateSociety,
    JoinSociety,
    GetSociety(Uuid),
    LeaveSociety(Uuid),
    SocietyMembers(Uuid),
    SocietyBooks(Uuid),
    SocietyMessages(Uuid),

    // Books
    CreateBook,
    MyBooks,
    GetBook(Uuid),
    UpdateBook(Uuid),
    DeleteBook(Uuid),
    PurchaseBook(Uuid),
    TagBook(Uuid),
    UntagBook { book_id: Uuid, society_id: Uuid },
    SetBookAvailability(Uuid),
    ListPurchases,

    // Rentals and extensions
    Borrow,
    QuoteRental,
    Borrowed,
    Lent,
    Overdue,
    GetRental(Uuid),
    RequestReturn(Uuid),
    ConfirmReturn(Uuid),
    RequestExtension(Uuid),
    ListExtensions(Uuid),
    PendingExtensions,
    ApproveExtension(Uuid),
    DeclineExtension(Uuid),

    // Credits
    Credits,
    CreditHistory,
    RedeemCredits,

    // Messages
    Conversations,
    UnreadMessages,
    Conversation(Uuid),
    SendMessage(Uuid),
    MarkConversationRead(Uuid),

    // Notifications
    Notifications,
    UnreadNotifications,
    ReadAllNotifications,
    ReadNotification(Uuid),

    // Admin
    GetSettings,
    UpdateSettings,
    PlatformStats,
    AdjustCredits,
}

impl Route {
    /// Match a method and path. `None` means no such endpoint.
    pub fn resolve(method: &Method, path: &str) -> Option<Route> {
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let id = |s: &str| Uuid::parse_str(s).ok();

        let route = match (method.clone(), segments.as_slice()) {
            (Method::GET, ["health"]) => Route::Health,

            (Method::POST, ["api", "auth", "register"]) => Route::Register,
            (Method::POST, ["api", "auth", "login"]) => Route::Login,
            (Method::POST, ["api", "auth", "logout"]) => Route::Logout,
            (Method::GET, ["api", "auth", "me"]) => Route::Me,
            (Method::GET, ["api", "auth", "google"]) => Route::GoogleStart,
            (Method::GET, ["api", "auth", "google", "callback"]) => Route::GoogleCallback,

            (Method::GET, ["api", "societies"]) => Route::ListSocieties,
            (Method::POST, ["api", "societies"]) => Route::CreateSociety,
            (Method::POST, ["api", "societies", "join"]) => Route::JoinSociety,
            (Method::GET, ["api", "societies", s]) => Route::GetSociety(id(s)?),
            (Method::POST, ["api", "societies", s, "leave"]) => Route::LeaveSociety(id(s)?),
            (Method::GET, ["api", "societies", s, "members"]) => Route::SocietyMembers(id(s)?),
            (Method::GET, ["api", "societies", s, "books"]) => Route::SocietyBooks(id(s)?),
            (Method::GET, ["api", "societies", s, "messages"]) => Route::SocietyMessages(id(s)?),

            (Method::POST, ["api", "books"]) => Route::CreateBook,
            (Method::GET, ["api", "books", "mine"]) => Route::MyBooks,
            (Method::GET, ["api", "books", b]) => Route::GetBook(id(b)?),
            (Method::PUT, ["api", "books", b]) => Route::UpdateBook(id(b)?),
            (Method::DELETE, ["api", "books", b]) => Route::DeleteBook(id(b)?),
            (Method::POST, ["api", "books", b, "purchase"]) => Route::PurchaseBook(id(b)?),
            (Method::POST, ["api", "books", b, "societies"]) => Route::TagBook(id(b)?),
            (Method::DELETE, ["api", "books", b, "societies", s]) => Route::UntagBook {
                book_id: id(b)?,
                society_id: id(s)?,
            },
            (Method::PUT, ["api", "books", b, "availability"]) => Route::SetBookAvailability(id(b)?),
            (Method::GET, ["api", "purchases"]) => Route::ListPurchases,

            (Method::POST, ["api", "rentals"]) => Route::Borrow,
            (Method::POST, ["api", "rentals", "quote"]) => Route::QuoteRental,
            (Method::GET, ["api", "rentals", "borrowed"]) => Route::Borrowed,
            (Method::GET, ["api", "rentals", "lent"]) => Route::Lent,
            (Method::GET, ["api", "rentals", "overdue"]) => Route::Overdue,
            (Method::GET, ["api", "rentals", r]) => Route::GetRental(id(r)?),
            (Method::POST, ["api", "rentals", r, "return-request"]) => Route::RequestReturn(id(r)?),
            (Method::POST, ["api", "rentals", r, "confirm-return"]) => Route::ConfirmReturn(id(r)?),
            (Method::POST, ["api", "rentals", r, "extensions"]) => Route::RequestExtension(id(r)?),
            (Method::GET, ["api", "rentals", r, "extensions"]) => Route::ListExtensions(id(r)?),
            (Method::GET, ["api", "extensions", "pending"]) => Route::PendingExtensions,
            (Method::POST, ["api", "extensions", e, "approve"]) => Route::ApproveExtension(id(e)?),
            (Method::POST, ["api", "extensions", e, "decline"]) => Route::DeclineExtension(id(e)?),

            (Method::GET, ["api", "credits"]) => Route::Credits,
            (Method::GET, ["api", "credits", "history"]) => Route::CreditHistory,
            (Method::POST, ["api", "credits", "redeem"]) => Route::RedeemCredits,

            (Method::GET, ["api", "messages"]) => Route::Conversations,
            (Method::GET, ["api", "messages", "unread-count"]) => Route::UnreadMessages,
            (Method::GET, ["api", "messages", u]) => Route::Conversation(id(u)?),
            (Method::POST, ["api", "messages", u]) => Route::SendMessage(id(u)?),
            (Method::POST, ["api", "messages", u, "read"]) => Route::MarkConversationRead(id(u)?),

            (Method::GET, ["api", "notifications"]) => Route::Notifications,
            (Method::GET, ["api", "notifications", "unread-count"]) => Route::UnreadNotifications,
            (Method::POST, ["api", "notifications", "read-all"]) => Route::ReadAllNotifications,
            (Method::POST, ["api", "notifications", n, "read"]) => Route::ReadNotification(id(n)?),

            (Method::GET, ["api", "admin", "settings"]) => Route::GetSettings,
            (Method::PUT, ["api", "admin", "settings"]) => Route::UpdateSettings,
            (Method::GET, ["api", "admin", "stats"]) => Route::PlatformStats,
            (Method::POST, ["api", "admin", "credits"]) => Route::AdjustCredits,

            _ => return None,
        };
        Some(route)
    }

    /// Endpoints reachable without a bearer token
    pub fn is_public(&self) -> bool {
        matches!(
            self,
            Route::Health
                | Route::Register
                | Route::Login
                | Route::GoogleStart
                | Route::GoogleCallback
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_routes() {
        assert_eq!(Route::resolve(&Method::GET, "/health"), Some(Route::Health));
        assert_eq!(Route::resolve(&Method::POST, "/api/auth/login"), Some(Route::Login));
        assert_eq!(Route::resolve(&Method::GET, "/api/books/mine"), Some(Route::MyBooks));
        assert_eq!(
            Route::resolve(&Method::GET, "/api/messages/unread-count"),
            Some(Route::UnreadMessages)
        );
        assert_eq!(
            Route::resolve(&Method::GET, "/api/rentals/borrowed/"),
            Some(Route::Borrowed)
        );
    }

    #[test]
    fn test_parameterised_routes() {
        let id = Uuid::new_v4();
        let other = Uuid::new_v4();

        assert_eq!(
            Route::resolve(&Method::POST, &format!("/api/rentals/{}/confirm-return", id)),
            Some(Route::ConfirmReturn(id))
        );
        assert_eq!(
            Route::resolve(&Method::DELETE, &format!("/api/books/{}/societies/{}", id, other)),
            Some(Route::UntagBook {
                book_id: id,
                society_id: other
            })
        );
        assert_eq!(
            Route::resolve(&Method::GET, &format!("/api/messages/{}", id)),
            Some(Route::Conversation(id))
        );
        assert_eq!(
            Route::resolve(&Method::POST, &format!("/api/messages/{}", id)),
            Some(Route::SendMessage(id))
        );
    }

    #[test]
    fn test_unknown_routes() {
        assert_eq!(Route::resolve(&Method::GET, "/api/books/not-a-uuid"), None);
        assert_eq!(Route::resolve(&Method::PATCH, "/api/books"), None);
        assert_eq!(Route::resolve(&Method::GET, "/nope"), None);
    }

    #[test]
    fn test_public_routes() {
        assert!(Route::Health.is_public());
        assert!(Route::GoogleCallback.is_public());
        assert!(!Route::Me.is_public());
        assert!(!Route::Logout.is_public());
    }
}
