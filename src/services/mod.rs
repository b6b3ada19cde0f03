pub mod admin_service;
pub mod auth_service;
pub mod book_service;
pub mod chat_service;
pub mod credit_service;
pub mod extension_service;
pub mod notification_service;
pub mod purchase_service;
pub mod rental_service;
pub mod society_service;

pub use admin_service::{AdminService, CreditAdjustment};
pub use auth_service::{AuthService, AuthSession, RegisterRequest};
pub use book_service::{BookListing, BookService};
pub use chat_service::ChatService;
pub use credit_service::{CreditService, Redemption};
pub use extension_service::{ExtensionDecision, ExtensionRequestBody, ExtensionService};
pub use notification_service::NotificationService;
pub use purchase_service::PurchaseService;
pub use rental_service::{BorrowRequest, RentalService, ReturnReceipt};
pub use society_service::{CreateSocietyRequest, SocietyService};
