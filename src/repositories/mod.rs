pub mod book_repository;
pub mod credit_repository;
pub mod extension_repository;
pub mod message_repository;
pub mod notification_repository;
pub mod purchase_repository;
pub mod rental_repository;
pub mod session_repository;
pub mod settings_repository;
pub mod society_member_repository;
pub mod society_repository;
pub mod user_repository;

// Re-export all repositories for convenient access
pub use book_repository::BookRepository;
pub use credit_repository::{CreditEntry, CreditRepository};
pub use extension_repository::ExtensionRepository;
pub use message_repository::MessageRepository;
pub use notification_repository::NotificationRepository;
pub use purchase_repository::PurchaseRepository;
pub use rental_repository::{NewRental, RentalRepository};
pub use session_repository::SessionRepository;
pub use settings_repository::SettingsRepository;
pub use society_member_repository::{JoinOutcome, SocietyMemberRepository};
pub use society_repository::SocietyRepository;
pub use user_repository::UserRepository;
