//! Domain models for the Bookshare backend.
//!
//! Database-backed rows for the marketplace entities plus the small
//! request/response shapes that travel with them.

pub mod book;
pub mod credit;
pub mod extension;
pub mod message;
pub mod notification;
pub mod purchase;
pub mod rental;
pub mod session;
pub mod settings;
pub mod society;
pub mod user;

pub use book::{Book, BookCondition, BookDetails, BookFilter};
pub use credit::{CreditKind, CreditTransaction, UserCredits};
pub use extension::{ExtensionRequest, ExtensionStatus};
pub use message::{ConversationSummary, Message};
pub use notification::{Notification, NotificationKind};
pub use purchase::BookPurchase;
pub use rental::{BookRental, RentalStatus, RentalSummary};
pub use session::Session;
pub use settings::{PlatformStats, RewardSettings, SettingsUpdate};
pub use society::{MemberProfile, Society, SocietyMember};
pub use user::{NewUser, PublicUser, User};
