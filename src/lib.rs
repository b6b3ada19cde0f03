//! Bookshare Backend Library
//!
//! This module exposes the backend components for use by the binary and tests.

pub mod api;
pub mod auth;
pub mod config;
pub mod database;
pub mod error;
pub mod models;
pub mod pricing;
pub mod repositories;
pub mod services;
pub mod websocket;

// Re-export commonly used types
pub use config::AppConfig;
pub use error::{AppError, AppResult};

use database::Database;
use repositories::*;
use services::*;
use std::sync::Arc;
use websocket::WebSocketServer;

/// Application state containing configuration, the live socket hub and all services
pub struct AppState {
    pub config: AppConfig,
    pub database: Database,
    pub ws_server: Arc<WebSocketServer>,
    pub auth_service: Arc<AuthService>,
    pub society_service: Arc<SocietyService>,
    pub book_service: Arc<BookService>,
    pub rental_service: Arc<RentalService>,
    pub extension_service: Arc<ExtensionService>,
    pub purchase_service: Arc<PurchaseService>,
    pub credit_service: Arc<CreditService>,
    pub chat_service: Arc<ChatService>,
    pub notification_service: Arc<NotificationService>,
    pub admin_service: Arc<AdminService>,
}

impl AppState {
    /// Create a new AppState with repositories and services wired over one pool
    pub fn new(pool: sqlx::PgPool, config: AppConfig) -> Self {
        let database = Database::new(pool.clone());
        let ws_server = Arc::new(WebSocketServer::new());

        let user_repo = Arc::new(UserRepository::new(pool.clone()));
        let session_repo = Arc::new(SessionRepository::new(pool.clone()));
        let society_repo = Arc::new(SocietyRepository::new(pool.clone()));
        let member_repo = Arc::new(SocietyMemberRepository::new(pool.clone()));
        let book_repo = Arc::new(BookRepository::new(pool.clone()));
        let rental_repo = Arc::new(RentalRepository::new(pool.clone()));
        let extension_repo = Arc::new(ExtensionRepository::new(pool.clone()));
        let purchase_repo = Arc::new(PurchaseRepository::new(pool.clone()));
        let credit_repo = Arc::new(CreditRepository::new(pool.clone()));
        let message_repo = Arc::new(MessageRepository::new(pool.clone()));
        let notification_repo = Arc::new(NotificationRepository::new(pool.clone()));
        let settings_repo = Arc::new(SettingsRepository::new(pool.clone()));

        let notification_service = Arc::new(NotificationService::new(
            notification_repo,
            ws_server.clone(),
        ));
        let credit_service = Arc::new(CreditService::new(
            credit_repo.clone(),
            settings_repo.clone(),
            notification_service.clone(),
        ));

        let auth_service = Arc::new(AuthService::new(
            pool.clone(),
            user_repo.clone(),
            session_repo,
            credit_repo.clone(),
            settings_repo.clone(),
            config.oauth.clone(),
            config.session_ttl(),
        ));
        let society_service = Arc::new(SocietyService::new(
            society_repo,
            member_repo.clone(),
            notification_service.clone(),
        ));
        let book_service = Arc::new(BookService::new(
            pool.clone(),
            book_repo.clone(),
            member_repo.clone(),
            rental_repo.clone(),
            purchase_repo.clone(),
            credit_repo.clone(),
            settings_repo.clone(),
        ));
        let rental_service = Arc::new(RentalService::new(
            pool.clone(),
            rental_repo.clone(),
            book_repo.clone(),
            member_repo.clone(),
            credit_repo,
            settings_repo.clone(),
            notification_service.clone(),
        ));
        let extension_service = Arc::new(ExtensionService::new(
            pool.clone(),
            extension_repo,
            rental_repo,
            settings_repo.clone(),
            notification_service.clone(),
        ));
        let purchase_service = Arc::new(PurchaseService::new(
            pool,
            book_repo,
            purchase_repo,
            settings_repo.clone(),
            notification_service.clone(),
        ));
        let chat_service = Arc::new(ChatService::new(
            message_repo,
            user_repo.clone(),
            member_repo,
            ws_server.clone(),
        ));
        let admin_service = Arc::new(AdminService::new(
            settings_repo,
            user_repo,
            credit_service.clone(),
        ));

        Self {
            config,
            database,
            ws_server,
            auth_service,
            society_service,
            book_service,
            rental_service,
            extension_service,
            purchase_service,
            credit_service,
            chat_service,
            notification_service,
            admin_service,
        }
    }
}
