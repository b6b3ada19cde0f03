use crate::error::{AppError, AppResult};
use crate::models::{Notification, NotificationKind};
use crate::repositories::NotificationRepository;
use crate::websocket::{ServerMessage, WebSocketServer};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 200;

/// Persists notifications and pushes them to connected clients
pub struct NotificationService {
    notification_repo: Arc<NotificationRepository>,
    ws_server: Arc<WebSocketServer>,
}

impl NotificationService {
    pub fn new(notification_repo: Arc<NotificationRepository>, ws_server: Arc<WebSocketServer>) -> Self {
        Self {
            notification_repo,
            ws_server,
        }
    }

    pub async fn notify(
        &self,
        user_id: Uuid,
        kind: NotificationKind,
        title: &str,
        message: &str,
        reference_id: Option<Uuid>,
    ) -> AppResult<Notification> {
        let notification = self
            .notification_repo
            .create(user_id, kind, title, message, reference_id)
            .await?;

        let delivered = self
            .ws_server
            .send_to_user(
                user_id,
                ServerMessage::Notification {
                    notification: notification.clone(),
                },
            )
            .await;
        debug!(
            "Notification {} ({}) for {} pushed live: {}",
            notification.id,
            kind.as_str(),
            user_id,
            delivered
        );
        Ok(notification)
    }

    /// Notify without failing the caller; the triggering change is already committed
    pub async fn notify_or_log(
        &self,
        user_id: Uuid,
        kind: NotificationKind,
        title: &str,
        message: &str,
        reference_id: Option<Uuid>,
    ) {
        if let Err(e) = self.notify(user_id, kind, title, message, reference_id).await {
            warn!("Failed to notify {} ({}): {}", user_id, kind.as_str(), e);
        }
    }

    pub async fn list(&self, user_id: Uuid, unread_only: bool, limit: Option<i64>) -> AppResult<Vec<Notification>> {
        let limit = limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
        Ok(self.notification_repo.list(user_id, unread_only, limit).await?)
    }

    pub async fn mark_read(&self, user_id: Uuid, notification_id: Uuid) -> AppResult<()> {
        if !self.notification_repo.mark_read(user_id, notification_id).await? {
            return Err(AppError::NotFound(format!(
                "Notification {} not found",
                notification_id
            )));
        }
        Ok(())
    }

    pub async fn mark_all_read(&self, user_id: Uuid) -> AppResult<u64> {
        Ok(self.notification_repo.mark_all_read(user_id).await?)
    }

    pub async fn unread_count(&self, user_id: Uuid) -> AppResult<i64> {
        Ok(self.notification_repo.unread_count(user_id).await?)
    }
}
