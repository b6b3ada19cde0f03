use crate::error::{AppError, AppResult};
use crate::models::{Message as ChatMessage, Notification};
use crate::AppState;
use chrono::NaiveDateTime;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::{Mutex, RwLock};
use tokio_tungstenite::{accept_async, tungstenite::Message, WebSocketStream};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

type WsSink = SplitSink<WebSocketStream<TcpStream>, Message>;

/// Frames sent by clients
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Auth { token: String },
    JoinSociety { society_id: Uuid },
    LeaveSociety { society_id: Uuid },
    Chat { society_id: Uuid, content: String },
    Typing { society_id: Uuid, is_typing: bool },
}

/// Frames pushed to clients
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Connected {
        client_id: Uuid,
    },
    Authenticated {
        user_id: Uuid,
    },
    Joined {
        society_id: Uuid,
    },
    Left {
        society_id: Uuid,
    },
    Chat {
        society_id: Uuid,
        message_id: Uuid,
        sender_id: Uuid,
        sender_name: String,
        content: String,
        sent_at: NaiveDateTime,
    },
    Typing {
        society_id: Uuid,
        user_id: Uuid,
        is_typing: bool,
    },
    NewMessage {
        message: ChatMessage,
    },
    Notification {
        notification: Notification,
    },
    Error {
        message: String,
    },
}

impl ServerMessage {
    pub fn error(message: impl Into<String>) -> Self {
        ServerMessage::Error {
            message: message.into(),
        }
    }
}

/// A broadcast frame addressed to one channel
#[derive(Debug, Clone)]
pub struct Envelope {
    pub channel: String,
    /// Connection that should not receive its own frame (typing indicators)
    pub skip_client: Option<Uuid>,
    pub message: ServerMessage,
}

pub fn society_channel(society_id: Uuid) -> String {
    format!("society:{}", society_id)
}

pub fn user_channel(user_id: Uuid) -> String {
    format!("user:{}", user_id)
}

/// WebSocket server for chat relay and per-user pushes
pub struct WebSocketServer {
    /// Broadcast sender; each connection filters by its own subscriptions
    tx: broadcast::Sender<Envelope>,
    /// Active subscriptions: channel -> client IDs
    subscriptions: Arc<RwLock<HashMap<String, Vec<Uuid>>>>,
    /// Client subscriptions: client_id -> channels
    client_channels: Arc<RwLock<HashMap<Uuid, Vec<String>>>>,
    /// Authenticated connections: client_id -> user_id
    client_users: Arc<RwLock<HashMap<Uuid, Uuid>>>,
}

impl WebSocketServer {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1000);

        Self {
            tx,
            subscriptions: Arc::new(RwLock::new(HashMap::new())),
            client_channels: Arc::new(RwLock::new(HashMap::new())),
            client_users: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Publish a frame to everyone subscribed to `channel`. Returns false if nobody is listening.
    pub async fn publish(&self, channel: &str, message: ServerMessage, skip_client: Option<Uuid>) -> bool {
        let subscribers = {
            let subscriptions = self.subscriptions.read().await;
            subscriptions.get(channel).map(Vec::len).unwrap_or(0)
        };
        if subscribers == 0 {
            return false;
        }

        debug!("Publishing to {} subscriber(s) on {}", subscribers, channel);
        let envelope = Envelope {
            channel: channel.to_string(),
            skip_client,
            message,
        };
        if let Err(e) = self.tx.send(envelope) {
            warn!("Failed to broadcast message: {}", e);
            return false;
        }
        true
    }

    pub async fn send_to_user(&self, user_id: Uuid, message: ServerMessage) -> bool {
        self.publish(&user_channel(user_id), message, None).await
    }

    pub async fn send_to_society(&self, society_id: Uuid, message: ServerMessage, skip_client: Option<Uuid>) -> bool {
        self.publish(&society_channel(society_id), message, skip_client).await
    }

    pub async fn subscribe(&self, client_id: Uuid, channel: String) {
        let mut subscriptions = self.subscriptions.write().await;
        let mut client_channels = self.client_channels.write().await;

        let subscribers = subscriptions.entry(channel.clone()).or_insert_with(Vec::new);
        if !subscribers.contains(&client_id) {
            subscribers.push(client_id);
        }

        let channels = client_channels.entry(client_id).or_insert_with(Vec::new);
        if !channels.contains(&channel) {
            channels.push(channel.clone());
        }

        debug!("Client {} subscribed to {}", client_id, channel);
    }

    pub async fn unsubscribe(&self, client_id: Uuid, channel: &str) {
        let mut subscriptions = self.subscriptions.write().await;
        let mut client_channels = self.client_channels.write().await;

        if let Some(subscribers) = subscriptions.get_mut(channel) {
            subscribers.retain(|&id| id != client_id);
            if subscribers.is_empty() {
                subscriptions.remove(channel);
            }
        }

        if let Some(channels) = client_channels.get_mut(&client_id) {
            channels.retain(|c| c != channel);
        }

        debug!("Client {} unsubscribed from {}", client_id, channel);
    }

    pub async fn get_client_channels(&self, client_id: Uuid) -> Vec<String> {
        let client_channels = self.client_channels.read().await;
        client_channels.get(&client_id).cloned().unwrap_or_default()
    }

    pub async fn is_client_subscribed(&self, client_id: Uuid, channel: &str) -> bool {
        let subscriptions = self.subscriptions.read().await;
        subscriptions
            .get(channel)
            .map(|subscribers| subscribers.contains(&client_id))
            .unwrap_or(false)
    }

    /// Whether a broadcast frame should be forwarded to `client_id`
    pub async fn should_deliver(&self, client_id: Uuid, envelope: &Envelope) -> bool {
        envelope.skip_client != Some(client_id)
            && self.is_client_subscribed(client_id, &envelope.channel).await
    }

    /// Bind a connection to a user and subscribe it to the user's private channel
    pub async fn attach_user(&self, client_id: Uuid, user_id: Uuid) {
        let previous = self.client_users.write().await.insert(client_id, user_id);
        if let Some(previous) = previous.filter(|p| *p != user_id) {
            // Re-authenticating as someone else drops every earlier subscription
            self.drop_subscriptions(client_id).await;
            debug!("Client {} switched from user {} to {}", client_id, previous, user_id);
        }
        self.subscribe(client_id, user_channel(user_id)).await;
    }

    pub async fn client_user(&self, client_id: Uuid) -> Option<Uuid> {
        self.client_users.read().await.get(&client_id).copied()
    }

    pub async fn connected_users(&self) -> usize {
        self.client_users.read().await.len()
    }

    /// Forget everything held for a closed connection
    pub async fn disconnect(&self, client_id: Uuid) {
        self.drop_subscriptions(client_id).await;
        self.client_channels.write().await.remove(&client_id);
        self.client_users.write().await.remove(&client_id);
    }

    async fn drop_subscriptions(&self, client_id: Uuid) {
        for channel in self.get_client_channels(client_id).await {
            self.unsubscribe(client_id, &channel).await;
        }
    }

    /// Handle a new WebSocket connection until it closes
    pub async fn handle_connection(&self, stream: TcpStream, state: Arc<AppState>) -> AppResult<()> {
        let ws_stream = accept_async(stream)
            .await
            .map_err(|e| AppError::Message(format!("WebSocket handshake failed: {}", e)))?;

        let (ws_sender, mut ws_receiver) = ws_stream.split();
        let ws_sender = Arc::new(Mutex::new(ws_sender));
        let mut rx = self.tx.subscribe();
        let client_id = Uuid::new_v4();

        info!("New WebSocket connection: {}", client_id);
        send_frame(&ws_sender, &ServerMessage::Connected { client_id }).await;

        // Forward broadcast frames this client is subscribed to
        let server = self.clone();
        let sender_for_broadcast = ws_sender.clone();
        let forward = tokio::spawn(async move {
            loop {
                let envelope = match rx.recv().await {
                    Ok(envelope) => envelope,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("Client {} lagged, {} frame(s) dropped", client_id, skipped);
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                };

                if !server.should_deliver(client_id, &envelope).await {
                    continue;
                }
                if !send_frame(&sender_for_broadcast, &envelope.message).await {
                    break;
                }
            }
        });

        while let Some(msg) = ws_receiver.next().await {
            match msg {
                Ok(Message::Text(text)) => {
                    let reply = match serde_json::from_str::<ClientMessage>(&text) {
                        Ok(client_msg) => self
                            .process(client_id, client_msg, &state)
                            .await
                            .unwrap_or_else(|e| Some(ServerMessage::error(e.client_message()))),
                        Err(e) => {
                            warn!("Failed to parse message from client {}: {}", client_id, e);
                            Some(ServerMessage::error("Invalid message format"))
                        }
                    };
                    if let Some(reply) = reply {
                        send_frame(&ws_sender, &reply).await;
                    }
                }
                Ok(Message::Close(_)) => {
                    info!("WebSocket connection closed: {}", client_id);
                    break;
                }
                Err(e) => {
                    error!("WebSocket error on {}: {}", client_id, e);
                    break;
                }
                _ => {}
            }
        }

        forward.abort();
        self.disconnect(client_id).await;
        Ok(())
    }

    /// Apply one client frame, returning the direct reply if it has one.
    /// Chat lines reach their sender through the society broadcast instead.
    async fn process(
        &self,
        client_id: Uuid,
        msg: ClientMessage,
        state: &AppState,
    ) -> AppResult<Option<ServerMessage>> {
        match msg {
            ClientMessage::Auth { token } => {
                let user = state.auth_service.authenticate(&token).await?;
                self.attach_user(client_id, user.id).await;
                info!("Client {} authenticated as {}", client_id, user.id);
                Ok(Some(ServerMessage::Authenticated { user_id: user.id }))
            }
            ClientMessage::JoinSociety { society_id } => {
                let user_id = self.require_user(client_id).await?;
                state.society_service.require_member(society_id, user_id).await?;
                self.subscribe(client_id, society_channel(society_id)).await;
                Ok(Some(ServerMessage::Joined { society_id }))
            }
            ClientMessage::LeaveSociety { society_id } => {
                self.unsubscribe(client_id, &society_channel(society_id)).await;
                Ok(Some(ServerMessage::Left { society_id }))
            }
            ClientMessage::Chat { society_id, content } => {
                let user_id = self.require_joined(client_id, society_id).await?;
                let line = state
                    .chat_service
                    .post_society_message(user_id, society_id, &content)
                    .await?;
                self.send_to_society(society_id, line, None).await;
                Ok(None)
            }
            ClientMessage::Typing { society_id, is_typing } => {
                let user_id = self.require_joined(client_id, society_id).await?;
                let frame = ServerMessage::Typing {
                    society_id,
                    user_id,
                    is_typing,
                };
                self.send_to_society(society_id, frame, Some(client_id)).await;
                Ok(None)
            }
        }
    }

    async fn require_user(&self, client_id: Uuid) -> AppResult<Uuid> {
        self.client_user(client_id)
            .await
            .ok_or_else(|| AppError::Unauthorized("Authenticate before sending this message".to_string()))
    }

    async fn require_joined(&self, client_id: Uuid, society_id: Uuid) -> AppResult<Uuid> {
        let user_id = self.require_user(client_id).await?;
        if !self.is_client_subscribed(client_id, &society_channel(society_id)).await {
            return Err(AppError::Forbidden("Join the society channel first".to_string()));
        }
        Ok(user_id)
    }
}

/// Serialize and send one frame. Returns false once the socket is unusable.
async fn send_frame(sender: &Arc<Mutex<WsSink>>, message: &ServerMessage) -> bool {
    let json = match serde_json::to_string(message) {
        Ok(json) => json,
        Err(e) => {
            error!("Failed to serialize message: {}", e);
            return true;
        }
    };

    let mut sender = sender.lock().await;
    if let Err(e) = sender.send(Message::Text(json)).await {
        debug!("Failed to send frame: {}", e);
        return false;
    }
    true
}

impl Clone for WebSocketServer {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            subscriptions: Arc::clone(&self.subscriptions),
            client_channels: Arc::clone(&self.client_channels),
            client_users: Arc::clone(&self.client_users),
        }
    }
}

impl Default for WebSocketServer {
    fn default() -> Self {
        Self::new()
    }
}
