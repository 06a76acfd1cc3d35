//! WebSocket を使った MessagePusher 実装
//!
//! ## 責務
//!
//! - 接続ごとの `UnboundedSender` を管理
//! - `ServerEvent` を wire 形式の JSON にシリアライズして送信（push_to, broadcast）
//!
//! ## 設計ノート
//!
//! WebSocket の生成は UI 層（`ui/handler/websocket.rs`）で行われます。
//! ここではチャンネルへの enqueue だけを行い、ソケットへの書き込みは
//! 接続ごとの pusher タスクが担当します。

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::{
    domain::{ConnectionId, MessagePushError, MessagePusher, PusherChannel, ServerEvent},
    infrastructure::dto::websocket::ServerMessage,
};

/// WebSocket を使った MessagePusher 実装
#[derive(Default)]
pub struct WebSocketMessagePusher {
    /// 接続中のクライアントの送信チャンネル
    clients: Mutex<HashMap<ConnectionId, PusherChannel>>,
}

impl WebSocketMessagePusher {
    pub fn new() -> Self {
        Self::default()
    }

    fn encode(event: &ServerEvent) -> Result<String, MessagePushError> {
        serde_json::to_string(&ServerMessage::from(event))
            .map_err(|e| MessagePushError::PushFailed(e.to_string()))
    }
}

#[async_trait]
impl MessagePusher for WebSocketMessagePusher {
    async fn register_client(&self, connection_id: ConnectionId, sender: PusherChannel) {
        let mut clients = self.clients.lock().await;
        tracing::debug!("Connection '{}' registered to MessagePusher", connection_id);
        clients.insert(connection_id, sender);
    }

    async fn unregister_client(&self, connection_id: &ConnectionId) {
        let mut clients = self.clients.lock().await;
        clients.remove(connection_id);
        tracing::debug!(
            "Connection '{}' unregistered from MessagePusher",
            connection_id
        );
    }

    async fn push_to(
        &self,
        connection_id: &ConnectionId,
        event: &ServerEvent,
    ) -> Result<(), MessagePushError> {
        let content = Self::encode(event)?;
        let clients = self.clients.lock().await;

        let sender = clients
            .get(connection_id)
            .ok_or_else(|| MessagePushError::ConnectionNotFound(connection_id.to_string()))?;
        sender
            .send(content)
            .map_err(|e| MessagePushError::PushFailed(e.to_string()))?;
        tracing::debug!("Pushed '{}' to connection '{}'", event.name(), connection_id);
        Ok(())
    }

    async fn broadcast(
        &self,
        targets: Vec<ConnectionId>,
        event: &ServerEvent,
    ) -> Result<(), MessagePushError> {
        let content = Self::encode(event)?;
        let clients = self.clients.lock().await;

        for target in targets {
            // ブロードキャストでは一部の送信失敗を許容
            match clients.get(&target) {
                Some(sender) => {
                    if let Err(e) = sender.send(content.clone()) {
                        tracing::warn!("Failed to push '{}' to '{}': {}", event.name(), target, e);
                    }
                }
                None => {
                    tracing::warn!(
                        "Connection '{}' not found during broadcast, skipping",
                        target
                    );
                }
            }
        }
        tracing::debug!("Broadcasted '{}'", event.name());

        Ok(())
    }
}
