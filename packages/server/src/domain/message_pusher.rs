//! MessagePusher trait 定義
//!
//! ドメイン層が必要とする「接続へのイベント送信」のインターフェース。
//! WebSocket などの具体的な送信手段は Infrastructure 層が提供します。

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::{ConnectionId, MessagePushError, ServerEvent};

/// 接続ごとの送信チャンネル（シリアライズ済み JSON を流す）
pub type PusherChannel = mpsc::UnboundedSender<String>;

/// MessagePusher trait
///
/// 送信はチャンネルへの enqueue だけで完了し、ソケットへの書き込みは待たない。
/// そのためルームのロック解放後に呼べば、遅い接続が他のメンバーを止めることはない。
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessagePusher: Send + Sync {
    /// 接続の送信チャンネルを登録
    async fn register_client(&self, connection_id: ConnectionId, sender: PusherChannel);

    /// 接続の送信チャンネルを登録解除
    async fn unregister_client(&self, connection_id: &ConnectionId);

    /// 1 接続に送信
    async fn push_to(
        &self,
        connection_id: &ConnectionId,
        event: &ServerEvent,
    ) -> Result<(), MessagePushError>;

    /// 複数接続に送信（一部の失敗は許容し、残りには届ける）
    async fn broadcast(
        &self,
        targets: Vec<ConnectionId>,
        event: &ServerEvent,
    ) -> Result<(), MessagePushError>;
}
