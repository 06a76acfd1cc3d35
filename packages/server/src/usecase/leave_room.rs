//! UseCase: 退出・切断処理（ライフサイクル管理）
//!
//! ## 概要
//!
//! 接続ごとの状態遷移 `Unjoined → Joined → Leaving → (Unjoined | Gone)` を扱います。
//! トランスポートは同じ切断に対して複数回通知してくることがあるため、
//! `begin_leaving` を通過した呼び出しだけが退出処理を行います。
//!
//! ## 退出時の通知順序
//!
//! 1. `disconnected`（退出したユーザー名）を残りのメンバーへ
//! 2. 照合済みメンバーリスト（`joined`）を残りのメンバーへ再送
//!
//! ストアからの削除と 1, 2 の enqueue はルームの順番（`RoomSequencer`）を取ったまま行う。
//! 同時に複数人が抜けても、各メンバーに最後に届く `joined` は最後の削除後のリストになる。
//! 残りが 0 人なら、通知の代わりに猶予付きのルーム破棄を予約する。

use std::sync::Arc;

use crate::domain::{
    Association, ConnectionId, ConnectionRegistry, MessagePusher, RoomStore, ServerEvent,
    broadcast_targets,
};

use super::{RoomSequencer, TeardownScheduler};

/// 退出・切断のユースケース
pub struct LeaveRoomUseCase {
    registry: Arc<dyn ConnectionRegistry>,
    store: Arc<dyn RoomStore>,
    message_pusher: Arc<dyn MessagePusher>,
    sequencer: Arc<RoomSequencer>,
    teardown: Arc<TeardownScheduler>,
}

impl LeaveRoomUseCase {
    pub fn new(
        registry: Arc<dyn ConnectionRegistry>,
        store: Arc<dyn RoomStore>,
        message_pusher: Arc<dyn MessagePusher>,
        sequencer: Arc<RoomSequencer>,
        teardown: Arc<TeardownScheduler>,
    ) -> Self {
        Self {
            registry,
            store,
            message_pusher,
            sequencer,
            teardown,
        }
    }

    /// 明示的な leave
    ///
    /// 接続は生きたまま `Unjoined` に戻り、別のルームに参加できる。
    ///
    /// # Returns
    ///
    /// 退出したルームとユーザー名（参加していなければ `None`）
    pub async fn leave(&self, connection_id: &ConnectionId) -> Option<Association> {
        let association = self.registry.begin_leaving(connection_id).await?;
        self.depart(connection_id, &association).await;
        self.registry.finish_leaving(connection_id).await;
        tracing::info!(
            "'{}' ({}) left room '{}'",
            association.username,
            connection_id,
            association.room_id
        );
        Some(association)
    }

    /// トランスポート切断
    ///
    /// 何度呼ばれても退出処理は 1 回だけ行われる。
    pub async fn disconnect(&self, connection_id: &ConnectionId) -> Option<Association> {
        let association = self.registry.begin_leaving(connection_id).await;
        if let Some(association) = &association {
            self.depart(connection_id, association).await;
        }

        if let Err(e) = self.registry.remove(connection_id).await {
            tracing::debug!("Connection '{}' already removed: {}", connection_id, e);
        }
        self.message_pusher.unregister_client(connection_id).await;
        tracing::info!("Connection '{}' disconnected", connection_id);

        association
    }

    async fn depart(&self, connection_id: &ConnectionId, association: &Association) {
        let turn = self.sequencer.acquire(&association.room_id).await;
        self.depart_in_turn(connection_id, association).await;
        self.sequencer.release(&association.room_id, turn).await;
    }

    async fn depart_in_turn(&self, connection_id: &ConnectionId, association: &Association) {
        let room_id = &association.room_id;
        let remaining = match self.store.remove_member(room_id, connection_id).await {
            Ok(remaining) => remaining,
            Err(e) => {
                tracing::warn!("Failed to remove '{}' from room: {}", connection_id, e);
                return;
            }
        };

        if remaining == 0 {
            self.teardown.schedule(room_id.clone()).await;
            return;
        }

        let members = match self.store.members(room_id).await {
            Ok(members) => members,
            Err(e) => {
                tracing::warn!("Room '{}' vanished during departure: {}", room_id, e);
                return;
            }
        };

        // 追い出された古いタブの退出では、同じユーザーが新しいタブで残っている
        let still_present = members.iter().any(|m| m.username == association.username);
        if !still_present {
            let departed = ServerEvent::Disconnected {
                connection_id: connection_id.clone(),
                username: association.username.clone(),
            };
            if let Err(e) = self
                .message_pusher
                .broadcast(broadcast_targets(&members, None), &departed)
                .await
            {
                tracing::warn!("Failed to broadcast disconnected: {}", e);
            }
        }

        for member in &members {
            let joined = ServerEvent::Joined {
                clients: members.clone(),
                username: member.username.clone(),
                connection_id: member.connection_id.clone(),
            };
            if let Err(e) = self
                .message_pusher
                .push_to(&member.connection_id, &joined)
                .await
            {
                tracing::warn!(
                    "Failed to push member list to '{}': {}",
                    member.connection_id,
                    e
                );
            }
        }
    }
}
