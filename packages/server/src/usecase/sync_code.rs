//! UseCase: コード同期処理
//!
//! - `code-change`: ルームのバッファを置き換え、送信者以外の全員に配信
//! - `sync-code`: 指定した 1 接続にだけバッファを送る（途中参加者への追いつき用）
//!
//! どちらも送信者がルームストア上のメンバーでなければ何もしない。

use std::sync::Arc;

use crate::domain::{ConnectionId, MessagePusher, RoomId, RoomStore, ServerEvent, broadcast_targets};

use super::{RoomSequencer, error::EventError};

/// コード同期のユースケース
pub struct SyncCodeUseCase {
    store: Arc<dyn RoomStore>,
    message_pusher: Arc<dyn MessagePusher>,
    sequencer: Arc<RoomSequencer>,
}

impl SyncCodeUseCase {
    pub fn new(
        store: Arc<dyn RoomStore>,
        message_pusher: Arc<dyn MessagePusher>,
        sequencer: Arc<RoomSequencer>,
    ) -> Self {
        Self {
            store,
            message_pusher,
            sequencer,
        }
    }

    /// バッファを置き換えて送信者以外に配信する
    ///
    /// # Returns
    ///
    /// 配信先の接続 ID
    pub async fn code_change(
        &self,
        sender: &ConnectionId,
        room_id: &RoomId,
        code: String,
    ) -> Result<Vec<ConnectionId>, EventError> {
        let turn = self.sequencer.acquire(room_id).await;
        let result = self.code_change_in_turn(sender, room_id, code).await;
        self.sequencer.release(room_id, turn).await;
        result
    }

    async fn code_change_in_turn(
        &self,
        sender: &ConnectionId,
        room_id: &RoomId,
        code: String,
    ) -> Result<Vec<ConnectionId>, EventError> {
        let members = self.store.members(room_id).await?;
        EventError::require_member(&members, sender, room_id)?;

        self.store.set_code(room_id, code.clone()).await?;
        let targets = broadcast_targets(&members, Some(sender));
        if let Err(e) = self
            .message_pusher
            .broadcast(targets.clone(), &ServerEvent::CodeChange { code })
            .await
        {
            tracing::warn!("Failed to broadcast code-change: {}", e);
        }
        Ok(targets)
    }

    /// 同じルームの 1 接続にだけバッファを送る
    pub async fn sync_code(
        &self,
        sender: &ConnectionId,
        room_id: &RoomId,
        target: &ConnectionId,
        code: String,
    ) -> Result<(), EventError> {
        let turn = self.sequencer.acquire(room_id).await;
        let result = self.sync_code_in_turn(sender, room_id, target, code).await;
        self.sequencer.release(room_id, turn).await;
        result
    }

    async fn sync_code_in_turn(
        &self,
        sender: &ConnectionId,
        room_id: &RoomId,
        target: &ConnectionId,
        code: String,
    ) -> Result<(), EventError> {
        let members = self.store.members(room_id).await?;
        EventError::require_member(&members, sender, room_id)?;
        if !members.iter().any(|m| &m.connection_id == target) {
            return Err(EventError::UnknownTarget(target.clone()));
        }

        if let Err(e) = self
            .message_pusher
            .push_to(target, &ServerEvent::CodeChange { code })
            .await
        {
            tracing::warn!("Failed to push sync-code to '{}': {}", target, e);
        }
        Ok(())
    }
}
