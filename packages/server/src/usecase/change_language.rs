//! UseCase: ルームの言語変更

use std::sync::Arc;

use crate::domain::{
    ConnectionId, Language, MessagePusher, RoomId, RoomStore, ServerEvent, Username,
    broadcast_targets,
};

use super::{RoomSequencer, error::EventError};

/// 言語変更のユースケース
pub struct ChangeLanguageUseCase {
    store: Arc<dyn RoomStore>,
    message_pusher: Arc<dyn MessagePusher>,
    sequencer: Arc<RoomSequencer>,
}

impl ChangeLanguageUseCase {
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

    /// 言語を変更し、全員に `room-language-update` と `clear-output` を送る
    ///
    /// 未対応の言語なら状態は変えずに `EventError::Invalid` を返す。
    pub async fn execute(
        &self,
        sender: &ConnectionId,
        room_id: &RoomId,
        changed_by: &Username,
        language: &str,
    ) -> Result<Language, EventError> {
        let language = Language::try_from(language)?;

        let turn = self.sequencer.acquire(room_id).await;
        let result = self
            .change_in_turn(sender, room_id, changed_by, language)
            .await;
        self.sequencer.release(room_id, turn).await;
        result?;

        tracing::info!(
            "Room '{}' language changed to {} by '{}'",
            room_id,
            language,
            changed_by
        );
        Ok(language)
    }

    async fn change_in_turn(
        &self,
        sender: &ConnectionId,
        room_id: &RoomId,
        changed_by: &Username,
        language: Language,
    ) -> Result<(), EventError> {
        let members = self.store.members(room_id).await?;
        EventError::require_member(&members, sender, room_id)?;

        self.store.set_language(room_id, language).await?;
        let targets = broadcast_targets(&members, None);

        let events = [
            ServerEvent::RoomLanguageUpdate {
                language,
                changed_by: changed_by.clone(),
            },
            ServerEvent::ClearOutput {
                room_id: room_id.clone(),
                cleared_by: changed_by.clone(),
            },
        ];
        for event in &events {
            if let Err(e) = self.message_pusher.broadcast(targets.clone(), event).await {
                tracing::warn!("Failed to broadcast {}: {}", event.name(), e);
            }
        }
        Ok(())
    }
}
