//! UseCase: 受信イベントの振り分け
//!
//! ## 概要
//!
//! 検証済みの `RoomCommand` を送信者の現在の紐付けと照らし合わせてから、
//! 対応するユースケースに渡します。
//!
//! - `join` 以外のイベントは送信者がルームに参加していることが前提
//! - イベントの `roomId` が送信者のルームと違う場合は捨てる（leave 直後の古いイベントなど）
//! - 送信者名は常にレジストリの値を使う（ペイロードの `executedBy` 等は参照しない）
//!
//! レジストリでの確認は入口の絞り込みにすぎない。ルームへの書き込みを伴うイベントは、
//! 各ユースケースがルームの順番の中でストアのメンバーリストと照らし合わせる。

use std::sync::Arc;

use crate::domain::{
    Association, ConnectionId, ConnectionRegistry, MessagePusher, OutcomeResult, PusherChannel,
    RoomCommand, RoomId, ServerEvent,
};

use super::{
    ChangeLanguageUseCase, ExecutionUseCase, JoinRoomUseCase, LeaveRoomUseCase, SyncCodeUseCase,
    error::EventError,
};

/// 受信イベントのルーター
pub struct EventRouter {
    registry: Arc<dyn ConnectionRegistry>,
    message_pusher: Arc<dyn MessagePusher>,
    join_room: Arc<JoinRoomUseCase>,
    leave_room: Arc<LeaveRoomUseCase>,
    sync_code: Arc<SyncCodeUseCase>,
    change_language: Arc<ChangeLanguageUseCase>,
    execution: Arc<ExecutionUseCase>,
}

impl EventRouter {
    pub fn new(
        registry: Arc<dyn ConnectionRegistry>,
        message_pusher: Arc<dyn MessagePusher>,
        join_room: Arc<JoinRoomUseCase>,
        leave_room: Arc<LeaveRoomUseCase>,
        sync_code: Arc<SyncCodeUseCase>,
        change_language: Arc<ChangeLanguageUseCase>,
        execution: Arc<ExecutionUseCase>,
    ) -> Self {
        Self {
            registry,
            message_pusher,
            join_room,
            leave_room,
            sync_code,
            change_language,
            execution,
        }
    }

    /// 新しい接続を登録し、接続 ID を払い出す
    pub async fn connect(&self, sender: PusherChannel) -> ConnectionId {
        let connection_id = ConnectionId::generate();
        self.registry.register(connection_id.clone()).await;
        self.message_pusher
            .register_client(connection_id.clone(), sender)
            .await;
        tracing::info!("Connection '{}' opened", connection_id);
        connection_id
    }

    /// トランスポート切断（何度呼ばれても退出処理は 1 回）
    pub async fn disconnect(&self, connection_id: &ConnectionId) {
        self.leave_room.disconnect(connection_id).await;
    }

    /// イベントを処理する
    pub async fn dispatch(
        &self,
        connection_id: &ConnectionId,
        command: RoomCommand,
    ) -> Result<(), EventError> {
        tracing::debug!("'{}' -> {}", connection_id, command.name());

        match command {
            RoomCommand::Join {
                room_id,
                username,
                language,
            } => {
                self.join_room
                    .execute(connection_id, room_id, username, language)
                    .await?;
            }
            RoomCommand::Leave { room_id } => {
                self.authorize(connection_id, room_id.as_ref()).await?;
                self.leave_room.leave(connection_id).await;
            }
            RoomCommand::CodeChange { room_id, code } => {
                let association = self.authorize(connection_id, room_id.as_ref()).await?;
                self.sync_code
                    .code_change(connection_id, &association.room_id, code)
                    .await?;
            }
            RoomCommand::SyncCode { target, code } => {
                let association = self.authorize(connection_id, None).await?;
                self.sync_code
                    .sync_code(connection_id, &association.room_id, &target, code)
                    .await?;
            }
            RoomCommand::LanguageChange { room_id, language } => {
                let association = self.authorize(connection_id, Some(&room_id)).await?;
                self.change_language
                    .execute(connection_id, &room_id, &association.username, &language)
                    .await?;
            }
            RoomCommand::ExecuteCode {
                room_id,
                language,
                code,
            } => {
                let association = self.authorize(connection_id, Some(&room_id)).await?;
                self.execution
                    .start(
                        connection_id,
                        &room_id,
                        &association.username,
                        language.as_deref(),
                        code,
                    )
                    .await?;
            }
            RoomCommand::ExecutionResult {
                room_id,
                output,
                execution_time_ms,
            } => {
                let association = self.authorize(connection_id, Some(&room_id)).await?;
                self.execution
                    .record(
                        connection_id,
                        &room_id,
                        &association.username,
                        OutcomeResult::Success { output },
                        execution_time_ms,
                    )
                    .await?;
            }
            RoomCommand::ExecutionError {
                room_id,
                error,
                execution_time_ms,
            } => {
                let association = self.authorize(connection_id, Some(&room_id)).await?;
                self.execution
                    .record(
                        connection_id,
                        &room_id,
                        &association.username,
                        OutcomeResult::Error { error },
                        execution_time_ms,
                    )
                    .await?;
            }
            RoomCommand::ClearOutput { room_id } => {
                let association = self.authorize(connection_id, Some(&room_id)).await?;
                self.execution
                    .clear(connection_id, &room_id, &association.username)
                    .await?;
            }
        }
        Ok(())
    }

    /// 失敗したイベントを処理する
    ///
    /// 検証エラーだけを送信者に `error` で返し、それ以外はログに残して捨てる。
    pub async fn report(&self, connection_id: &ConnectionId, error: &EventError) {
        if !error.is_reported() {
            tracing::warn!("Dropped event from '{}': {}", connection_id, error);
            return;
        }

        tracing::warn!("Rejected event from '{}': {}", connection_id, error);
        let event = ServerEvent::Error {
            message: error.to_string(),
        };
        if let Err(e) = self.message_pusher.push_to(connection_id, &event).await {
            tracing::warn!("Failed to report error to '{}': {}", connection_id, e);
        }
    }

    async fn authorize(
        &self,
        connection_id: &ConnectionId,
        room_id: Option<&RoomId>,
    ) -> Result<Association, EventError> {
        let association = self
            .registry
            .lookup(connection_id)
            .await
            .ok_or_else(|| EventError::NotJoined(connection_id.clone()))?;

        match room_id {
            Some(room_id) if room_id != &association.room_id => Err(EventError::NotAMember {
                connection_id: connection_id.clone(),
                room_id: room_id.clone(),
            }),
            _ => Ok(association),
        }
    }
}
