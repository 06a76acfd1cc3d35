//! UseCase error types.

use thiserror::Error;

use crate::domain::{ConnectionId, MemberEntry, RepositoryError, RoomId, ValueObjectError};

/// 受信イベント処理のエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EventError {
    #[error("malformed event: {0}")]
    Malformed(String),
    #[error(transparent)]
    Invalid(#[from] ValueObjectError),
    #[error("connection '{0}' has not joined a room")]
    NotJoined(ConnectionId),
    #[error("connection '{connection_id}' is not a member of room '{room_id}'")]
    NotAMember {
        connection_id: ConnectionId,
        room_id: RoomId,
    },
    #[error("connection '{0}' is not in the sender's room")]
    UnknownTarget(ConnectionId),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl EventError {
    /// 送信者にエラーを返すかどうか
    ///
    /// 検証エラーだけを返す。メンバーシップ系は leave 直後に届いた古いイベントなど
    /// トランスポートの競合で普通に起きるので、ログに残して捨てる。
    pub fn is_reported(&self) -> bool {
        matches!(self, EventError::Malformed(_) | EventError::Invalid(_))
    }

    /// 送信者がルームストア上のメンバーであることを確かめる
    ///
    /// 追い出された直後のタブはレジストリ上まだ参加中に見えることがあるので、
    /// ルームへの書き込みはストアのメンバーリストで判定する。
    pub fn require_member(
        members: &[MemberEntry],
        connection_id: &ConnectionId,
        room_id: &RoomId,
    ) -> Result<(), EventError> {
        if members.iter().any(|m| &m.connection_id == connection_id) {
            Ok(())
        } else {
            Err(EventError::NotAMember {
                connection_id: connection_id.clone(),
                room_id: room_id.clone(),
            })
        }
    }
}

/// ルーム詳細取得のエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GetRoomDetailError {
    #[error("room not found")]
    RoomNotFound,
    #[error(transparent)]
    InvalidRoomId(#[from] ValueObjectError),
}
