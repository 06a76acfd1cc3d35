//! Conversion logic between DTOs and domain types.

use tsukue_shared::time::to_jst_rfc3339;

use crate::domain::{
    ConnectionId, ExecutionOutcome, MemberEntry, OutcomeResult, Room, RoomCommand, RoomId,
    ServerEvent, Username, ValueObjectError,
};
use crate::infrastructure::dto::{http, websocket as dto};

// ========================================
// DTO → Domain
// ========================================

fn optional_room_id(raw: Option<String>) -> Result<Option<RoomId>, ValueObjectError> {
    raw.map(RoomId::try_from).transpose()
}

impl TryFrom<dto::ClientMessage> for RoomCommand {
    type Error = ValueObjectError;

    fn try_from(message: dto::ClientMessage) -> Result<Self, Self::Error> {
        let command = match message {
            dto::ClientMessage::Join {
                room_id,
                username,
                language,
            } => RoomCommand::Join {
                room_id: RoomId::try_from(room_id)?,
                username: Username::try_from(username)?,
                language,
            },
            dto::ClientMessage::Leave { room_id } => RoomCommand::Leave {
                room_id: optional_room_id(room_id)?,
            },
            dto::ClientMessage::CodeChange { room_id, code } => RoomCommand::CodeChange {
                room_id: optional_room_id(room_id)?,
                code,
            },
            dto::ClientMessage::SyncCode {
                target_connection_id,
                code,
            } => RoomCommand::SyncCode {
                target: ConnectionId::try_from(target_connection_id)?,
                code,
            },
            dto::ClientMessage::LanguageChange { room_id, language } => {
                RoomCommand::LanguageChange {
                    room_id: RoomId::try_from(room_id)?,
                    language,
                }
            }
            dto::ClientMessage::ExecuteCode {
                room_id,
                language,
                code,
                ..
            } => RoomCommand::ExecuteCode {
                room_id: RoomId::try_from(room_id)?,
                language,
                code,
            },
            dto::ClientMessage::ExecutionResult {
                room_id,
                output,
                execution_time,
                ..
            } => RoomCommand::ExecutionResult {
                room_id: RoomId::try_from(room_id)?,
                output,
                execution_time_ms: execution_time,
            },
            dto::ClientMessage::ExecutionError {
                room_id,
                error,
                execution_time,
                ..
            } => RoomCommand::ExecutionError {
                room_id: RoomId::try_from(room_id)?,
                error,
                execution_time_ms: execution_time,
            },
            dto::ClientMessage::ClearOutput { room_id, .. } => RoomCommand::ClearOutput {
                room_id: RoomId::try_from(room_id)?,
            },
        };
        Ok(command)
    }
}

// ========================================
// Domain → DTO
// ========================================

impl From<&MemberEntry> for dto::ClientInfo {
    fn from(entry: &MemberEntry) -> Self {
        Self {
            connection_id: entry.connection_id.to_string(),
            username: entry.username.to_string(),
        }
    }
}

impl From<&ServerEvent> for dto::ServerMessage {
    fn from(event: &ServerEvent) -> Self {
        match event {
            ServerEvent::Joined {
                clients,
                username,
                connection_id,
            } => dto::ServerMessage::Joined {
                clients: clients.iter().map(dto::ClientInfo::from).collect(),
                username: username.to_string(),
                connection_id: connection_id.to_string(),
            },
            ServerEvent::Disconnected {
                connection_id,
                username,
            } => dto::ServerMessage::Disconnected {
                connection_id: connection_id.to_string(),
                username: username.to_string(),
            },
            ServerEvent::CodeChange { code } => dto::ServerMessage::CodeChange { code: code.clone() },
            ServerEvent::LanguageSync { language } => dto::ServerMessage::LanguageSync {
                language: language.to_string(),
            },
            ServerEvent::RoomLanguageUpdate {
                language,
                changed_by,
            } => dto::ServerMessage::RoomLanguageUpdate {
                language: language.to_string(),
                changed_by: changed_by.to_string(),
            },
            ServerEvent::ExecutionStart { executed_by } => dto::ServerMessage::ExecutionStart {
                executed_by: executed_by.to_string(),
            },
            ServerEvent::ExecutionResult {
                room_id,
                output,
                executed_by,
                execution_time_ms,
            } => dto::ServerMessage::ExecutionResult {
                room_id: room_id.to_string(),
                output: output.clone(),
                executed_by: executed_by.to_string(),
                execution_time: *execution_time_ms,
            },
            ServerEvent::ExecutionError {
                room_id,
                error,
                executed_by,
                execution_time_ms,
            } => dto::ServerMessage::ExecutionError {
                room_id: room_id.to_string(),
                error: error.clone(),
                executed_by: executed_by.to_string(),
                execution_time: *execution_time_ms,
            },
            ServerEvent::ClearOutput {
                room_id,
                cleared_by,
            } => dto::ServerMessage::ClearOutput {
                room_id: room_id.to_string(),
                cleared_by: cleared_by.to_string(),
            },
            ServerEvent::Error { message } => dto::ServerMessage::Error {
                message: message.clone(),
            },
        }
    }
}

impl From<&ExecutionOutcome> for http::OutcomeDto {
    fn from(outcome: &ExecutionOutcome) -> Self {
        let (output, error) = match &outcome.result {
            OutcomeResult::Success { output } => (Some(output.clone()), None),
            OutcomeResult::Error { error } => (None, Some(error.clone())),
        };
        Self {
            success: outcome.is_success(),
            output,
            error,
            executed_by: outcome.executed_by.to_string(),
            execution_time: outcome.execution_time_ms,
        }
    }
}

impl From<&Room> for http::RoomSummaryDto {
    fn from(room: &Room) -> Self {
        Self {
            id: room.id.to_string(),
            language: room.language.to_string(),
            members: room
                .members()
                .iter()
                .map(|m| m.username.to_string())
                .collect(),
            created_at: to_jst_rfc3339(room.created_at.value()),
        }
    }
}

impl From<&Room> for http::RoomDetailDto {
    fn from(room: &Room) -> Self {
        Self {
            id: room.id.to_string(),
            language: room.language.to_string(),
            code: room.code.clone(),
            members: room
                .members()
                .iter()
                .map(|m| http::MemberDetailDto {
                    connection_id: m.connection_id.to_string(),
                    username: m.username.to_string(),
                    joined_at: to_jst_rfc3339(m.joined_at.value()),
                })
                .collect(),
            outcome: room.outcome.as_ref().map(http::OutcomeDto::from),
            created_at: to_jst_rfc3339(room.created_at.value()),
        }
    }
}
