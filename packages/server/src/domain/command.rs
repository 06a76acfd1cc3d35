//! Inbound commands, already validated into domain types.
//!
//! Free-form fields that a use case must validate itself (so it can answer
//! with a specific error) stay as raw strings.

use super::value_object::{ConnectionId, RoomId, Username};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomCommand {
    Join {
        room_id: RoomId,
        username: Username,
        /// Requested language; only honoured when the room has no members.
        language: Option<String>,
    },
    Leave {
        room_id: Option<RoomId>,
    },
    CodeChange {
        room_id: Option<RoomId>,
        code: String,
    },
    SyncCode {
        target: ConnectionId,
        code: String,
    },
    LanguageChange {
        room_id: RoomId,
        language: String,
    },
    ExecuteCode {
        room_id: RoomId,
        language: Option<String>,
        code: Option<String>,
    },
    ExecutionResult {
        room_id: RoomId,
        output: String,
        execution_time_ms: u64,
    },
    ExecutionError {
        room_id: RoomId,
        error: String,
        execution_time_ms: u64,
    },
    ClearOutput {
        room_id: RoomId,
    },
}

impl RoomCommand {
    /// Event name on the wire, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            RoomCommand::Join { .. } => "join",
            RoomCommand::Leave { .. } => "leave",
            RoomCommand::CodeChange { .. } => "code-change",
            RoomCommand::SyncCode { .. } => "sync-code",
            RoomCommand::LanguageChange { .. } => "language-change",
            RoomCommand::ExecuteCode { .. } => "execute-code",
            RoomCommand::ExecutionResult { .. } => "execution-result",
            RoomCommand::ExecutionError { .. } => "execution-error",
            RoomCommand::ClearOutput { .. } => "clear-output",
        }
    }
}
