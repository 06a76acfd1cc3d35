//! Outbound notifications produced by the use cases.
//!
//! These are transport-agnostic; the WebSocket pusher turns them into wire DTOs.

use super::{
    entity::{ExecutionOutcome, MemberEntry, OutcomeResult},
    value_object::{ConnectionId, Language, RoomId, Username},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerEvent {
    /// Reconciled member list. `username` / `connection_id` name the subject of
    /// the notice: the joiner on join, the recipient itself on a re-broadcast.
    Joined {
        clients: Vec<MemberEntry>,
        username: Username,
        connection_id: ConnectionId,
    },
    Disconnected {
        connection_id: ConnectionId,
        username: Username,
    },
    CodeChange {
        code: String,
    },
    LanguageSync {
        language: Language,
    },
    RoomLanguageUpdate {
        language: Language,
        changed_by: Username,
    },
    ExecutionStart {
        executed_by: Username,
    },
    ExecutionResult {
        room_id: RoomId,
        output: String,
        executed_by: Username,
        execution_time_ms: u64,
    },
    ExecutionError {
        room_id: RoomId,
        error: String,
        executed_by: Username,
        execution_time_ms: u64,
    },
    ClearOutput {
        room_id: RoomId,
        cleared_by: Username,
    },
    /// Validation failure, sent to the offending connection only.
    Error {
        message: String,
    },
}

impl ServerEvent {
    /// Build the `execution-result` / `execution-error` notice for an outcome.
    pub fn from_outcome(room_id: RoomId, outcome: ExecutionOutcome) -> Self {
        let ExecutionOutcome {
            result,
            executed_by,
            execution_time_ms,
        } = outcome;
        match result {
            OutcomeResult::Success { output } => ServerEvent::ExecutionResult {
                room_id,
                output,
                executed_by,
                execution_time_ms,
            },
            OutcomeResult::Error { error } => ServerEvent::ExecutionError {
                room_id,
                error,
                executed_by,
                execution_time_ms,
            },
        }
    }

    /// Event name on the wire.
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::Joined { .. } => "joined",
            ServerEvent::Disconnected { .. } => "disconnected",
            ServerEvent::CodeChange { .. } => "code-change",
            ServerEvent::LanguageSync { .. } => "language-sync",
            ServerEvent::RoomLanguageUpdate { .. } => "room-language-update",
            ServerEvent::ExecutionStart { .. } => "execution-start",
            ServerEvent::ExecutionResult { .. } => "execution-result",
            ServerEvent::ExecutionError { .. } => "execution-error",
            ServerEvent::ClearOutput { .. } => "clear-output",
            ServerEvent::Error { .. } => "error",
        }
    }
}
