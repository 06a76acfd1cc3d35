//! WebSocket event DTOs.
//!
//! Every frame is a JSON object whose `type` field carries the event name;
//! the payload fields sit next to it in camelCase:
//!
//! ```text
//! {"type":"join","roomId":"r1","username":"alice","language":"java"}
//! {"type":"code-change","code":"x=1"}
//! ```

use serde::{Deserialize, Deserializer, Serialize};

/// Events sent by clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    Join {
        room_id: String,
        username: String,
        #[serde(default)]
        language: Option<String>,
    },
    Leave {
        #[serde(default)]
        room_id: Option<String>,
    },
    CodeChange {
        #[serde(default)]
        room_id: Option<String>,
        code: String,
    },
    SyncCode {
        target_connection_id: String,
        code: String,
    },
    LanguageChange {
        room_id: String,
        language: String,
    },
    ExecuteCode {
        room_id: String,
        #[serde(default)]
        language: Option<String>,
        #[serde(default)]
        code: Option<String>,
        /// Informational; the registered username is authoritative.
        #[serde(default)]
        executed_by: Option<String>,
    },
    ExecutionResult {
        room_id: String,
        output: String,
        #[serde(default)]
        executed_by: Option<String>,
        #[serde(default, deserialize_with = "round_millis")]
        execution_time: u64,
    },
    ExecutionError {
        room_id: String,
        error: String,
        #[serde(default)]
        executed_by: Option<String>,
        #[serde(default, deserialize_with = "round_millis")]
        execution_time: u64,
    },
    ClearOutput {
        room_id: String,
        #[serde(default)]
        cleared_by: Option<String>,
    },
}

/// Browsers measure with `performance.now()`, so durations may arrive fractional.
fn round_millis<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let millis = f64::deserialize(deserializer)?;
    if !millis.is_finite() || millis <= 0.0 {
        return Ok(0);
    }
    Ok(millis.round() as u64)
}

/// Member entry as seen by clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientInfo {
    pub connection_id: String,
    pub username: String,
}

/// Events sent by the coordinator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    Joined {
        clients: Vec<ClientInfo>,
        username: String,
        connection_id: String,
    },
    Disconnected {
        connection_id: String,
        username: String,
    },
    CodeChange {
        code: String,
    },
    LanguageSync {
        language: String,
    },
    RoomLanguageUpdate {
        language: String,
        changed_by: String,
    },
    ExecutionStart {
        executed_by: String,
    },
    ExecutionResult {
        room_id: String,
        output: String,
        executed_by: String,
        execution_time: u64,
    },
    ExecutionError {
        room_id: String,
        error: String,
        executed_by: String,
        execution_time: u64,
    },
    ClearOutput {
        room_id: String,
        cleared_by: String,
    },
    Error {
        message: String,
    },
}
