//! HTTP API response DTOs.

use serde::{Deserialize, Serialize};

/// `GET /api/rooms` の 1 要素
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSummaryDto {
    pub id: String,
    pub language: String,
    /// 照合済みメンバーのユーザー名
    pub members: Vec<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberDetailDto {
    pub connection_id: String,
    pub username: String,
    pub joined_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutcomeDto {
    pub success: bool,
    pub output: Option<String>,
    pub error: Option<String>,
    pub executed_by: String,
    pub execution_time: u64,
}

/// `GET /api/rooms/{room_id}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomDetailDto {
    pub id: String,
    pub language: String,
    pub code: String,
    pub members: Vec<MemberDetailDto>,
    pub outcome: Option<OutcomeDto>,
    pub created_at: String,
}
