//! Entities
//!
//! ルームの可変状態（メンバー、コードバッファ、言語、直近の実行結果）を表します。
//! 同一ルームへの操作の直列化は Repository 実装の責務で、ここでは扱いません。

use super::{
    presence::{Reconciliation, reconcile},
    value_object::{ConnectionId, Language, RoomId, Timestamp, Username},
};

/// ルーム内のメンバーエントリ（接続 ID とユーザー名の組）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberEntry {
    pub connection_id: ConnectionId,
    pub username: Username,
    pub joined_at: Timestamp,
    /// ルーム内での挿入シーケンス（大きいほど新しい）
    pub seq: u64,
}

/// 実行結果の中身
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutcomeResult {
    Success { output: String },
    Error { error: String },
}

/// ルームに保持される直近のコード実行結果
///
/// 追記ログではなく、次の実行または明示的なクリアで上書きされる。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionOutcome {
    pub result: OutcomeResult,
    pub executed_by: Username,
    pub execution_time_ms: u64,
}

impl ExecutionOutcome {
    pub fn success(output: String, executed_by: Username, execution_time_ms: u64) -> Self {
        Self {
            result: OutcomeResult::Success { output },
            executed_by,
            execution_time_ms,
        }
    }

    pub fn error(error: String, executed_by: Username, execution_time_ms: u64) -> Self {
        Self {
            result: OutcomeResult::Error { error },
            executed_by,
            execution_time_ms,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.result, OutcomeResult::Success { .. })
    }
}

/// Room エンティティ
#[derive(Debug, Clone)]
pub struct Room {
    pub id: RoomId,
    /// 共有コードバッファ（last-writer-wins）
    pub code: String,
    pub language: Language,
    pub outcome: Option<ExecutionOutcome>,
    pub created_at: Timestamp,
    /// 照合済みのメンバー（挿入順、ユーザー名は一意）
    members: Vec<MemberEntry>,
    next_seq: u64,
}

impl Room {
    /// デフォルト言語・空バッファでルームを作成
    pub fn new(id: RoomId, created_at: Timestamp) -> Self {
        Self {
            id,
            code: String::new(),
            language: Language::default(),
            outcome: None,
            created_at,
            members: Vec::new(),
            next_seq: 0,
        }
    }

    pub fn members(&self) -> &[MemberEntry] {
        &self.members
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn contains(&self, connection_id: &ConnectionId) -> bool {
        self.members
            .iter()
            .any(|m| &m.connection_id == connection_id)
    }

    pub fn member(&self, connection_id: &ConnectionId) -> Option<&MemberEntry> {
        self.members
            .iter()
            .find(|m| &m.connection_id == connection_id)
    }

    /// メンバーを追加し、同じユーザー名の古い接続を追い出す
    ///
    /// 同じ接続 ID が既にいれば上書き（新しいエントリとして末尾に付け直す）。
    ///
    /// # Returns
    ///
    /// 追い出された接続 ID のリスト（呼び出し側がトランスポートグループから外す）
    pub fn add_member(
        &mut self,
        connection_id: ConnectionId,
        username: Username,
        joined_at: Timestamp,
    ) -> Vec<ConnectionId> {
        self.members.retain(|m| m.connection_id != connection_id);
        self.next_seq += 1;
        self.members.push(MemberEntry {
            connection_id,
            username,
            joined_at,
            seq: self.next_seq,
        });

        let Reconciliation { members, evicted } = reconcile(&self.members);
        self.members = members;
        evicted
    }

    /// メンバーを削除
    ///
    /// # Returns
    ///
    /// 削除されたエントリ（存在しなければ `None`）
    pub fn remove_member(&mut self, connection_id: &ConnectionId) -> Option<MemberEntry> {
        let index = self
            .members
            .iter()
            .position(|m| &m.connection_id == connection_id)?;
        Some(self.members.remove(index))
    }

    pub fn set_code(&mut self, code: String) {
        self.code = code;
    }

    /// 言語を変更する。以前の実行結果は無効になるので常にクリアする。
    pub fn set_language(&mut self, language: Language) {
        self.language = language;
        self.outcome = None;
    }

    pub fn record_outcome(&mut self, outcome: ExecutionOutcome) {
        self.outcome = Some(outcome);
    }

    pub fn clear_outcome(&mut self) {
        self.outcome = None;
    }
}
