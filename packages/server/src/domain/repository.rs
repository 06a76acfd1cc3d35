//! Repository trait 定義
//!
//! ドメイン層が必要とする状態ストアのインターフェースを定義します。
//! 具体的な実装は Infrastructure 層が提供します（依存性の逆転）。
//!
//! - `ConnectionRegistry`: 接続 → (ユーザー名, ルーム) の対応表。接続状態の唯一の書き手
//! - `RoomStore`: ルームごとの可変状態。ルーム状態の唯一の書き手
//!
//! 生のマップは公開せず、操作単位の契約だけを公開することで不変条件を境界で守ります。

use async_trait::async_trait;

use super::{
    ConnectionId, ExecutionOutcome, Language, MemberEntry, RepositoryError, Room, RoomId,
    Username,
};

/// 接続とユーザー・ルームの対応
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Association {
    pub username: Username,
    pub room_id: RoomId,
}

/// 接続のライフサイクル状態
///
/// `Unjoined → Joined → Leaving → (Unjoined | Gone)`。`Gone` はレコード削除で表現する。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Unjoined,
    Joined(Association),
    /// 退出処理中。二重の切断通知はここで弾かれる
    Leaving(Association),
}

/// Connection Registry trait
#[async_trait]
pub trait ConnectionRegistry: Send + Sync {
    /// 未参加状態の接続レコードを作成
    async fn register(&self, connection_id: ConnectionId);

    /// 接続をユーザー名・ルームに紐付ける（既存の紐付けは上書き）
    async fn associate(
        &self,
        connection_id: &ConnectionId,
        username: Username,
        room_id: RoomId,
    ) -> Result<(), RepositoryError>;

    /// `Joined` 状態の紐付けを取得
    async fn lookup(&self, connection_id: &ConnectionId) -> Option<Association>;

    /// 接続状態を取得（レコードがなければ `None`）
    async fn state(&self, connection_id: &ConnectionId) -> Option<ConnectionState>;

    /// `Joined → Leaving` に遷移させ、紐付けを返す
    ///
    /// 既に `Leaving` / `Unjoined` / 削除済みなら `None`。退出処理を 1 回だけ行うためのゲート。
    async fn begin_leaving(&self, connection_id: &ConnectionId) -> Option<Association>;

    /// `Leaving → Unjoined` に戻す（明示的な leave の後、接続自体は生きている）
    async fn finish_leaving(&self, connection_id: &ConnectionId);

    /// 指定ルームに `Joined` している場合のみ `Unjoined` に戻す（重複タブの追い出し用）
    async fn dissociate(
        &self,
        connection_id: &ConnectionId,
        room_id: &RoomId,
    ) -> Option<Association>;

    /// レコードを削除し、最後の紐付けを返す
    ///
    /// 2 回目以降の呼び出しは `Err(ConnectionNotFound)`（panic しない）。
    async fn remove(
        &self,
        connection_id: &ConnectionId,
    ) -> Result<Option<Association>, RepositoryError>;
}

/// `RoomStore::join` の結果（ロック内で取ったスナップショット）
#[derive(Debug, Clone)]
pub struct JoinSnapshot {
    /// 同じユーザー名で追い出された古い接続
    pub evicted: Vec<ConnectionId>,
    /// 照合済みメンバー（挿入順）
    pub members: Vec<MemberEntry>,
    pub language: Language,
    pub code: String,
    pub outcome: Option<ExecutionOutcome>,
    /// 参加前にメンバーが 0 人だったか
    pub was_empty: bool,
}

/// Room Store trait
///
/// 同一ルームへの操作は 1 つずつ実行され、別ルームへの操作は並行に進む。
#[async_trait]
pub trait RoomStore: Send + Sync {
    /// ルームを取得、なければデフォルト状態で作成
    async fn ensure_room(&self, room_id: &RoomId) -> Room;

    /// 参加処理をまとめて 1 回のロックで行う
    ///
    /// ルーム作成、重複ユーザーの追い出し、最初の参加者による言語設定
    /// （言語が変わる場合は実行結果もクリア）を行い、参加者に送る状態を返す。
    async fn join(
        &self,
        room_id: &RoomId,
        connection_id: ConnectionId,
        username: Username,
        language: Language,
    ) -> JoinSnapshot;

    /// メンバーを追加・上書きし、追い出された接続を返す
    async fn add_member(
        &self,
        room_id: &RoomId,
        connection_id: ConnectionId,
        username: Username,
    ) -> Vec<ConnectionId>;

    /// メンバーを削除し、削除後のメンバー数を返す
    async fn remove_member(
        &self,
        room_id: &RoomId,
        connection_id: &ConnectionId,
    ) -> Result<usize, RepositoryError>;

    /// 照合済みメンバーリスト
    async fn members(&self, room_id: &RoomId) -> Result<Vec<MemberEntry>, RepositoryError>;

    async fn set_code(&self, room_id: &RoomId, code: String) -> Result<(), RepositoryError>;

    async fn get_code(&self, room_id: &RoomId) -> Result<String, RepositoryError>;

    /// 言語を変更し、実行結果をクリアする
    async fn set_language(
        &self,
        room_id: &RoomId,
        language: Language,
    ) -> Result<(), RepositoryError>;

    async fn record_outcome(
        &self,
        room_id: &RoomId,
        outcome: ExecutionOutcome,
    ) -> Result<(), RepositoryError>;

    async fn clear_outcome(&self, room_id: &RoomId) -> Result<(), RepositoryError>;

    async fn get_outcome(
        &self,
        room_id: &RoomId,
    ) -> Result<Option<ExecutionOutcome>, RepositoryError>;

    /// メンバーが 0 人の場合のみルーム状態を破棄する
    ///
    /// 直前に参加があればルームは残る。破棄したら `true`。
    async fn teardown_if_empty(&self, room_id: &RoomId) -> bool;

    /// ルームのスナップショット
    async fn get_room(&self, room_id: &RoomId) -> Option<Room>;

    /// 全ルームのスナップショット（ID 順）
    async fn list_rooms(&self) -> Vec<Room>;
}
