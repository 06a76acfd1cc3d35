//! InMemory Room Store 実装
//!
//! ルーム ID → ルームセルの HashMap を保持します。
//!
//! ## ロック構成
//!
//! - インデックス（`rooms`）のロックは検索・挿入・削除の間だけ保持する
//! - ルームごとのセル（`Arc<Mutex<RoomCell>>`）のロックで同一ルームの操作を直列化する
//! - 別ルームの操作は別のセルをロックするので並行に進む
//!
//! ロック順序は「セル → インデックス」のみ（破棄時）。インデックスを保持したまま
//! セルのロックを待つ経路はないのでデッドロックしない。
//!
//! ## 破棄と再参加の競合
//!
//! 破棄されたセルには `retired` を立ててからインデックスから外す。破棄直前に
//! セルを掴んでいた参加処理は `retired` を見てやり直し、新しいルームを作成する。

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tsukue_shared::time::{Clock, SystemClock};

use crate::domain::{
    ConnectionId, ExecutionOutcome, JoinSnapshot, Language, MemberEntry, RepositoryError, Room,
    RoomId, RoomStore, Timestamp, Username,
};

struct RoomCell {
    room: Room,
    retired: bool,
}

type SharedCell = Arc<Mutex<RoomCell>>;

/// インメモリ Room Store 実装
pub struct InMemoryRoomStore {
    rooms: Mutex<HashMap<RoomId, SharedCell>>,
    clock: Arc<dyn Clock>,
}

impl Default for InMemoryRoomStore {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

impl InMemoryRoomStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            rooms: Mutex::new(HashMap::new()),
            clock,
        }
    }

    fn now(&self) -> Timestamp {
        Timestamp::new(self.clock.now_millis())
    }

    async fn cell(&self, room_id: &RoomId) -> Option<SharedCell> {
        let rooms = self.rooms.lock().await;
        rooms.get(room_id).cloned()
    }

    async fn cell_or_create(&self, room_id: &RoomId) -> SharedCell {
        let created_at = self.now();
        let mut rooms = self.rooms.lock().await;
        rooms
            .entry(room_id.clone())
            .or_insert_with(|| {
                tracing::info!("Room '{}' created", room_id);
                Arc::new(Mutex::new(RoomCell {
                    room: Room::new(room_id.clone(), created_at),
                    retired: false,
                }))
            })
            .clone()
    }

    /// 既存ルームに対して `f` を実行
    async fn with_room<T, F>(&self, room_id: &RoomId, f: F) -> Result<T, RepositoryError>
    where
        F: FnOnce(&mut Room) -> T + Send,
        T: Send,
    {
        let not_found = || RepositoryError::RoomNotFound(room_id.to_string());
        let cell = self.cell(room_id).await.ok_or_else(not_found)?;
        let mut guard = cell.lock().await;
        if guard.retired {
            return Err(not_found());
        }
        Ok(f(&mut guard.room))
    }

    /// ルームがなければ作成して `f` を実行
    async fn with_room_or_create<T, F>(&self, room_id: &RoomId, f: F) -> T
    where
        F: FnOnce(&mut Room) -> T + Send,
        T: Send,
    {
        loop {
            let cell = self.cell_or_create(room_id).await;
            let mut guard = cell.lock().await;
            if guard.retired {
                tracing::debug!("Room '{}' was torn down concurrently, retrying", room_id);
                continue;
            }
            return f(&mut guard.room);
        }
    }
}

#[async_trait]
impl RoomStore for InMemoryRoomStore {
    async fn ensure_room(&self, room_id: &RoomId) -> Room {
        self.with_room_or_create(room_id, |room| room.clone()).await
    }

    async fn join(
        &self,
        room_id: &RoomId,
        connection_id: ConnectionId,
        username: Username,
        language: Language,
    ) -> JoinSnapshot {
        let joined_at = self.now();
        self.with_room_or_create(room_id, move |room| {
            let was_empty = room.is_empty();
            if was_empty && room.language != language {
                room.set_language(language);
            }
            let evicted = room.add_member(connection_id, username, joined_at);
            JoinSnapshot {
                evicted,
                members: room.members().to_vec(),
                language: room.language,
                code: room.code.clone(),
                outcome: room.outcome.clone(),
                was_empty,
            }
        })
        .await
    }

    async fn add_member(
        &self,
        room_id: &RoomId,
        connection_id: ConnectionId,
        username: Username,
    ) -> Vec<ConnectionId> {
        let joined_at = self.now();
        self.with_room_or_create(room_id, move |room| {
            room.add_member(connection_id, username, joined_at)
        })
        .await
    }

    async fn remove_member(
        &self,
        room_id: &RoomId,
        connection_id: &ConnectionId,
    ) -> Result<usize, RepositoryError> {
        self.with_room(room_id, |room| {
            room.remove_member(connection_id);
            room.member_count()
        })
        .await
    }

    async fn members(&self, room_id: &RoomId) -> Result<Vec<MemberEntry>, RepositoryError> {
        self.with_room(room_id, |room| room.members().to_vec()).await
    }

    async fn set_code(&self, room_id: &RoomId, code: String) -> Result<(), RepositoryError> {
        self.with_room(room_id, move |room| room.set_code(code)).await
    }

    async fn get_code(&self, room_id: &RoomId) -> Result<String, RepositoryError> {
        self.with_room(room_id, |room| room.code.clone()).await
    }

    async fn set_language(
        &self,
        room_id: &RoomId,
        language: Language,
    ) -> Result<(), RepositoryError> {
        self.with_room(room_id, move |room| room.set_language(language))
            .await
    }

    async fn record_outcome(
        &self,
        room_id: &RoomId,
        outcome: ExecutionOutcome,
    ) -> Result<(), RepositoryError> {
        self.with_room(room_id, move |room| room.record_outcome(outcome))
            .await
    }

    async fn clear_outcome(&self, room_id: &RoomId) -> Result<(), RepositoryError> {
        self.with_room(room_id, |room| room.clear_outcome()).await
    }

    async fn get_outcome(
        &self,
        room_id: &RoomId,
    ) -> Result<Option<ExecutionOutcome>, RepositoryError> {
        self.with_room(room_id, |room| room.outcome.clone()).await
    }

    async fn teardown_if_empty(&self, room_id: &RoomId) -> bool {
        let Some(cell) = self.cell(room_id).await else {
            return false;
        };
        let mut guard = cell.lock().await;
        if guard.retired || !guard.room.is_empty() {
            return false;
        }
        guard.retired = true;

        let mut rooms = self.rooms.lock().await;
        if rooms
            .get(room_id)
            .is_some_and(|current| Arc::ptr_eq(current, &cell))
        {
            rooms.remove(room_id);
        }
        tracing::info!("Room '{}' torn down", room_id);
        true
    }

    async fn get_room(&self, room_id: &RoomId) -> Option<Room> {
        self.with_room(room_id, |room| room.clone()).await.ok()
    }

    async fn list_rooms(&self) -> Vec<Room> {
        let cells: Vec<SharedCell> = {
            let rooms = self.rooms.lock().await;
            rooms.values().cloned().collect()
        };

        let mut snapshot = Vec::with_capacity(cells.len());
        for cell in cells {
            let guard = cell.lock().await;
            if !guard.retired {
                snapshot.push(guard.room.clone());
            }
        }
        snapshot.sort_by(|a, b| a.id.cmp(&b.id));
        snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::OutcomeResult;
    use tsukue_shared::time::FixedClock;

    // ========================================
    // テスト作業記録
    // ========================================
    // 【何をテストするか】
    // - ルームの暗黙作成と、空になったルームの破棄
    // - 参加時の重複ユーザー追い出しと「最初の参加者が言語を決める」ルール
    // - 言語変更による実行結果のクリア
    // - 同一ルームへの並行参加でメンバー数が崩れないこと
    //
    // 【なぜこのテストが必要か】
    // - Room Store はルーム状態の唯一の書き手で、不変条件はここで守られる
    // ========================================

    fn create_test_store() -> InMemoryRoomStore {
        InMemoryRoomStore::new(Arc::new(FixedClock::new(1_000)))
    }

    fn conn(id: &str) -> ConnectionId {
        ConnectionId::new(id.to_string()).unwrap()
    }

    fn room_id(id: &str) -> RoomId {
        RoomId::new(id.to_string()).unwrap()
    }

    fn user(name: &str) -> Username {
        Username::new(name.to_string()).unwrap()
    }

    #[tokio::test]
    async fn test_ensure_room_creates_with_defaults() {
        // テスト項目: 未知のルーム ID でデフォルト状態のルームが作られる
        // given (前提条件):
        let store = create_test_store();

        // when (操作):
        let room = store.ensure_room(&room_id("r1")).await;

        // then (期待する結果):
        assert_eq!(room.language, Language::JavaScript);
        assert_eq!(room.code, "");
        assert_eq!(room.created_at, Timestamp::new(1_000));
        assert_eq!(store.list_rooms().await.len(), 1);
    }

    #[tokio::test]
    async fn test_first_joiner_sets_language() {
        // テスト項目: 最初の参加者の言語がルームの言語になり、後続の参加者は変更できない
        // given (前提条件):
        let store = create_test_store();
        let r1 = room_id("r1");

        // when (操作):
        let first = store
            .join(&r1, conn("a"), user("alice"), Language::Java)
            .await;
        let second = store
            .join(&r1, conn("b"), user("bob"), Language::Cpp)
            .await;

        // then (期待する結果):
        assert!(first.was_empty);
        assert_eq!(first.language, Language::Java);
        assert!(!second.was_empty);
        assert_eq!(second.language, Language::Java);
        assert_eq!(second.members.len(), 2);
    }

    #[tokio::test]
    async fn test_join_evicts_stale_tab() {
        // テスト項目: 同じユーザーの 2 つ目のタブが参加すると古いタブが追い出される
        // given (前提条件):
        let store = create_test_store();
        let r1 = room_id("r1");
        store
            .join(&r1, conn("a"), user("alice"), Language::JavaScript)
            .await;

        // when (操作):
        let snapshot = store
            .join(&r1, conn("b"), user("alice"), Language::JavaScript)
            .await;

        // then (期待する結果):
        assert_eq!(snapshot.evicted, vec![conn("a")]);
        assert_eq!(snapshot.members.len(), 1);
        assert_eq!(snapshot.members[0].connection_id, conn("b"));
    }

    #[tokio::test]
    async fn test_add_member_returns_evicted_connection() {
        // テスト項目: add_member も重複ユーザーの古い接続を返す
        // given (前提条件):
        let store = create_test_store();
        let r1 = room_id("r1");
        store.add_member(&r1, conn("a"), user("alice")).await;

        // when (操作):
        let evicted = store.add_member(&r1, conn("b"), user("alice")).await;

        // then (期待する結果):
        assert_eq!(evicted, vec![conn("a")]);
    }

    #[tokio::test]
    async fn test_remove_member_returns_remaining_count() {
        // テスト項目: 削除後のメンバー数が返される
        // given (前提条件):
        let store = create_test_store();
        let r1 = room_id("r1");
        store.add_member(&r1, conn("a"), user("alice")).await;
        store.add_member(&r1, conn("b"), user("bob")).await;

        // when (操作):
        let remaining = store.remove_member(&r1, &conn("a")).await.unwrap();

        // then (期待する結果):
        assert_eq!(remaining, 1);
        let members = store.members(&r1).await.unwrap();
        assert_eq!(members[0].username, user("bob"));
    }

    #[tokio::test]
    async fn test_operations_on_unknown_room_fail() {
        // テスト項目: 存在しないルームへの操作は RoomNotFound
        // given (前提条件):
        let store = create_test_store();

        // when (操作):
        let result = store.set_code(&room_id("nope"), "x".to_string()).await;

        // then (期待する結果):
        assert_eq!(
            result,
            Err(RepositoryError::RoomNotFound("nope".to_string()))
        );
    }

    #[tokio::test]
    async fn test_set_code_last_writer_wins() {
        // テスト項目: コードバッファは最後の書き込みで上書きされる
        // given (前提条件):
        let store = create_test_store();
        let r1 = room_id("r1");
        store.ensure_room(&r1).await;

        // when (操作):
        store.set_code(&r1, "x=1".to_string()).await.unwrap();
        store.set_code(&r1, "x=2".to_string()).await.unwrap();

        // then (期待する結果):
        assert_eq!(store.get_code(&r1).await.unwrap(), "x=2");
    }

    #[tokio::test]
    async fn test_set_language_clears_outcome() {
        // テスト項目: 言語変更で実行結果がクリアされる
        // given (前提条件):
        let store = create_test_store();
        let r1 = room_id("r1");
        store.ensure_room(&r1).await;
        store
            .record_outcome(
                &r1,
                ExecutionOutcome::success("42".to_string(), user("alice"), 7),
            )
            .await
            .unwrap();

        // when (操作):
        store.set_language(&r1, Language::Cpp).await.unwrap();

        // then (期待する結果):
        assert_eq!(store.get_outcome(&r1).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_record_and_clear_outcome() {
        // テスト項目: 実行結果の記録とクリア
        // given (前提条件):
        let store = create_test_store();
        let r1 = room_id("r1");
        store.ensure_room(&r1).await;

        // when (操作):
        store
            .record_outcome(
                &r1,
                ExecutionOutcome::error("boom".to_string(), user("bob"), 3),
            )
            .await
            .unwrap();
        let recorded = store.get_outcome(&r1).await.unwrap();
        store.clear_outcome(&r1).await.unwrap();

        // then (期待する結果):
        assert_eq!(
            recorded.map(|o| o.result),
            Some(OutcomeResult::Error {
                error: "boom".to_string()
            })
        );
        assert_eq!(store.get_outcome(&r1).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_teardown_only_when_empty() {
        // テスト項目: メンバーがいるルームは破棄されない
        // given (前提条件):
        let store = create_test_store();
        let r1 = room_id("r1");
        store.add_member(&r1, conn("a"), user("alice")).await;

        // when (操作):
        let torn_down = store.teardown_if_empty(&r1).await;

        // then (期待する結果):
        assert!(!torn_down);
        assert!(store.get_room(&r1).await.is_some());
    }

    #[tokio::test]
    async fn test_teardown_discards_state_and_rejoin_starts_fresh() {
        // テスト項目: 最後のメンバーが抜けて破棄された後、再参加はデフォルト状態から始まる
        // given (前提条件):
        let store = create_test_store();
        let r1 = room_id("r1");
        store.join(&r1, conn("a"), user("alice"), Language::Java).await;
        store.set_code(&r1, "int x;".to_string()).await.unwrap();
        store.remove_member(&r1, &conn("a")).await.unwrap();

        // when (操作):
        let torn_down = store.teardown_if_empty(&r1).await;
        let again = store.teardown_if_empty(&r1).await;
        let snapshot = store
            .join(&r1, conn("b"), user("bob"), Language::JavaScript)
            .await;

        // then (期待する結果):
        assert!(torn_down);
        assert!(!again);
        assert_eq!(snapshot.code, "");
        assert_eq!(snapshot.language, Language::JavaScript);
        assert!(snapshot.was_empty);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_joins_are_serialized_per_room() {
        // テスト項目: 同一ルームへの並行参加でメンバーが欠けず、ユーザー名も重複しない
        // given (前提条件):
        let store = Arc::new(create_test_store());
        let r1 = room_id("r1");

        // when (操作): 20 ユーザーがそれぞれ 2 タブで同時に参加
        let mut handles = Vec::new();
        for i in 0..40 {
            let store = store.clone();
            let r1 = r1.clone();
            handles.push(tokio::spawn(async move {
                store
                    .join(
                        &r1,
                        conn(&format!("c{i}")),
                        user(&format!("u{}", i % 20)),
                        Language::JavaScript,
                    )
                    .await
            }));
        }
        let mut evicted = 0;
        for handle in handles {
            evicted += handle.await.unwrap().evicted.len();
        }

        // then (期待する結果):
        let members = store.members(&r1).await.unwrap();
        assert_eq!(members.len(), 20);
        assert_eq!(evicted, 20);
    }
}
