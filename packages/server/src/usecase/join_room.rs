//! UseCase: ルーム参加処理
//!
//! ## 処理順序
//!
//! 1. 別のルームに参加中なら先にそちらを退出する
//!
//! ここから先は参加先ルームの順番（`RoomSequencer`）を取ったまま行う:
//!
//! 2. 接続を (ユーザー名, ルーム) に紐付ける
//! 3. ルームストアに参加（重複ユーザーの追い出し、最初の参加者の言語設定）
//! 4. 保留中のルーム破棄予約をキャンセル
//! 5. 追い出された古い接続の紐付けを解除
//! 6. 照合済みメンバーリスト（`joined`）を全メンバーへ
//! 7. 参加者だけに `language-sync`、現在のコード、直近の実行結果
//!
//! 紐付けとストアへの参加を同じ順番の中で行うので、並行参加で追い出された接続の
//! 紐付けは 5 で必ず外れる。通知も順番の中で enqueue するので、各メンバーに最後に
//! 届く `joined` は常に最新のメンバーリストになる。

use std::sync::Arc;

use crate::domain::{
    ConnectionId, ConnectionRegistry, JoinSnapshot, Language, MessagePusher, RoomId, RoomStore,
    ServerEvent, Username, broadcast_targets,
};

use super::{LeaveRoomUseCase, RoomSequencer, TeardownScheduler, error::EventError};

/// ルーム参加のユースケース
pub struct JoinRoomUseCase {
    registry: Arc<dyn ConnectionRegistry>,
    store: Arc<dyn RoomStore>,
    message_pusher: Arc<dyn MessagePusher>,
    sequencer: Arc<RoomSequencer>,
    teardown: Arc<TeardownScheduler>,
    leave_room: Arc<LeaveRoomUseCase>,
}

impl JoinRoomUseCase {
    pub fn new(
        registry: Arc<dyn ConnectionRegistry>,
        store: Arc<dyn RoomStore>,
        message_pusher: Arc<dyn MessagePusher>,
        sequencer: Arc<RoomSequencer>,
        teardown: Arc<TeardownScheduler>,
        leave_room: Arc<LeaveRoomUseCase>,
    ) -> Self {
        Self {
            registry,
            store,
            message_pusher,
            sequencer,
            teardown,
            leave_room,
        }
    }

    /// ルーム参加を実行
    ///
    /// # Arguments
    ///
    /// * `connection_id` - 参加する接続
    /// * `room_id` - 参加先ルーム
    /// * `username` - 表示名
    /// * `language` - 希望言語。ルームが空の場合のみ採用される
    ///
    /// # Returns
    ///
    /// 参加時点のルーム状態
    pub async fn execute(
        &self,
        connection_id: &ConnectionId,
        room_id: RoomId,
        username: Username,
        language: Option<String>,
    ) -> Result<JoinSnapshot, EventError> {
        let language = requested_language(language.as_deref());

        // 1. 別ルームからの移動
        if let Some(current) = self.registry.lookup(connection_id).await
            && current.room_id != room_id
        {
            self.leave_room.leave(connection_id).await;
        }

        let turn = self.sequencer.acquire(&room_id).await;
        let result = self
            .join_in_turn(connection_id, &room_id, &username, language)
            .await;
        self.sequencer.release(&room_id, turn).await;
        let snapshot = result?;

        tracing::info!(
            "'{}' ({}) joined room '{}' ({} members)",
            username,
            connection_id,
            room_id,
            snapshot.members.len()
        );
        Ok(snapshot)
    }

    async fn join_in_turn(
        &self,
        connection_id: &ConnectionId,
        room_id: &RoomId,
        username: &Username,
        language: Language,
    ) -> Result<JoinSnapshot, EventError> {
        // 2. 紐付け
        self.registry
            .associate(connection_id, username.clone(), room_id.clone())
            .await?;

        // 3. ルームストアへの参加
        let snapshot = self
            .store
            .join(room_id, connection_id.clone(), username.clone(), language)
            .await;

        // 4. 破棄予約のキャンセル
        if self.teardown.cancel(room_id).await {
            tracing::debug!("Room '{}' rejoined within grace period", room_id);
        }

        // 5. 古いタブの紐付け解除
        for evicted in &snapshot.evicted {
            self.registry.dissociate(evicted, room_id).await;
            tracing::info!(
                "Evicted stale connection '{}' of '{}' from room '{}'",
                evicted,
                username,
                room_id
            );
        }

        // 6. メンバーリストの通知
        let joined = ServerEvent::Joined {
            clients: snapshot.members.clone(),
            username: username.clone(),
            connection_id: connection_id.clone(),
        };
        if let Err(e) = self
            .message_pusher
            .broadcast(broadcast_targets(&snapshot.members, None), &joined)
            .await
        {
            tracing::warn!("Failed to broadcast joined: {}", e);
        }

        // 7. 参加者への状態同期
        let mut catch_up = vec![
            ServerEvent::LanguageSync {
                language: snapshot.language,
            },
            ServerEvent::CodeChange {
                code: snapshot.code.clone(),
            },
        ];
        if let Some(outcome) = snapshot.outcome.clone() {
            catch_up.push(ServerEvent::from_outcome(room_id.clone(), outcome));
        }
        for event in &catch_up {
            if let Err(e) = self.message_pusher.push_to(connection_id, event).await {
                tracing::warn!("Failed to push {} to joiner: {}", event.name(), e);
            }
        }

        Ok(snapshot)
    }
}

fn requested_language(language: Option<&str>) -> Language {
    match language.map(Language::try_from) {
        None => Language::default(),
        Some(Ok(language)) => language,
        Some(Err(e)) => {
            tracing::warn!("{}; falling back to {}", e, Language::default());
            Language::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        domain::{ConnectionState, ExecutionOutcome},
        usecase::test_support::{Harness, room_id, user},
    };

    // ========================================
    // テスト作業記録
    // ========================================
    // 【何をテストするか】
    // - 新規ルームの初期状態（javascript、空のコード）が参加者に届く
    // - 最初の参加者の言語が採用され、後続の参加者の言語は無視される
    // - 同じユーザー名の再参加で古い接続が追い出される
    // - 別ルームへの参加で元のルームから退出する
    // - 同時に参加しても既存メンバーに最後に届くリストが全員を含むこと
    // ========================================

    #[tokio::test]
    async fn test_first_join_creates_room_with_defaults() {
        // テスト項目: 新規ルームはデフォルト言語・空のコードで作られる
        // given (前提条件):
        let h = Harness::new();
        let alice = h.connect("a").await;

        // when (操作):
        let snapshot = h
            .join_room
            .execute(&alice, room_id("r1"), user("alice"), None)
            .await
            .unwrap();

        // then (期待する結果):
        assert!(snapshot.was_empty);
        assert_eq!(snapshot.language, Language::JavaScript);
        let received = h.pusher.received_by(&alice).await;
        assert!(matches!(received[0], ServerEvent::Joined { .. }));
        assert_eq!(
            received[1],
            ServerEvent::LanguageSync {
                language: Language::JavaScript
            }
        );
        assert_eq!(
            received[2],
            ServerEvent::CodeChange {
                code: String::new()
            }
        );
        assert_eq!(received.len(), 3);
    }

    #[tokio::test]
    async fn test_first_joiner_language_wins() {
        // テスト項目: 最初の参加者の言語だけが採用される
        // given (前提条件):
        let h = Harness::new();
        let alice = h.connect("a").await;
        let bob = h.connect("b").await;

        // when (操作):
        h.join_room
            .execute(&alice, room_id("r1"), user("alice"), Some("java".into()))
            .await
            .unwrap();
        let snapshot = h
            .join_room
            .execute(&bob, room_id("r1"), user("bob"), Some("cpp".into()))
            .await
            .unwrap();

        // then (期待する結果):
        assert_eq!(snapshot.language, Language::Java);
        assert!(h.pusher.received_by(&bob).await.contains(&ServerEvent::LanguageSync {
            language: Language::Java
        }));
    }

    #[tokio::test]
    async fn test_unsupported_join_language_falls_back_to_default() {
        // テスト項目: 未対応言語での参加はデフォルト言語になる
        // given (前提条件):
        let h = Harness::new();
        let alice = h.connect("a").await;

        // when (操作):
        let snapshot = h
            .join_room
            .execute(&alice, room_id("r1"), user("alice"), Some("ruby".into()))
            .await
            .unwrap();

        // then (期待する結果):
        assert_eq!(snapshot.language, Language::JavaScript);
    }

    #[tokio::test]
    async fn test_joined_is_broadcast_to_all_members_with_joiner_identity() {
        // テスト項目: joined は参加者を含む全員に、参加者の名前付きで届く
        // given (前提条件):
        let h = Harness::new();
        let alice = h.join("a", "alice", "r1").await;
        h.pusher.clear().await;

        // when (操作):
        let bob = h.join("b", "bob", "r1").await;

        // then (期待する結果):
        for recipient in [&alice, &bob] {
            let received = h.pusher.received_by(recipient).await;
            match &received[0] {
                ServerEvent::Joined {
                    clients,
                    username,
                    connection_id,
                } => {
                    assert_eq!(clients.len(), 2);
                    assert_eq!(username, &user("bob"));
                    assert_eq!(connection_id, &bob);
                }
                other => panic!("unexpected event: {other:?}"),
            }
        }
        // 既存メンバーには状態同期は送られない
        assert_eq!(h.pusher.received_by(&alice).await.len(), 1);
    }

    #[tokio::test]
    async fn test_joiner_receives_current_code_and_last_outcome() {
        // テスト項目: 途中参加者に現在のコードと直近の実行結果が届く
        // given (前提条件):
        let h = Harness::new();
        h.join("a", "alice", "r1").await;
        h.store
            .set_code(&room_id("r1"), "print(1)".to_string())
            .await
            .unwrap();
        h.store
            .record_outcome(
                &room_id("r1"),
                ExecutionOutcome::success("1".to_string(), user("alice"), 12),
            )
            .await
            .unwrap();

        // when (操作):
        let bob = h.join("b", "bob", "r1").await;

        // then (期待する結果):
        let received = h.pusher.received_by(&bob).await;
        assert!(received.contains(&ServerEvent::CodeChange {
            code: "print(1)".to_string()
        }));
        assert!(received.contains(&ServerEvent::ExecutionResult {
            room_id: room_id("r1"),
            output: "1".to_string(),
            executed_by: user("alice"),
            execution_time_ms: 12,
        }));
    }

    #[tokio::test]
    async fn test_duplicate_username_evicts_stale_connection() {
        // テスト項目: 同じユーザー名で参加し直すと古いタブが追い出される
        // given (前提条件):
        let h = Harness::new();
        let old_tab = h.join("a1", "alice", "r1").await;

        // when (操作):
        let new_tab = h.connect("a2").await;
        let snapshot = h
            .join_room
            .execute(&new_tab, room_id("r1"), user("alice"), None)
            .await
            .unwrap();

        // then (期待する結果):
        assert_eq!(snapshot.evicted, vec![old_tab.clone()]);
        assert_eq!(snapshot.members.len(), 1);
        assert_eq!(snapshot.members[0].connection_id, new_tab);
        assert_eq!(
            h.registry.state(&old_tab).await,
            Some(ConnectionState::Unjoined)
        );
    }

    #[tokio::test]
    async fn test_joining_another_room_leaves_previous_one() {
        // テスト項目: 別ルームに参加すると元のルームから退出する
        // given (前提条件):
        let h = Harness::new();
        let alice = h.join("a", "alice", "r1").await;
        let bob = h.join("b", "bob", "r1").await;
        h.pusher.clear().await;

        // when (操作):
        h.join_room
            .execute(&alice, room_id("r2"), user("alice"), None)
            .await
            .unwrap();

        // then (期待する結果):
        assert_eq!(h.store.members(&room_id("r1")).await.unwrap().len(), 1);
        assert!(h.pusher.received_by(&bob).await.contains(&ServerEvent::Disconnected {
            connection_id: alice.clone(),
            username: user("alice"),
        }));
        assert_eq!(
            h.registry.lookup(&alice).await.map(|a| a.room_id),
            Some(room_id("r2"))
        );
    }

    #[tokio::test]
    async fn test_rejoin_within_grace_period_keeps_state() {
        // テスト項目: 猶予時間中の再参加でルーム状態が保たれる
        // given (前提条件):
        let h = Harness::with_options(std::time::Duration::from_millis(50), None);
        let alice = h.join("a", "alice", "r1").await;
        h.store
            .set_code(&room_id("r1"), "keep".to_string())
            .await
            .unwrap();
        h.leave_room.disconnect(&alice).await;

        // when (操作):
        let again = h.connect("a2").await;
        let snapshot = h
            .join_room
            .execute(&again, room_id("r1"), user("alice"), None)
            .await
            .unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(150)).await;

        // then (期待する結果):
        assert_eq!(snapshot.code, "keep");
        assert_eq!(h.teardown.pending_count().await, 0);
        assert!(h.store.get_room(&room_id("r1")).await.is_some());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_joins_end_with_full_member_list() {
        // テスト項目: 2 人が同時に参加しても、既存メンバーに最後に届く joined は 3 人分
        for round in 0..50 {
            // given (前提条件):
            let h = Harness::new();
            let room = format!("r{round}");
            let alice = h.join("a", "alice", &room).await;
            let bob = h.connect("b").await;
            let carol = h.connect("c").await;
            h.pusher.clear().await;

            // when (操作):
            let (first, second) = (h.join_room.clone(), h.join_room.clone());
            let bob_room = room_id(&room);
            let carol_room = room_id(&room);
            let bob_task = tokio::spawn(async move {
                first.execute(&bob, bob_room, user("bob"), None).await
            });
            let carol_task = tokio::spawn(async move {
                second.execute(&carol, carol_room, user("carol"), None).await
            });
            bob_task.await.unwrap().unwrap();
            carol_task.await.unwrap().unwrap();

            // then (期待する結果):
            let last_joined = h
                .pusher
                .received_by(&alice)
                .await
                .into_iter()
                .rev()
                .find_map(|event| match event {
                    ServerEvent::Joined { clients, .. } => Some(clients),
                    _ => None,
                })
                .expect("alice should receive a member list");
            assert_eq!(last_joined.len(), 3, "round {round}");
        }
    }
}
