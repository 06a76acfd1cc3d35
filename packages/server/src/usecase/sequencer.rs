//! ルームごとの通知の直列化
//!
//! ルーム状態の変更と、その結果の通知（チャンネルへの enqueue）を 1 つのロックの中で行う。
//! 同じルームの通知はコミット順にクライアントへ届くので、最後に届いたメンバーリストが
//! 常に最新になる。enqueue はソケットに書き込まないので、ロック中にネットワーク I/O は起きない。
//!
//! 別ルームは別のロックなので並行に進む。1 つのタスクが同時に 2 つのルームのロックを
//! 持つことはない。

use std::{collections::HashMap, sync::Arc};

use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::domain::RoomId;

type Slot = Arc<Mutex<()>>;

/// ルームの通知順序を保つためのロック
pub struct RoomTurn {
    _guard: OwnedMutexGuard<()>,
}

/// ルーム ID ごとのロック表
#[derive(Default)]
pub struct RoomSequencer {
    slots: Mutex<HashMap<RoomId, Slot>>,
}

impl RoomSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    /// ルームの順番を取る。`RoomTurn` を落とすと次の操作に進む
    pub async fn acquire(&self, room_id: &RoomId) -> RoomTurn {
        let slot = {
            let mut slots = self.slots.lock().await;
            slots.entry(room_id.clone()).or_default().clone()
        };
        RoomTurn {
            _guard: slot.lock_owned().await,
        }
    }

    /// 順番待ちのいないルームのエントリを捨てる
    ///
    /// 表のロック中に参照数が 1 なら、他に保持者も待機者もいない。
    pub async fn release(&self, room_id: &RoomId, turn: RoomTurn) {
        drop(turn);
        let mut slots = self.slots.lock().await;
        if slots
            .get(room_id)
            .is_some_and(|slot| Arc::strong_count(slot) == 1)
        {
            slots.remove(room_id);
        }
    }

    /// ロック表に残っているルーム数
    pub async fn active_rooms(&self) -> usize {
        self.slots.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn room_id(id: &str) -> RoomId {
        RoomId::new(id.to_string()).unwrap()
    }

    #[tokio::test]
    async fn test_same_room_waits_for_previous_turn() {
        // テスト項目: 同じルームの 2 つ目の操作は前の操作が終わるまで待つ
        // given (前提条件):
        let sequencer = Arc::new(RoomSequencer::new());
        let first = sequencer.acquire(&room_id("r1")).await;

        // when (操作):
        let waiter = {
            let sequencer = sequencer.clone();
            tokio::spawn(async move {
                let turn = sequencer.acquire(&room_id("r1")).await;
                sequencer.release(&room_id("r1"), turn).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(30)).await;
        let blocked = !waiter.is_finished();
        sequencer.release(&room_id("r1"), first).await;
        waiter.await.unwrap();

        // then (期待する結果):
        assert!(blocked);
        assert_eq!(sequencer.active_rooms().await, 0);
    }

    #[tokio::test]
    async fn test_other_rooms_do_not_wait() {
        // テスト項目: 別ルームの操作はロックを待たない
        let sequencer = RoomSequencer::new();
        let _r1 = sequencer.acquire(&room_id("r1")).await;

        let r2 = tokio::time::timeout(
            Duration::from_millis(100),
            sequencer.acquire(&room_id("r2")),
        )
        .await;

        assert!(r2.is_ok());
    }
}
