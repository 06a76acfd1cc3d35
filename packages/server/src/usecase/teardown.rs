//! 空になったルームの猶予付き破棄
//!
//! 最後のメンバーが抜けたルームはすぐには消さず、猶予時間の経過後に
//! まだ空であれば破棄する。猶予中の再参加は予約をキャンセルする。
//! 予約はタイマーでありブロックではないので、他のイベント処理は止まらない。

use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use tokio::{sync::Mutex, task::JoinHandle};

use crate::domain::{RoomId, RoomStore};

struct PendingTeardown {
    token: u64,
    handle: JoinHandle<()>,
}

/// ルーム破棄の予約管理
pub struct TeardownScheduler {
    store: Arc<dyn RoomStore>,
    grace_period: Duration,
    pending: Arc<Mutex<HashMap<RoomId, PendingTeardown>>>,
    next_token: AtomicU64,
}

impl TeardownScheduler {
    pub fn new(store: Arc<dyn RoomStore>, grace_period: Duration) -> Self {
        Self {
            store,
            grace_period,
            pending: Arc::new(Mutex::new(HashMap::new())),
            next_token: AtomicU64::new(0),
        }
    }

    /// 猶予時間後の破棄を予約する（同じルームの既存予約は置き換える）
    ///
    /// 猶予時間が 0 ならその場で破棄を試みる。
    pub async fn schedule(&self, room_id: RoomId) {
        if self.grace_period.is_zero() {
            if self.store.teardown_if_empty(&room_id).await {
                tracing::info!("Room '{}' discarded", room_id);
            }
            return;
        }

        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        let store = self.store.clone();
        let pending_map = self.pending.clone();
        let grace_period = self.grace_period;
        let target = room_id.clone();

        // 予約の登録が終わるまでタスクが自分のエントリを探さないよう、ロック中に spawn する
        let mut pending = self.pending.lock().await;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(grace_period).await;
            {
                let mut pending = pending_map.lock().await;
                if !pending.get(&target).is_some_and(|p| p.token == token) {
                    return;
                }
                pending.remove(&target);
            }
            if store.teardown_if_empty(&target).await {
                tracing::info!("Room '{}' discarded after grace period", target);
            } else {
                tracing::debug!("Room '{}' was rejoined during grace period", target);
            }
        });

        tracing::debug!(
            "Scheduled teardown of room '{}' in {:?}",
            room_id,
            grace_period
        );
        if let Some(previous) = pending.insert(room_id, PendingTeardown { token, handle }) {
            previous.handle.abort();
        }
    }

    /// 予約をキャンセルする。予約があれば `true`
    pub async fn cancel(&self, room_id: &RoomId) -> bool {
        let mut pending = self.pending.lock().await;
        match pending.remove(room_id) {
            Some(previous) => {
                previous.handle.abort();
                true
            }
            None => false,
        }
    }

    /// 保留中の予約数
    pub async fn pending_count(&self) -> usize {
        self.pending.lock().await.len()
    }
}
