//! UseCase: ルーム一覧取得

use std::sync::Arc;

use crate::domain::{Room, RoomStore};

/// ルーム一覧取得のユースケース
pub struct GetRoomsUseCase {
    store: Arc<dyn RoomStore>,
}

impl GetRoomsUseCase {
    pub fn new(store: Arc<dyn RoomStore>) -> Self {
        Self { store }
    }

    /// 現在存在するルームのスナップショット（ID 順）
    pub async fn execute(&self) -> Vec<Room> {
        self.store.list_rooms().await
    }
}
