//! UseCase: ルーム詳細取得

use std::sync::Arc;

use crate::domain::{Room, RoomId, RoomStore};

use super::error::GetRoomDetailError;

/// ルーム詳細取得のユースケース
pub struct GetRoomDetailUseCase {
    store: Arc<dyn RoomStore>,
}

impl GetRoomDetailUseCase {
    pub fn new(store: Arc<dyn RoomStore>) -> Self {
        Self { store }
    }

    /// # Arguments
    ///
    /// * `room_id` - パスパラメータのルーム ID（未検証の文字列）
    pub async fn execute(&self, room_id: String) -> Result<Room, GetRoomDetailError> {
        let room_id = RoomId::try_from(room_id)?;
        self.store
            .get_room(&room_id)
            .await
            .ok_or(GetRoomDetailError::RoomNotFound)
    }
}
