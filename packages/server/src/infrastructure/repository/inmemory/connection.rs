//! InMemory Connection Registry 実装
//!
//! 接続 ID → 接続状態の HashMap を保持します。
//! 各操作はマップ上の O(1) の読み書きだけで、ロック中に I/O や await はしません。

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::{
    Association, ConnectionId, ConnectionRegistry, ConnectionState, RepositoryError, RoomId,
    Username,
};

/// インメモリ Connection Registry 実装
#[derive(Default)]
pub struct InMemoryConnectionRegistry {
    connections: Mutex<HashMap<ConnectionId, ConnectionState>>,
}

impl InMemoryConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConnectionRegistry for InMemoryConnectionRegistry {
    async fn register(&self, connection_id: ConnectionId) {
        let mut connections = self.connections.lock().await;
        connections.insert(connection_id, ConnectionState::Unjoined);
    }

    async fn associate(
        &self,
        connection_id: &ConnectionId,
        username: Username,
        room_id: RoomId,
    ) -> Result<(), RepositoryError> {
        let mut connections = self.connections.lock().await;
        let state = connections
            .get_mut(connection_id)
            .ok_or_else(|| RepositoryError::ConnectionNotFound(connection_id.to_string()))?;
        *state = ConnectionState::Joined(Association { username, room_id });
        Ok(())
    }

    async fn lookup(&self, connection_id: &ConnectionId) -> Option<Association> {
        let connections = self.connections.lock().await;
        match connections.get(connection_id) {
            Some(ConnectionState::Joined(association)) => Some(association.clone()),
            _ => None,
        }
    }

    async fn state(&self, connection_id: &ConnectionId) -> Option<ConnectionState> {
        let connections = self.connections.lock().await;
        connections.get(connection_id).cloned()
    }

    async fn begin_leaving(&self, connection_id: &ConnectionId) -> Option<Association> {
        let mut connections = self.connections.lock().await;
        let state = connections.get_mut(connection_id)?;
        match state {
            ConnectionState::Joined(association) => {
                let association = association.clone();
                *state = ConnectionState::Leaving(association.clone());
                Some(association)
            }
            ConnectionState::Unjoined | ConnectionState::Leaving(_) => None,
        }
    }

    async fn finish_leaving(&self, connection_id: &ConnectionId) {
        let mut connections = self.connections.lock().await;
        if let Some(state) = connections.get_mut(connection_id)
            && matches!(state, ConnectionState::Leaving(_))
        {
            *state = ConnectionState::Unjoined;
        }
    }

    async fn dissociate(
        &self,
        connection_id: &ConnectionId,
        room_id: &RoomId,
    ) -> Option<Association> {
        let mut connections = self.connections.lock().await;
        let state = connections.get_mut(connection_id)?;
        match state {
            ConnectionState::Joined(association) if &association.room_id == room_id => {
                let association = association.clone();
                *state = ConnectionState::Unjoined;
                Some(association)
            }
            _ => None,
        }
    }

    async fn remove(
        &self,
        connection_id: &ConnectionId,
    ) -> Result<Option<Association>, RepositoryError> {
        let mut connections = self.connections.lock().await;
        match connections.remove(connection_id) {
            Some(ConnectionState::Joined(association))
            | Some(ConnectionState::Leaving(association)) => Ok(Some(association)),
            Some(ConnectionState::Unjoined) => Ok(None),
            None => Err(RepositoryError::ConnectionNotFound(
                connection_id.to_string(),
            )),
        }
    }
}
