//! Test doubles and wiring shared by the use case tests.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::{
    domain::{
        CodeExecutor, ConnectionId, ConnectionRegistry, MessagePushError, MessagePusher,
        PusherChannel, RoomId, ServerEvent, Username,
    },
    infrastructure::repository::{InMemoryConnectionRegistry, InMemoryRoomStore},
};

use super::{
    ChangeLanguageUseCase, EventRouter, ExecutionUseCase, JoinRoomUseCase, LeaveRoomUseCase,
    RoomSequencer, SyncCodeUseCase, TeardownScheduler,
};

/// Records every pushed event per recipient, in order.
#[derive(Default)]
pub struct RecordingPusher {
    sent: Mutex<Vec<(ConnectionId, ServerEvent)>>,
}

impl RecordingPusher {
    pub async fn received_by(&self, connection_id: &ConnectionId) -> Vec<ServerEvent> {
        self.sent
            .lock()
            .await
            .iter()
            .filter(|(to, _)| to == connection_id)
            .map(|(_, event)| event.clone())
            .collect()
    }

    pub async fn clear(&self) {
        self.sent.lock().await.clear();
    }
}

#[async_trait]
impl MessagePusher for RecordingPusher {
    async fn register_client(&self, _connection_id: ConnectionId, _sender: PusherChannel) {
        // No-op for recorder
    }

    async fn unregister_client(&self, _connection_id: &ConnectionId) {
        // No-op for recorder
    }

    async fn push_to(
        &self,
        connection_id: &ConnectionId,
        event: &ServerEvent,
    ) -> Result<(), MessagePushError> {
        self.sent
            .lock()
            .await
            .push((connection_id.clone(), event.clone()));
        Ok(())
    }

    async fn broadcast(
        &self,
        targets: Vec<ConnectionId>,
        event: &ServerEvent,
    ) -> Result<(), MessagePushError> {
        let mut sent = self.sent.lock().await;
        for target in targets {
            sent.push((target, event.clone()));
        }
        Ok(())
    }
}

/// Fully wired use cases over in-memory stores and a recording pusher.
pub struct Harness {
    pub registry: Arc<InMemoryConnectionRegistry>,
    pub store: Arc<InMemoryRoomStore>,
    pub pusher: Arc<RecordingPusher>,
    pub sequencer: Arc<RoomSequencer>,
    pub teardown: Arc<TeardownScheduler>,
    pub join_room: Arc<JoinRoomUseCase>,
    pub leave_room: Arc<LeaveRoomUseCase>,
    pub sync_code: Arc<SyncCodeUseCase>,
    pub change_language: Arc<ChangeLanguageUseCase>,
    pub execution: Arc<ExecutionUseCase>,
    pub router: EventRouter,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_options(Duration::ZERO, None)
    }

    pub fn with_options(grace_period: Duration, executor: Option<Arc<dyn CodeExecutor>>) -> Self {
        let registry = Arc::new(InMemoryConnectionRegistry::new());
        let store = Arc::new(InMemoryRoomStore::default());
        let pusher = Arc::new(RecordingPusher::default());
        let sequencer = Arc::new(RoomSequencer::new());
        let teardown = Arc::new(TeardownScheduler::new(store.clone(), grace_period));
        let leave_room = Arc::new(LeaveRoomUseCase::new(
            registry.clone(),
            store.clone(),
            pusher.clone(),
            sequencer.clone(),
            teardown.clone(),
        ));
        let join_room = Arc::new(JoinRoomUseCase::new(
            registry.clone(),
            store.clone(),
            pusher.clone(),
            sequencer.clone(),
            teardown.clone(),
            leave_room.clone(),
        ));
        let sync_code = Arc::new(SyncCodeUseCase::new(
            store.clone(),
            pusher.clone(),
            sequencer.clone(),
        ));
        let change_language = Arc::new(ChangeLanguageUseCase::new(
            store.clone(),
            pusher.clone(),
            sequencer.clone(),
        ));
        let execution = Arc::new(ExecutionUseCase::new(
            store.clone(),
            pusher.clone(),
            sequencer.clone(),
            executor,
            Duration::from_millis(200),
        ));
        let router = EventRouter::new(
            registry.clone(),
            pusher.clone(),
            join_room.clone(),
            leave_room.clone(),
            sync_code.clone(),
            change_language.clone(),
            execution.clone(),
        );
        Self {
            registry,
            store,
            pusher,
            sequencer,
            teardown,
            join_room,
            leave_room,
            sync_code,
            change_language,
            execution,
            router,
        }
    }

    /// Register a connection with a fixed id.
    pub async fn connect(&self, id: &str) -> ConnectionId {
        let connection_id = ConnectionId::new(id.to_string()).unwrap();
        self.registry.register(connection_id.clone()).await;
        connection_id
    }

    /// Register a connection and join it to `room`.
    pub async fn join(&self, id: &str, username: &str, room: &str) -> ConnectionId {
        let connection_id = self.connect(id).await;
        self.join_room
            .execute(&connection_id, room_id(room), user(username), None)
            .await
            .unwrap();
        connection_id
    }
}

pub fn room_id(id: &str) -> RoomId {
    RoomId::new(id.to_string()).unwrap()
}

pub fn user(name: &str) -> Username {
    Username::new(name.to_string()).unwrap()
}
