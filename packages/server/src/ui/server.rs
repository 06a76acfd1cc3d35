//! Server execution logic.

use std::sync::Arc;

use axum::{Router, routing::get};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::{
    config::CoordinatorConfig,
    domain::CodeExecutor,
    infrastructure::{
        executor::StubCodeExecutor,
        message_pusher::WebSocketMessagePusher,
        repository::{InMemoryConnectionRegistry, InMemoryRoomStore},
    },
    usecase::{
        ChangeLanguageUseCase, EventRouter, ExecutionUseCase, GetRoomDetailUseCase,
        GetRoomsUseCase, JoinRoomUseCase, LeaveRoomUseCase, RoomSequencer, SyncCodeUseCase,
        TeardownScheduler,
    },
};

use super::{
    handler::{get_room_detail, get_rooms, health_check, websocket_handler},
    signal::shutdown_signal,
    state::AppState,
};

/// Collaborative editing room coordinator
///
/// # Example
///
/// ```ignore
/// let server = Server::new(event_router, get_rooms_usecase, get_room_detail_usecase);
/// server.run("127.0.0.1".to_string(), 8080).await?;
/// ```
pub struct Server {
    /// EventRouter（WebSocket イベントの振り分け）
    event_router: Arc<EventRouter>,
    /// GetRoomsUseCase（ルーム一覧取得のユースケース）
    get_rooms_usecase: Arc<GetRoomsUseCase>,
    /// GetRoomDetailUseCase（ルーム詳細取得のユースケース）
    get_room_detail_usecase: Arc<GetRoomDetailUseCase>,
}

impl Server {
    pub fn new(
        event_router: Arc<EventRouter>,
        get_rooms_usecase: Arc<GetRoomsUseCase>,
        get_room_detail_usecase: Arc<GetRoomDetailUseCase>,
    ) -> Self {
        Self {
            event_router,
            get_rooms_usecase,
            get_room_detail_usecase,
        }
    }

    /// Wire in-memory stores, the WebSocket pusher and every use case
    ///
    /// Initialize dependencies in order:
    /// 1. Repositories
    /// 2. MessagePusher
    /// 3. CodeExecutor (only when server-side execution is on)
    /// 4. UseCases
    /// 5. EventRouter
    pub fn with_config(config: &CoordinatorConfig) -> Self {
        // 1. Create Repositories (in-memory)
        let registry = Arc::new(InMemoryConnectionRegistry::new());
        let store = Arc::new(InMemoryRoomStore::default());

        // 2. Create MessagePusher (WebSocket implementation)
        let message_pusher = Arc::new(WebSocketMessagePusher::new());

        // 3. Create CodeExecutor
        let executor: Option<Arc<dyn CodeExecutor>> = if config.server_execution {
            Some(Arc::new(StubCodeExecutor))
        } else {
            None
        };

        // 4. Create UseCases (membership changes and fan-out share one per-room sequencer)
        let sequencer = Arc::new(RoomSequencer::new());
        let teardown = Arc::new(TeardownScheduler::new(store.clone(), config.grace_period));
        let leave_room = Arc::new(LeaveRoomUseCase::new(
            registry.clone(),
            store.clone(),
            message_pusher.clone(),
            sequencer.clone(),
            teardown.clone(),
        ));
        let join_room = Arc::new(JoinRoomUseCase::new(
            registry.clone(),
            store.clone(),
            message_pusher.clone(),
            sequencer.clone(),
            teardown,
            leave_room.clone(),
        ));
        let sync_code = Arc::new(SyncCodeUseCase::new(
            store.clone(),
            message_pusher.clone(),
            sequencer.clone(),
        ));
        let change_language = Arc::new(ChangeLanguageUseCase::new(
            store.clone(),
            message_pusher.clone(),
            sequencer.clone(),
        ));
        let execution = Arc::new(ExecutionUseCase::new(
            store.clone(),
            message_pusher.clone(),
            sequencer,
            executor,
            config.execution_timeout,
        ));
        let get_rooms_usecase = Arc::new(GetRoomsUseCase::new(store.clone()));
        let get_room_detail_usecase = Arc::new(GetRoomDetailUseCase::new(store));

        // 5. Create EventRouter
        let event_router = Arc::new(EventRouter::new(
            registry,
            message_pusher,
            join_room,
            leave_room,
            sync_code,
            change_language,
            execution,
        ));

        Self::new(event_router, get_rooms_usecase, get_room_detail_usecase)
    }

    /// Build the axum router with every route mounted
    pub fn router(self) -> Router {
        let app_state = Arc::new(AppState {
            event_router: self.event_router,
            get_rooms_usecase: self.get_rooms_usecase,
            get_room_detail_usecase: self.get_room_detail_usecase,
        });

        Router::new()
            // WebSocket エンドポイント
            .route("/ws", get(websocket_handler))
            // HTTP エンドポイント
            .route("/api/health", get(health_check))
            .route("/api/rooms", get(get_rooms))
            .route("/api/rooms/{room_id}", get(get_room_detail))
            .layer(TraceLayer::new_for_http())
            .with_state(app_state)
    }

    /// Bind to `host:port` and serve until a shutdown signal arrives
    ///
    /// # Errors
    ///
    /// Returns an error if the server fails to bind to the specified address or
    /// if there's an error during server execution.
    pub async fn run(self, host: String, port: u16) -> Result<(), Box<dyn std::error::Error>> {
        let bind_addr = format!("{}:{}", host, port);
        let listener = TcpListener::bind(&bind_addr).await?;
        tracing::info!("Connect to: ws://{}/ws", bind_addr);
        tracing::info!("Press Ctrl+C to shutdown gracefully");
        self.serve(listener).await?;
        Ok(())
    }

    /// Serve on an already bound listener
    pub async fn serve(self, listener: TcpListener) -> std::io::Result<()> {
        tracing::info!("Room coordinator listening on {}", listener.local_addr()?);

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("Server shutdown complete");
        Ok(())
    }
}
