//! UseCase layer: one struct per room operation, the event router that
//! dispatches inbound commands to them, the per-room sequencer and the
//! delayed room teardown.

pub mod change_language;
pub mod error;
pub mod event_router;
pub mod execution;
pub mod get_room_detail;
pub mod get_rooms;
pub mod join_room;
pub mod leave_room;
pub mod sequencer;
pub mod sync_code;
pub mod teardown;

#[cfg(test)]
pub(crate) mod test_support;

pub use change_language::ChangeLanguageUseCase;
pub use error::{EventError, GetRoomDetailError};
pub use event_router::EventRouter;
pub use execution::ExecutionUseCase;
pub use get_room_detail::GetRoomDetailUseCase;
pub use get_rooms::GetRoomsUseCase;
pub use join_room::JoinRoomUseCase;
pub use leave_room::LeaveRoomUseCase;
pub use sequencer::{RoomSequencer, RoomTurn};
pub use sync_code::SyncCodeUseCase;
pub use teardown::TeardownScheduler;
