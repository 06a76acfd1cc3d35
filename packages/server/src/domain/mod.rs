//! Domain layer: value objects, entities, presence reconciliation and the
//! interfaces the use cases depend on.

pub mod command;
pub mod entity;
pub mod error;
pub mod event;
pub mod executor;
pub mod message_pusher;
pub mod presence;
pub mod repository;
pub mod value_object;

pub use command::RoomCommand;
pub use entity::{ExecutionOutcome, MemberEntry, OutcomeResult, Room};
pub use error::{MessagePushError, RepositoryError, ValueObjectError};
pub use event::ServerEvent;
pub use executor::{CodeExecutor, ExecutionReport};
pub use message_pusher::{MessagePusher, PusherChannel};
pub use presence::{Reconciliation, broadcast_targets, reconcile};
pub use repository::{
    Association, ConnectionRegistry, ConnectionState, JoinSnapshot, RoomStore,
};
pub use value_object::{ConnectionId, Language, RoomId, Timestamp, Username};

#[cfg(test)]
pub use message_pusher::MockMessagePusher;
