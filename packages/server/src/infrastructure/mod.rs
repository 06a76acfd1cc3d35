//! Infrastructure layer: concrete implementations of the domain interfaces.

pub mod dto;
pub mod executor;
pub mod message_pusher;
pub mod repository;
