//! Axum front end: WebSocket and HTTP routes.

mod handler;
mod server;
mod signal;
pub mod state;

pub use server::Server;
