//! Real-time room coordinator for collaborative code editing.
//!
//! Participants join named rooms over WebSocket and share one code buffer, one
//! selected language and the latest execution result per room. The server keeps
//! every member's view consistent as people join, edit, run code and drop off.

// layers
pub mod domain;
pub mod infrastructure;
pub mod ui;
pub mod usecase;

pub mod config;
