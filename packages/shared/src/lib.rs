//! Utilities shared by the Tsukue binaries.

pub mod logger;
pub mod time;
