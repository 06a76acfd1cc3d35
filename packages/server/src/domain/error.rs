//! Domain error types.

use thiserror::Error;

/// Value Object の検証エラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueObjectError {
    #[error("connection id must not be empty")]
    ConnectionIdEmpty,
    #[error("room id must not be empty")]
    RoomIdEmpty,
    #[error("room id must be at most {0} characters")]
    RoomIdTooLong(usize),
    #[error("username must not be empty")]
    UsernameEmpty,
    #[error("username must be at most {0} characters")]
    UsernameTooLong(usize),
    #[error("unsupported language: {0}")]
    UnsupportedLanguage(String),
}

/// Repository（Room Store / Connection Registry）のエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RepositoryError {
    #[error("room not found: {0}")]
    RoomNotFound(String),
    #[error("connection not found: {0}")]
    ConnectionNotFound(String),
}

/// MessagePusher のエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MessagePushError {
    #[error("connection not found: {0}")]
    ConnectionNotFound(String),
    #[error("failed to push message: {0}")]
    PushFailed(String),
}
