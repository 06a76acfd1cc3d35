//! Code execution collaborator.
//!
//! The coordinator never interprets code itself; it delegates to whatever
//! executor is plugged in and treats a failed run as an ordinary outcome.

use async_trait::async_trait;

use super::{entity::OutcomeResult, value_object::Language};

/// What an executor reports back for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionReport {
    pub result: OutcomeResult,
    pub duration_ms: u64,
}

impl ExecutionReport {
    pub fn failed(error: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            result: OutcomeResult::Error {
                error: error.into(),
            },
            duration_ms,
        }
    }
}

#[async_trait]
pub trait CodeExecutor: Send + Sync {
    /// Run `code` as `language`. Must not touch room state.
    async fn execute(&self, language: Language, code: &str) -> ExecutionReport;
}
