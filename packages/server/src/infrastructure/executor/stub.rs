//! Placeholder executor.
//!
//! No sandboxed evaluator ships with the coordinator; this implementation
//! answers every run with an error outcome so that server-side execution can be
//! switched on end to end before a real backend is plugged in.

use async_trait::async_trait;

use crate::domain::{CodeExecutor, ExecutionReport, Language};

#[derive(Debug, Default, Clone, Copy)]
pub struct StubCodeExecutor;

#[async_trait]
impl CodeExecutor for StubCodeExecutor {
    async fn execute(&self, language: Language, _code: &str) -> ExecutionReport {
        ExecutionReport::failed(
            format!(
                "{} execution requires backend setup. No executor is configured on this server.",
                language.as_str().to_uppercase()
            ),
            0,
        )
    }
}
