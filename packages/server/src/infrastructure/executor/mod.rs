//! Code executor implementations.

pub mod stub;

pub use stub::StubCodeExecutor;
