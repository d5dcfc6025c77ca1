//! Diagnostics reporting seam
//!
//! Used for handler failures and non-terminal fetch diagnostics. Reporting
//! is never part of control flow.

use std::fmt;

/// External error-reporting collaborator
pub trait ErrorReporter: Send + Sync + fmt::Debug {
    /// Report a diagnostic message with supporting detail
    fn report(&self, message: &str, detail: &str);
}

/// Reporter forwarding diagnostics to `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct LogReporter;

impl ErrorReporter for LogReporter {
    fn report(&self, message: &str, detail: &str) {
        tracing::error!(detail, "{message}");
    }
}

/// Reporter that swallows diagnostics, for tests
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopReporter;

impl ErrorReporter for NoopReporter {
    fn report(&self, _message: &str, _detail: &str) {}
}
