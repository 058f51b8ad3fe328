//! Non-fatal cleanup diagnostics.

use podlite_shared::errors::PodliteError;

/// One best-effort cleanup step that failed.
#[derive(Debug)]
pub struct CleanupFailure {
    /// Cleanup step that failed.
    pub operation: &'static str,

    /// Entity the step operated on.
    pub subject: String,

    /// The underlying error.
    pub error: PodliteError,
}

/// Record of best-effort cleanup steps that failed during one operation.
///
/// Cleanup failures never become the caller-visible error: once the
/// authoritative kernel-level state has been reached, the call still
/// succeeds. Each failure is logged when recorded and kept so the
/// surrounding operation can see how much of its cleanup actually ran.
#[derive(Debug, Default)]
pub struct CleanupLog {
    failures: Vec<CleanupFailure>,
}

impl CleanupLog {
    /// Start an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one failed cleanup step.
    pub fn record(&mut self, operation: &'static str, subject: &str, error: PodliteError) {
        tracing::warn!(operation, subject, error = %error, "cleanup step failed");
        self.failures.push(CleanupFailure {
            operation,
            subject: subject.to_string(),
            error,
        });
    }

    /// Whether every cleanup step succeeded.
    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    /// The recorded failures.
    pub fn failures(&self) -> &[CleanupFailure] {
        &self.failures
    }
}
