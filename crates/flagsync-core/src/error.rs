//! Error types for flagsync
//!
//! Two orthogonal taxonomies:
//! - `FetcherError` classifies why a fetch+parse cycle failed and travels
//!   inside fetch-event notifications
//! - `SetupError` covers misconfiguration detected while wiring the SDK up

/// Failure reason for a configuration fetch+parse cycle.
///
/// Orthogonal to [`FetcherStatus`](crate::events::FetcherStatus): the status
/// says what happened to the snapshot, this says why a cycle failed. The
/// `NoError` member is the default carried by successful notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, thiserror::Error)]
pub enum FetcherError {
    /// Cycle completed without failure
    #[default]
    #[error("no error")]
    NoError,

    /// Unclassifiable failure
    #[error("unknown error")]
    Unknown,

    /// Transport-level failure or timeout
    #[error("network error")]
    NetworkError,

    /// Payload was produced for a different application key
    #[error("application key mismatch")]
    MismatchAppKey,

    /// Detached signature did not verify against the payload
    #[error("signature verification failed")]
    SignatureVerification,

    /// Payload could not be decoded into a configuration document
    #[error("corrupt payload")]
    CorruptPayload,
}

impl FetcherError {
    /// Check whether this value denotes an actual failure
    #[inline]
    #[must_use]
    pub fn is_error(&self) -> bool {
        !matches!(self, Self::NoError)
    }
}

/// Errors raised while constructing SDK components
#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    /// Application key is empty or malformed
    #[error("invalid application key: {0}")]
    InvalidApiKey(String),

    /// A configured endpoint URL could not be used
    #[error("invalid endpoint url: {0}")]
    InvalidUrl(String),

    /// Underlying HTTP client could not be built
    #[error("http client setup failed: {0}")]
    HttpClient(String),

    /// Signature verification key is malformed
    #[error("invalid verification key: {0}")]
    InvalidVerificationKey(String),
}
