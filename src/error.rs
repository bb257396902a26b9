use std::fmt;
use std::time::Duration;

/// Reasons a webhook handler failed to process a payload.
///
/// Returned by [`WebhookHandler`](crate::WebhookHandler) implementations and
/// recorded as the `last_error` of the dead-letter item. These never escape
/// a retry sweep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandlerError {
    /// The handler reported a failure.
    Failed(String),

    /// The attempt exceeded the configured per-attempt timeout and was aborted.
    Timeout(Duration),

    /// The handler panicked.
    Panicked,
}

impl HandlerError {
    pub fn failed(message: impl Into<String>) -> Self {
        HandlerError::Failed(message.into())
    }
}

impl fmt::Display for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandlerError::Failed(message) =>
                write!(f, "{}", message),
            HandlerError::Timeout(timeout) =>
                write!(f, "handler timed out after {}ms", timeout.as_millis()),
            HandlerError::Panicked =>
                write!(f, "handler panicked"),
        }
    }
}

impl std::error::Error for HandlerError {}

impl From<String> for HandlerError {
    fn from(message: String) -> Self {
        HandlerError::Failed(message)
    }
}

impl From<&str> for HandlerError {
    fn from(message: &str) -> Self {
        HandlerError::Failed(message.to_string())
    }
}
