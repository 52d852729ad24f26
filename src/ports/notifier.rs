use async_trait::async_trait;
use thiserror::Error;

/// Notifier error type
#[derive(Debug, Error)]
pub enum NotifierError {
    #[error("Delivery failed: {0}")]
    Delivery(String),

    #[error("Notifier not configured: {0}")]
    NotConfigured(String),

    #[error("Notification timed out after {0}s")]
    Timeout(u64),
}

/// Outbound human-readable alerts
///
/// Failures are logged by the caller and never stop the watch loop.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NotifierPort: Send + Sync {
    async fn send(&self, message: &str) -> Result<(), NotifierError>;
}
