//! Log Notifier
//!
//! Fallback when no chat transport is configured: alerts go to the log.

use async_trait::async_trait;
use tracing::info;

use crate::ports::{NotifierError, NotifierPort};

#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

impl LogNotifier {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl NotifierPort for LogNotifier {
    async fn send(&self, message: &str) -> Result<(), NotifierError> {
        info!(target: "alerts", "{}", message);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_log_notifier_never_fails() {
        tokio_test::assert_ok!(LogNotifier::new().send("🟢 BUY").await);
    }

    #[test]
    fn test_send_from_sync_context() {
        let notifier = LogNotifier::new();
        tokio_test::assert_ok!(tokio_test::block_on(notifier.send("⚠️ Exit (gap) failed")));
    }
}
