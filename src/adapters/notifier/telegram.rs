//! Telegram Notifier
//!
//! Delivers alerts through the Telegram Bot API `sendMessage` endpoint.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, info};

use crate::config::loader::AlertsSection;
use crate::ports::{NotifierError, NotifierPort};

const TELEGRAM_API_URL: &str = "https://api.telegram.org";

#[derive(Debug, Serialize)]
struct SendMessageBody<'a> {
    chat_id: &'a str,
    text: &'a str,
    disable_web_page_preview: bool,
}

/// Telegram Bot API notifier
#[derive(Debug, Clone)]
pub struct TelegramNotifier {
    http: Client,
    api_url: String,
    bot_token: String,
    chat_id: String,
}

impl TelegramNotifier {
    pub fn new(bot_token: impl Into<String>, chat_id: impl Into<String>) -> Result<Self, NotifierError> {
        let bot_token = bot_token.into();
        let chat_id = chat_id.into();
        if bot_token.is_empty() || chat_id.is_empty() {
            return Err(NotifierError::NotConfigured(
                "telegram bot token and chat id are required".to_string(),
            ));
        }

        let http = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| NotifierError::Delivery(format!("Failed to create HTTP client: {}", e)))?;

        info!("Telegram notifier initialized for chat {}", chat_id);

        Ok(Self {
            http,
            api_url: TELEGRAM_API_URL.to_string(),
            bot_token,
            chat_id,
        })
    }

    /// Build from the alerts config section
    pub fn from_config(alerts: &AlertsSection) -> Result<Self, NotifierError> {
        Self::new(alerts.telegram_bot_token.clone(), alerts.telegram_chat_id.clone())
    }

    /// Point at a different API host
    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    fn send_url(&self) -> String {
        format!("{}/bot{}/sendMessage", self.api_url.trim_end_matches('/'), self.bot_token)
    }
}

#[async_trait]
impl NotifierPort for TelegramNotifier {
    async fn send(&self, message: &str) -> Result<(), NotifierError> {
        let body = SendMessageBody {
            chat_id: &self.chat_id,
            text: message,
            disable_web_page_preview: true,
        };

        let response = self
            .http
            .post(self.send_url())
            .json(&body)
            .send()
            .await
            .map_err(|e| NotifierError::Delivery(format!("Request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(NotifierError::Delivery(format!("HTTP {}: {}", status, text)));
        }

        debug!("Telegram message delivered ({} chars)", message.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requires_credentials() {
        assert!(matches!(
            TelegramNotifier::new("", "123"),
            Err(NotifierError::NotConfigured(_))
        ));
        assert!(matches!(
            TelegramNotifier::new("token", ""),
            Err(NotifierError::NotConfigured(_))
        ));
    }

    #[test]
    fn test_send_url() {
        let notifier = TelegramNotifier::new("abc:123", "42")
            .unwrap()
            .with_api_url("http://localhost:8080/");
        assert_eq!(notifier.send_url(), "http://localhost:8080/botabc:123/sendMessage");
    }

    #[test]
    fn test_body_shape() {
        let body = SendMessageBody {
            chat_id: "42",
            text: "hello",
            disable_web_page_preview: true,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["chat_id"], "42");
        assert_eq!(json["text"], "hello");
    }

    #[tokio::test]
    async fn test_unreachable_host_is_delivery_error() {
        let notifier = TelegramNotifier::new("abc", "42")
            .unwrap()
            .with_api_url("http://127.0.0.1:1");
        let err = tokio_test::assert_err!(notifier.send("hi").await);
        assert!(matches!(err, NotifierError::Delivery(_)));
    }
}
