// src/services/telegram.rs
use async_trait::async_trait;
use log::{error, info};
use reqwest::Client;
use serde_json::json;

use super::notifier::Notifier;
use crate::config::TelegramConfig;
use crate::error::{MeterError, Result};

pub struct TelegramNotifier {
    client: Client,
    base_url: String,
    chat_id: String,
}

impl TelegramNotifier {
    pub fn new(config: &TelegramConfig) -> Self {
        TelegramNotifier {
            client: Client::new(),
            base_url: format!("https://api.telegram.org/bot{}", config.bot_token),
            chat_id: config.chat_id.clone(),
        }
    }

    pub async fn send_message(&self, text: &str) -> Result<()> {
        let url = format!("{}/sendMessage", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&json!({
                "chat_id": self.chat_id,
                "text": text,
                "parse_mode": "HTML",
            }))
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(MeterError::Delivery(format!("Telegram answered {}: {}", status, body)))
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn deliver(&self, message: &str) -> bool {
        match self.send_message(message).await {
            Ok(()) => {
                info!("Message sent successfully to Telegram");
                true
            }
            Err(e) => {
                error!("Failed to send Telegram message: {}", e);
                false
            }
        }
    }
}
