// src/services/notifier.rs
use async_trait::async_trait;
use log::warn;
use std::sync::Arc;

use super::telegram::TelegramNotifier;
use crate::config::Settings;

/// Message delivery. Returns whether the message went out; retrying is the
/// caller's call.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn deliver(&self, message: &str) -> bool;
}

/// Used when no delivery target is configured.
pub struct DisabledNotifier;

#[async_trait]
impl Notifier for DisabledNotifier {
    async fn deliver(&self, message: &str) -> bool {
        warn!("Notifications disabled, dropping message:\n{}", message);
        false
    }
}

pub fn notifier_from_settings(settings: &Settings) -> Arc<dyn Notifier> {
    match &settings.telegram {
        Some(telegram) => Arc::new(TelegramNotifier::new(telegram)),
        None => Arc::new(DisabledNotifier),
    }
}
