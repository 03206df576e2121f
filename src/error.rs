// src/error.rs
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MeterError {
    #[error("Browser session failed: {0}")]
    Session(String),

    #[error("WebDriver returned {status}: {message}")]
    WebDriver { status: u16, message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Scheduler error: {0}")]
    Scheduler(String),

    #[error("Delivery failed: {0}")]
    Delivery(String),
}

impl MeterError {
    pub fn session(message: impl Into<String>) -> Self {
        MeterError::Session(message.into())
    }
}

pub type Result<T> = std::result::Result<T, MeterError>;
