// src/services/browser.rs
//! Browser automation seam.
//!
//! The aggregator only sees these traits; `webdriver` provides the real
//! implementation and tests provide in-memory ones.

use async_trait::async_trait;

use crate::error::Result;

/// One exclusive, stateful browser session, used for a single account.
#[async_trait]
pub trait BrowserSession: Send {
    async fn navigate(&mut self, url: &str) -> Result<()>;

    /// Types the account id into the portal's login form and submits it.
    async fn submit_login(&mut self, account_id: &str) -> Result<()>;

    /// Visible text snippets of the current page, in document order.
    async fn find_text(&mut self) -> Result<Vec<String>>;

    async fn close(self: Box<Self>) -> Result<()>;
}

#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn open(&self) -> Result<Box<dyn BrowserSession>>;
}
