// src/services/mod.rs
pub mod aggregator;
pub mod browser;
pub mod evaluator;
pub mod extractor;
pub mod formatter;
pub mod monitor;
pub mod notifier;
pub mod scheduler;
pub mod snapshot;
pub mod telegram;
pub mod webdriver;
