// src/handlers/mod.rs
pub mod error;
pub mod snapshot;
pub mod status;
