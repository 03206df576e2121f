// src/handlers/status.rs
use log::debug;
use serde_json::json;
use std::sync::Arc;
use warp::reply::{Html, Json};
use warp::Rejection;

use crate::services::formatter::escape_html;

/// What the keep-alive page reports about the running service.
#[derive(Debug, Clone)]
pub struct ServiceInfo {
    pub schedule: Vec<String>,
    pub timezone: String,
    pub meters: usize,
}

pub async fn get_home(info: Arc<ServiceInfo>) -> Result<Html<String>, Rejection> {
    debug!("Serving status page");
    let body = format!(
        "<h1>🔋 Electricity Meter Bot</h1>\n\
         <p>Status: Running</p>\n\
         <p>Monitoring {} meter(s)</p>\n\
         <p>Schedule: daily at {} ({})</p>\n\
         <p>Next run will be logged in console</p>",
        info.meters,
        escape_html(&info.schedule.join(", ")),
        escape_html(&info.timezone)
    );
    Ok(warp::reply::html(body))
}

pub async fn get_health() -> Result<Json, Rejection> {
    Ok(warp::reply::json(&json!({
        "status": "healthy",
        "service": "electricity-meter-bot",
    })))
}
