// src/handlers/snapshot.rs
use log::{error, info};
use std::sync::Arc;
use warp::reply::Json;
use warp::Rejection;

use super::error::ApiError;
use crate::services::snapshot::SnapshotStore;

pub async fn get_snapshot(store: Arc<SnapshotStore>) -> Result<Json, Rejection> {
    info!("Handling request for the last meter snapshot");

    let snapshot = store.load().await.map_err(|e| {
        error!("Failed to read snapshot {}: {}", store.path().display(), e);
        warp::reject::custom(ApiError::snapshot_unavailable(e))
    })?;

    Ok(warp::reply::json(&snapshot))
}
