// src/routes.rs
use std::sync::Arc;
use warp::reject::Rejection;
use crate::handlers::{snapshot::get_snapshot, status::{get_health, get_home, ServiceInfo}};
use crate::services::snapshot::SnapshotStore;
use log::info;

use std::convert::Infallible;
use warp::{Filter, Reply};
use crate::handlers::error::ApiError;

async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    let code;
    let message;

    if err.is_not_found() {
        code = warp::http::StatusCode::NOT_FOUND;
        message = "Not Found";
    } else if let Some(api_error) = err.find::<ApiError>() {
        code = warp::http::StatusCode::INTERNAL_SERVER_ERROR;
        message = api_error.message.as_str();
    } else {
        code = warp::http::StatusCode::INTERNAL_SERVER_ERROR;
        message = "Internal Server Error";
    }

    Ok(warp::reply::with_status(
        warp::reply::json(&serde_json::json!({
            "error": message,
        })),
        code,
    ))
}

/// Keep-alive server: status page, health check and the last snapshot.
pub fn routes(
    service: Arc<ServiceInfo>,
    snapshots: Arc<SnapshotStore>,
) -> impl Filter<Extract = impl Reply, Error = Infallible> + Clone {
    info!("Configuring routes...");

    let service_filter = warp::any().map(move || service.clone());
    let snapshot_filter = warp::any().map(move || snapshots.clone());

    let home_route = warp::path::end()
        .and(warp::get())
        .and(service_filter)
        .and_then(get_home);

    let health_route = warp::path!("health")
        .and(warp::get())
        .and_then(get_health);

    let snapshot_route = warp::path!("api" / "v1" / "snapshot")
        .and(warp::get())
        .and(snapshot_filter)
        .and_then(get_snapshot);

    info!("All routes configured successfully.");

    home_route
        .or(health_route)
        .or(snapshot_route)
        .recover(handle_rejection)
}
