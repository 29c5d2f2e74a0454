use axum::{Json, extract::State, http::StatusCode};
use std::sync::Arc;

use super::{AppState, HealthResponse};

/// GET /health
pub async fn health_check(State(state): State<Arc<AppState>>) -> (StatusCode, Json<HealthResponse>) {
    let database_ok = state.store().ping().await.is_ok();
    if !database_ok {
        tracing::warn!("Health check could not reach the database");
    }

    let status = if database_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(HealthResponse {
            status: if database_ok { "OK" } else { "DEGRADED" },
            message: "S2 Design Interior API is running",
            timestamp: chrono::Utc::now().to_rfc3339(),
            database: "SQLite",
            version: env!("CARGO_PKG_VERSION"),
            uptime_seconds: state.start_time.elapsed().as_secs(),
        }),
    )
}
