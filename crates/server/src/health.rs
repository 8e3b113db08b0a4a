use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use courtside_core::config::DatabaseConfig;
use courtside_db::ping;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;

#[derive(Clone)]
pub struct HealthState {
    database_url: SecretString,
    connect_timeout_secs: u64,
}

impl HealthState {
    pub fn new(database: &DatabaseConfig) -> Self {
        Self {
            database_url: database.url.clone(),
            connect_timeout_secs: database.connect_timeout_secs,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub database: HealthCheck,
    pub checked_at: String,
}

pub fn router(state: HealthState) -> Router {
    Router::new().route("/health", get(health)).with_state(state)
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let database = database_check(&state).await;
    let ready = database.status == "ready";

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        service: HealthCheck {
            status: "ready",
            detail: "courtside-server runtime initialized".to_string(),
        },
        database,
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

async fn database_check(state: &HealthState) -> HealthCheck {
    match ping(state.database_url.expose_secret(), state.connect_timeout_secs).await {
        Ok(()) => HealthCheck { status: "ready", detail: "database query succeeded".to_string() },
        Err(error) => {
            HealthCheck { status: "degraded", detail: format!("database query failed: {error}") }
        }
    }
}
