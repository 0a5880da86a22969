use axum::{extract::State, routing::get, Json, Router};
use deadpool_redis::redis::cmd;
use serde::Serialize;
use sqlx::PgPool;
use tracing::{instrument, warn};
use utoipa::ToSchema;

use crate::auth::dto::MessageResponse;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/healthcheck", get(healthcheck))
        .route("/ping", get(ping))
        .route("/status", get(status))
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StatusResponse {
    pub message: String,
    pub version: String,
    pub database: String,
    pub redis: String,
}

/// Liveness check with a welcome message.
#[utoipa::path(
    get, path = "/healthcheck", context_path = "/api/v1", tag = "status",
    responses((status = 200, body = MessageResponse))
)]
#[instrument(skip(state))]
pub async fn healthcheck(State(state): State<AppState>) -> Json<MessageResponse> {
    Json(MessageResponse::new(
        "ok",
        &format!("Welcome to {}", state.config.app_name),
    ))
}

#[utoipa::path(
    get, path = "/ping", context_path = "/api/v1", tag = "status",
    responses((status = 200, body = MessageResponse))
)]
pub async fn ping() -> Json<MessageResponse> {
    Json(MessageResponse::new("pong", "pong"))
}

/// Connection status of the backing services.
#[utoipa::path(
    get, path = "/status", context_path = "/api/v1", tag = "status",
    responses((status = 200, body = StatusResponse))
)]
#[instrument(skip(state))]
pub async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        message: format!("Welcome to {}", state.config.app_name),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database: database_status(&state.db).await.to_string(),
        redis: redis_status(&state.redis).await.to_string(),
    })
}

async fn database_status(db: &PgPool) -> &'static str {
    match sqlx::query("SELECT 1").execute(db).await {
        Ok(_) => "Connected",
        Err(e) => {
            warn!(error = %e, "database ping failed");
            "Not connected"
        }
    }
}

async fn redis_status(pool: &deadpool_redis::Pool) -> &'static str {
    match redis_roundtrip(pool).await {
        Ok(()) => "Connected",
        Err(e) => {
            warn!(error = %e, "redis round-trip failed");
            "Not connected"
        }
    }
}

/// SET/GET/DEL round-trip on a probe key.
async fn redis_roundtrip(pool: &deadpool_redis::Pool) -> anyhow::Result<()> {
    let mut conn = pool.get().await?;
    cmd("SET")
        .arg("gatekit:status")
        .arg("Connected")
        .query_async::<_, ()>(&mut conn)
        .await?;
    let value: String = cmd("GET")
        .arg("gatekit:status")
        .query_async(&mut conn)
        .await?;
    cmd("DEL")
        .arg("gatekit:status")
        .query_async::<_, ()>(&mut conn)
        .await?;
    anyhow::ensure!(value == "Connected", "unexpected probe value: {value}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_response_shape() {
        let response = StatusResponse {
            message: "Welcome to gatekit".into(),
            version: env!("CARGO_PKG_VERSION").into(),
            database: "Connected".into(),
            redis: "Not connected".into(),
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["database"], "Connected");
        assert_eq!(json["redis"], "Not connected");
        assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
    }
}
