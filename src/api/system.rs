use axum::{extract::State, routing::get, Extension, Json, Router};
use std::sync::Arc;

use crate::api::dto::{PublicSystemInfo, SystemInfo, PRODUCT_NAME, PRODUCT_VERSION};
use crate::api::AuthSession;
use crate::AppState;

pub fn public_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/Info/Public", get(get_public_info))
        .route("/Ping", get(ping).post(ping))
}

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/Info", get(get_info))
}

async fn get_public_info(State(state): State<Arc<AppState>>) -> Json<PublicSystemInfo> {
    Json(PublicSystemInfo {
        id: state.server_id.clone(),
        local_address: state.config.server.local_address(),
        server_name: state.config.server.name.clone(),
        product_name: PRODUCT_NAME.to_string(),
        version: PRODUCT_VERSION.to_string(),
        startup_wizard_completed: true,
    })
}

async fn get_info(
    State(state): State<Arc<AppState>>,
    Extension(_session): Extension<AuthSession>,
) -> Json<SystemInfo> {
    Json(SystemInfo {
        id: state.server_id.clone(),
        local_address: state.config.server.local_address(),
        server_name: state.config.server.name.clone(),
        product_name: PRODUCT_NAME.to_string(),
        version: PRODUCT_VERSION.to_string(),
        startup_wizard_completed: true,
        operating_system: std::env::consts::OS.to_string(),
        has_pending_restart: false,
        is_shutting_down: false,
        supports_library_monitor: false,
        web_socket_port_number: state.config.server.port as i32,
    })
}

async fn ping() -> Json<&'static str> {
    Json(PRODUCT_NAME)
}

pub async fn get_utc_time() -> Json<serde_json::Value> {
    let now = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true);
    Json(serde_json::json!({
        "RequestReceptionTime": now,
        "ResponseTransmissionTime": now,
    }))
}
