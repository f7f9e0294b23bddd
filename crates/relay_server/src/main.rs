use std::{net::SocketAddr, sync::Arc};

use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, Method, StatusCode},
    routing::{get, post},
    Json, Router,
};
use relay_api::{parse_request, relay_notification, RelayContext};
use shared::protocol::RelayResponse;
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod app_state;
mod config;

use app_state::AppState;
use config::load_settings;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings = load_settings();
    let state = AppState {
        relay: RelayContext {
            transport: settings.transport(),
            locale: settings.locale,
            fallback_domain: settings.fallback_domain.clone(),
        },
        max_body_bytes: settings.max_body_bytes,
    };
    let app = build_router(Arc::new(state));

    let addr: SocketAddr = settings.server_bind.parse()?;
    info!(%addr, transport = ?settings.mail_transport, "mail relay listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);
    let max_body_bytes = state.max_body_bytes;

    Router::new()
        .route("/healthz", get(healthz))
        .route("/", post(send_email))
        .route("/send_email", post(send_email))
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(cors)
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

async fn send_email(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, Json<RelayResponse>) {
    let request = match parse_request(&body) {
        Ok(request) => request,
        Err(error) => {
            warn!(%error, "rejecting notification");
            return (
                StatusCode::BAD_REQUEST,
                Json(RelayResponse::error(error.message)),
            );
        }
    };

    let host = headers
        .get(header::HOST)
        .and_then(|value| value.to_str().ok());
    let response = relay_notification(&state.relay, &request, host).await;
    (StatusCode::OK, Json(response))
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
