use super::docs::ApiDoc;
use super::error::ServerError;
use super::routes;
use super::state::ServerState;
use crate::application::runs::RunManager;
use axum::Router;
use axum::http::{HeaderValue, Method};
use axum::routing::{get, post};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub fn build_router(runs: RunManager) -> Router {
    let api = ApiDoc::openapi();

    let cors = CorsLayer::new()
        .allow_origin([
            HeaderValue::from_static("http://localhost:8000"),
            HeaderValue::from_static("http://127.0.0.1:8000"),
        ])
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    let state = Arc::new(ServerState::new(runs));
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-doc/openapi.json", api))
        .route("/health", get(routes::health::health_handler))
        .route("/run", post(routes::runs::start_handler))
        .route("/stop/{run_id}", post(routes::runs::stop_handler))
        .route("/events/{run_id}", get(routes::events::events_handler))
        .layer(cors)
        .with_state(state)
}

pub(super) async fn serve(runs: RunManager, addr: SocketAddr) -> Result<(), ServerError> {
    info!(%addr, "Binding REST server");
    let app = build_router(runs);

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind { addr, source })?;
    info!(%addr, "REST server ready to accept connections");

    axum::serve(listener, app.into_make_service())
        .await
        .map_err(ServerError::Serve)
}
