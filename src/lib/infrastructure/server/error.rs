use super::dto::ErrorResponse;
use crate::application::runs::RunError;
use axum::Json;
use axum::http::StatusCode;
use std::net::SocketAddr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind HTTP listener on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error("HTTP server error: {0}")]
    Serve(#[from] std::io::Error),
}

pub(super) type ApiError = (StatusCode, Json<ErrorResponse>);

pub(super) fn run_error(err: RunError) -> ApiError {
    let status = match err {
        RunError::InvalidCommand(_) => StatusCode::BAD_REQUEST,
        RunError::Conflict | RunError::AlreadySubscribed(_) => StatusCode::CONFLICT,
        RunError::NotFound(_) => StatusCode::NOT_FOUND,
    };
    (
        status,
        Json(ErrorResponse {
            detail: err.to_string(),
        }),
    )
}
