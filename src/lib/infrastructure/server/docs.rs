use super::dto::{ErrorResponse, HealthResponse, RunRequest, RunResponse, StopResponse};
use super::routes;
use crate::application::runs::{RunEvent, StreamKind};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        routes::health::health_handler,
        routes::runs::start_handler,
        routes::runs::stop_handler,
        routes::events::events_handler
    ),
    components(
        schemas(
            HealthResponse,
            RunRequest,
            RunResponse,
            StopResponse,
            ErrorResponse,
            RunEvent,
            StreamKind
        )
    ),
    tags(
        (name = "runs", description = "Start, stop and follow agent runs"),
        (name = "health", description = "Liveness probe")
    )
)]
pub(super) struct ApiDoc;
