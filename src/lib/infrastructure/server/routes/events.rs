use super::super::dto::ErrorResponse;
use super::super::error::{ApiError, run_error};
use super::super::state::ServerState;
use crate::application::runs::RunEvent;
use axum::extract::{Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::{Stream, StreamExt, future};
use std::convert::Infallible;
use std::sync::Arc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, warn};

#[utoipa::path(
    get,
    path = "/events/{run_id}",
    tag = "runs",
    params(("run_id" = String, Path, description = "Identifier returned by /run")),
    responses(
        (status = 200, description = "Server-sent `line` events followed by one `done` event", body = RunEvent, content_type = "text/event-stream"),
        (status = 404, description = "Unknown run", body = ErrorResponse),
        (status = 409, description = "Events already being streamed", body = ErrorResponse)
    )
)]
pub async fn events_handler(
    State(state): State<Arc<ServerState>>,
    Path(run_id): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let receiver = state.runs().subscribe(&run_id).await.map_err(run_error)?;
    debug!(run_id = %run_id, "Streaming run events");

    // Pump tasks may still hold senders after `Done`; end the stream there.
    let stream = UnboundedReceiverStream::new(receiver)
        .scan(false, |finished, event| {
            if *finished {
                return future::ready(None);
            }
            *finished = matches!(event, RunEvent::Done { .. });
            future::ready(Some(event))
        })
        .map(|event| Ok(to_sse(&event)));

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

fn to_sse(event: &RunEvent) -> Event {
    let sse = Event::default().event(event.name());
    match sse.json_data(event) {
        Ok(sse) => sse,
        Err(err) => {
            warn!(error = %err, "Failed to encode run event");
            Event::default().event(event.name()).data("{}")
        }
    }
}
