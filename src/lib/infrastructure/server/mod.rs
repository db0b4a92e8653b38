mod docs;
mod dto;
mod error;
mod router;
mod routes;
mod state;

pub use error::ServerError;

use crate::application::runs::RunManager;
use std::net::SocketAddr;

pub use router::build_router;

pub async fn serve(runs: RunManager, addr: SocketAddr) -> Result<(), ServerError> {
    router::serve(runs, addr).await
}
