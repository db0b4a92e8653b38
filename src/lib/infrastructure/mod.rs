//! Adapters to the outside world: the completion API and the HTTP front-end.

pub mod model;
pub mod server;
