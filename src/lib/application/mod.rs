//! # Application Module
//!
//! Core run logic for the order agent.
//!
//! ## Submodules
//!
//! - [`tooling`] - Tool server processes, routing table and argument validation
//! - [`guard`] - Policy gate evaluated once before any tool is touched
//! - [`agent`] - Completion/dispatch loop producing a [`agent::RunOutcome`]
//! - [`runs`] - Single-slot run supervisor behind the REST front-end

pub mod agent;
pub mod guard;
pub mod runs;
pub mod tooling;
