//! Shared types for the trip planner gateway: configuration, the error
//! taxonomy, and structured trace events.

pub mod config;
pub mod error;
pub mod trace;
