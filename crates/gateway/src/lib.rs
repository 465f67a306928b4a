//! Trip planner HTTP gateway: quota-gated conversational queries relayed to
//! the concierge agent.

pub mod api;
pub mod bootstrap;
pub mod cli;
pub mod concierge;
pub mod state;
