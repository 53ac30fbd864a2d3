//! Browser-facing bridge WebSocket endpoint.

pub mod handler;
pub mod messages;

pub use handler::handle_bridge_session;
