//! Connection handlers.

pub mod bridge;
