pub mod config;
pub mod core;
pub mod handlers;
pub mod server;
pub mod state;

// Re-export commonly used items for convenience
pub use config::ServerConfig;
pub use server::{BRIDGE_PATH, run};
pub use state::AppState;
