pub mod auth;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod response;
pub mod router;
pub mod services;
pub mod state;
pub mod telemetry;
pub mod utils;

// Re-export commonly used types
pub use config::AppConfig;
pub use errors::{HaulwayError, HaulwayResult, ValidationError};
pub use router::create_router;
pub use state::{AppState, SharedState};
