// HTTP clients for the gateway and event bus
pub mod api;
// Logging and signal handling
pub mod process;

// App state (configuration, paths)
pub mod state;

pub use api::{ApiClient, ApiError, HttpGateway, HttpPublisher};
pub use process::{init_logging, LogConfig};
pub use state::{AppConfig, AppState, BlobStoreConfig, StateError};
