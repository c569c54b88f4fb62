pub mod config;
pub mod routes;
pub mod state;

pub use config::AppConfig;
pub use routes::{router, ApiError};
pub use state::AppState;
