pub mod app;
pub mod auth;
pub mod errors;
pub mod generation;
pub mod handlers;
pub mod instantiator;
pub mod models;
pub mod scoring;
pub mod stats;
pub mod storage;
pub mod templates;
pub mod state;

pub use app::router;
pub use state::AppState;
pub use storage::{load_data, resolve_data_path, resolve_port};
