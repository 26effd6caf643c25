//! doclass HTTP service
//!
//! Accepts PDF uploads on `POST /classify`, spools each to a temporary file,
//! and runs the shared classifier on the blocking thread pool.

pub mod cli;
pub mod config;
pub mod error;
pub mod routes;
pub mod state;

pub use cli::{Cli, Commands};
pub use config::ServerConfig;
pub use error::AppError;
pub use routes::create_router;
pub use state::AppState;
