// Campus Rate - professor rating service

pub mod app_state;
pub mod auth;
pub mod config;
pub mod database;
pub mod error;
pub mod models;
pub mod routes;
pub mod stats;

// Re-exports for convenience
pub use error::{AppError, AppResult};
