pub mod dto;
pub mod handlers;
pub mod repo;
pub mod repo_types;
pub mod services;

use crate::state::AppState;
use axum::Router;

/// JSON endpoints, mounted under `/api`.
pub fn router() -> Router<AppState> {
    handlers::routes()
}
