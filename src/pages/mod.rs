mod handlers;
mod views;

use crate::state::AppState;
use axum::Router;

/// Browser-facing routes. `/` and `/movies/*` sit behind the session guard.
pub fn router() -> Router<AppState> {
    Router::new()
        .merge(handlers::movie_pages())
        .merge(handlers::auth_pages())
}
