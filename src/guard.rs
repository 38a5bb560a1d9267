use axum::{
    extract::{FromRef, Request, State},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use tracing::debug;

use crate::auth::services::{session_token, JwtKeys};
use crate::state::AppState;

pub const SIGN_IN_PATH: &str = "/sign-in";

/// Page routes that need a session: `/` and everything under `/movies`.
pub fn is_protected(path: &str) -> bool {
    path == "/" || path == "/movies" || path.starts_with("/movies/")
}

/// The auth subsystem's own routes always pass, or sign-in would redirect
/// to itself.
pub fn is_auth_route(path: &str) -> bool {
    path == "/api/auth"
        || path.starts_with("/api/auth/")
        || path == SIGN_IN_PATH
        || path == "/sign-up"
        || path == "/sign-out"
}

fn has_valid_session(state: &AppState, req: &Request) -> bool {
    let Some(token) = session_token(req.headers()) else {
        return false;
    };
    JwtKeys::from_ref(state).verify(token).is_ok()
}

/// Redirects unauthenticated requests for protected pages to the sign-in
/// page. Verification is stateless; nothing is written anywhere.
pub async fn require_session(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let path = req.uri().path().to_owned();
    if is_auth_route(&path) || !is_protected(&path) {
        return next.run(req).await;
    }
    if has_valid_session(&state, &req) {
        return next.run(req).await;
    }
    debug!(path = %path, "no valid session; redirecting to sign-in");
    Redirect::to(SIGN_IN_PATH).into_response()
}
