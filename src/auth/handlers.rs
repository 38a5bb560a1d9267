use axum::{
    extract::{FromRef, State},
    http::{header, StatusCode},
    response::{AppendHeaders, IntoResponse},
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument};

use crate::{
    auth::{
        dto::{
            PublicUser, RegisterRequest, RegisterResponse, SessionResponse, SignInRequest,
            SignInResponse, SignOutResponse,
        },
        services::{self, clear_session_cookie, session_cookie, AuthUser, JwtKeys},
    },
    error::{ApiJson, AppError, AppResult},
    state::AppState,
};

/// Registration lives outside `/auth` as `POST /user`.
pub fn user_routes() -> Router<AppState> {
    Router::new().route("/user", post(register))
}

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/sign-in", post(sign_in))
        .route("/auth/sign-out", post(sign_out))
        .route("/auth/session", get(session))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<RegisterRequest>,
) -> AppResult<(StatusCode, Json<RegisterResponse>)> {
    let user = services::register(&state, &payload.email, &payload.password).await?;
    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            user: user.into(),
            message: "User created successfully",
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn sign_in(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<SignInRequest>,
) -> AppResult<impl IntoResponse> {
    let (token, user) = services::authenticate(&state, &payload.email, &payload.password).await?;
    let keys = JwtKeys::from_ref(&state);
    let cookie = session_cookie(&token, keys.ttl, state.config.cookie_secure);
    Ok((
        AppendHeaders([(header::SET_COOKIE, cookie)]),
        Json(SignInResponse {
            token,
            user: user.into(),
        }),
    ))
}

#[instrument(skip(state))]
pub async fn sign_out(State(state): State<AppState>) -> impl IntoResponse {
    info!("session cookie cleared");
    (
        AppendHeaders([(
            header::SET_COOKIE,
            clear_session_cookie(state.config.cookie_secure),
        )]),
        Json(SignOutResponse {
            message: "Signed out",
        }),
    )
}

#[instrument(skip(state))]
pub async fn session(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> AppResult<Json<SessionResponse>> {
    let user = state
        .users
        .find_by_id(user_id)
        .await?
        .ok_or_else(|| AppError::unauthorized("User not found"))?;
    Ok(Json(SessionResponse {
        user: PublicUser::from(user),
    }))
}
