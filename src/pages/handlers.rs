use axum::{
    extract::{
        multipart::{Multipart, MultipartError},
        DefaultBodyLimit, FromRef, Path, Query, State,
    },
    http::{header, StatusCode},
    response::{AppendHeaders, Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    Form, Router,
};
use serde::Deserialize;
use tracing::{instrument, warn};

use super::views::{self, MovieFormValues};
use crate::{
    auth::{
        dto::SignInRequest,
        services::{self as auth, clear_session_cookie, session_cookie, JwtKeys},
    },
    error::{AppError, AppResult, FieldErrors},
    guard::SIGN_IN_PATH,
    movies::{
        dto::{Pagination, MAX_LIMIT},
        services as movies,
    },
    posters::services::{delete_movie_with_poster, submit_movie_form, MovieForm, UploadItem},
    state::AppState,
};

const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

pub fn movie_pages() -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route("/movies/create", get(create_page).post(create_submit))
        .route("/movies/edit/:id", get(edit_page).post(edit_submit))
        .route("/movies/edit/:id/delete", post(delete_submit))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
}

pub fn auth_pages() -> Router<AppState> {
    Router::new()
        .route(SIGN_IN_PATH, get(sign_in_page).post(sign_in_submit))
        .route("/sign-up", get(sign_up_page).post(sign_up_submit))
        .route("/sign-out", post(sign_out_submit))
}

#[instrument(skip(state))]
pub async fn index(
    State(state): State<AppState>,
    Query(p): Query<Pagination>,
) -> AppResult<Html<String>> {
    let limit = p.limit.clamp(1, MAX_LIMIT);
    let page = movies::list_page(&state, p).await?;
    Ok(views::movie_list(&page, limit))
}

pub async fn create_page() -> Html<String> {
    views::movie_form(
        "Create a new movie",
        "/movies/create",
        &MovieFormValues::default(),
        &FieldErrors::new(),
        None,
    )
}

async fn read_movie_form(mut mp: Multipart) -> Result<MovieForm, MultipartError> {
    let mut form = MovieForm::default();
    while let Some(field) = mp.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "title" => form.title = field.text().await?,
            "year" => form.year = field.text().await?,
            "fileUrl" => form.file_url = Some(field.text().await?),
            "file" => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let content_type = field
                    .content_type()
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "application/octet-stream".into());
                let body = field.bytes().await?;
                // browsers send an empty part when no file was picked
                if !body.is_empty() {
                    form.file = Some(UploadItem {
                        file_name,
                        body,
                        content_type,
                    });
                }
            }
            _ => {}
        }
    }
    Ok(form)
}

fn rerender_on_invalid(
    err: AppError,
    heading: &str,
    action: &str,
    values: MovieFormValues,
    delete_action: Option<&str>,
) -> Response {
    match err {
        AppError::Validation(fields) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            views::movie_form(heading, action, &values, &fields, delete_action),
        )
            .into_response(),
        other => other.into_response(),
    }
}

#[instrument(skip(state, mp))]
pub async fn create_submit(State(state): State<AppState>, mp: Multipart) -> Response {
    let form = match read_movie_form(mp).await {
        Ok(f) => f,
        Err(e) => return e.into_response(),
    };
    let values = MovieFormValues {
        title: form.title.clone(),
        year: form.year.clone(),
        file_url: form.file_url.clone().unwrap_or_default(),
    };
    match submit_movie_form(&state, None, form).await {
        Ok(_) => Redirect::to("/").into_response(),
        Err(e) => rerender_on_invalid(e, "Create a new movie", "/movies/create", values, None),
    }
}

#[instrument(skip(state))]
pub async fn edit_page(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Html<String>> {
    let movie = movies::get_movie(&state, movies::parse_movie_id(&id)?).await?;
    let action = format!("/movies/edit/{}", movie.id);
    let delete_action = format!("{action}/delete");
    Ok(views::movie_form(
        "Edit",
        &action,
        &MovieFormValues::from(&movie),
        &FieldErrors::new(),
        Some(&delete_action),
    ))
}

#[instrument(skip(state, mp))]
pub async fn edit_submit(
    State(state): State<AppState>,
    Path(id): Path<String>,
    mp: Multipart,
) -> Response {
    let movie = match movies::parse_movie_id(&id) {
        Ok(id) => match movies::get_movie(&state, id).await {
            Ok(m) => m,
            Err(e) => return e.into_response(),
        },
        Err(e) => return e.into_response(),
    };
    let form = match read_movie_form(mp).await {
        Ok(f) => f,
        Err(e) => return e.into_response(),
    };
    let values = MovieFormValues {
        title: form.title.clone(),
        year: form.year.clone(),
        file_url: movie.poster.clone(),
    };
    let action = format!("/movies/edit/{}", movie.id);
    let delete_action = format!("{action}/delete");
    match submit_movie_form(&state, Some(&movie), form).await {
        Ok(_) => Redirect::to("/").into_response(),
        Err(e) => rerender_on_invalid(e, "Edit", &action, values, Some(&delete_action)),
    }
}

#[instrument(skip(state))]
pub async fn delete_submit(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Redirect> {
    delete_movie_with_poster(&state, movies::parse_movie_id(&id)?).await?;
    Ok(Redirect::to("/"))
}

pub async fn sign_in_page() -> Html<String> {
    views::sign_in("", None)
}

#[instrument(skip(state, payload))]
pub async fn sign_in_submit(
    State(state): State<AppState>,
    Form(payload): Form<SignInRequest>,
) -> Response {
    match auth::authenticate(&state, &payload.email, &payload.password).await {
        Ok((token, _user)) => {
            let keys = JwtKeys::from_ref(&state);
            let cookie = session_cookie(&token, keys.ttl, state.config.cookie_secure);
            (
                AppendHeaders([(header::SET_COOKIE, cookie)]),
                Redirect::to("/"),
            )
                .into_response()
        }
        Err(AppError::Unauthorized(msg)) => (
            StatusCode::UNAUTHORIZED,
            views::sign_in(&payload.email, Some(&msg)),
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub struct SignUpForm {
    pub email: String,
    pub password: String,
    #[serde(rename = "confirmPassword", default)]
    pub confirm_password: String,
}

pub async fn sign_up_page() -> Html<String> {
    views::sign_up("", &FieldErrors::new())
}

#[instrument(skip(state, payload))]
pub async fn sign_up_submit(
    State(state): State<AppState>,
    Form(payload): Form<SignUpForm>,
) -> Response {
    if payload.password != payload.confirm_password {
        warn!("sign-up passwords differ");
        let mut fields = FieldErrors::new();
        fields.insert("confirmPassword", "Passwords don't match".into());
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            views::sign_up(&payload.email, &fields),
        )
            .into_response();
    }

    match auth::register(&state, &payload.email, &payload.password).await {
        Ok(_) => Redirect::to(SIGN_IN_PATH).into_response(),
        Err(AppError::Validation(fields)) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            views::sign_up(&payload.email, &fields),
        )
            .into_response(),
        Err(AppError::Conflict(msg)) => {
            let mut fields = FieldErrors::new();
            fields.insert("email", msg);
            (StatusCode::CONFLICT, views::sign_up(&payload.email, &fields)).into_response()
        }
        Err(e) => e.into_response(),
    }
}

pub async fn sign_out_submit(State(state): State<AppState>) -> impl IntoResponse {
    (
        AppendHeaders([(
            header::SET_COOKIE,
            clear_session_cookie(state.config.cookie_secure),
        )]),
        Redirect::to(SIGN_IN_PATH),
    )
}
