use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::instrument;

use super::dto::{MessageResponse, MoviePage, MovieRequest, MovieResponse, Pagination};
use super::repo_types::Movie;
use super::services;
use crate::{
    error::{ApiJson, AppResult},
    state::AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/movies", get(list_movies).post(create_movie))
        .route(
            "/movies/:id",
            get(get_movie).put(update_movie).delete(delete_movie),
        )
}

#[instrument(skip(state))]
pub async fn list_movies(
    State(state): State<AppState>,
    Query(p): Query<Pagination>,
) -> AppResult<Json<MoviePage>> {
    Ok(Json(services::list_page(&state, p).await?))
}

#[instrument(skip(state))]
pub async fn get_movie(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<Movie>> {
    let id = services::parse_movie_id(&id)?;
    Ok(Json(services::get_movie(&state, id).await?))
}

#[instrument(skip(state, body))]
pub async fn create_movie(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<MovieRequest>,
) -> AppResult<(StatusCode, Json<MovieResponse>)> {
    let input = services::validate(
        &body.title,
        &services::year_from_json(&body.year),
        &body.file_url,
    )?;
    let movie = services::create_movie(&state, input).await?;
    Ok((
        StatusCode::CREATED,
        Json(MovieResponse {
            movie,
            message: "Movie created successfully",
        }),
    ))
}

#[instrument(skip(state, body))]
pub async fn update_movie(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<MovieRequest>,
) -> AppResult<Json<MovieResponse>> {
    let id = services::parse_movie_id(&id)?;
    let input = services::validate(
        &body.title,
        &services::year_from_json(&body.year),
        &body.file_url,
    )?;
    let movie = services::update_movie(&state, id, input).await?;
    Ok(Json(MovieResponse {
        movie,
        message: "Movie updated successfully",
    }))
}

#[instrument(skip(state))]
pub async fn delete_movie(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<MessageResponse>> {
    let id = services::parse_movie_id(&id)?;
    services::delete_movie(&state, id).await?;
    Ok(Json(MessageResponse {
        message: "Movie deleted successfully",
    }))
}
