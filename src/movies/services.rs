use serde_json::Value;
use tracing::{info, warn};
use url::Url;
use uuid::Uuid;

use super::dto::{MoviePage, Pagination, MAX_LIMIT};
use super::repo_types::{Movie, MovieInput};
use crate::error::{AppError, AppResult, FieldErrors};
use crate::state::AppState;

const NOT_FOUND: &str = "Movie not found";

pub(crate) fn parse_title(raw: &str) -> Result<String, String> {
    let title = raw.trim();
    if title.is_empty() {
        return Err("Title is required".into());
    }
    Ok(title.to_string())
}

/// Positive integer with exactly four digits.
pub(crate) fn parse_year(raw: &str) -> Result<i32, String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err("Year is required".into());
    }
    let year = raw
        .parse::<i64>()
        .map_err(|_| "Year must be an integer".to_string())?;
    if year <= 0 {
        return Err("Year must be a positive integer".into());
    }
    if year.to_string().len() != 4 {
        return Err("Year must be a 4-digit number".into());
    }
    Ok(year as i32)
}

pub(crate) fn parse_poster_url(raw: &str) -> Result<String, String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err("Poster image is required".into());
    }
    match Url::parse(raw) {
        Ok(u) if matches!(u.scheme(), "http" | "https") && u.has_host() => Ok(raw.to_string()),
        _ => Err("Invalid file URL".into()),
    }
}

/// JSON clients send the year as a number; strings are accepted too.
pub(crate) fn year_from_json(v: &Value) -> String {
    match v {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        _ => String::new(),
    }
}

pub fn validate(title: &str, year: &str, file_url: &str) -> AppResult<MovieInput> {
    let mut fields = FieldErrors::new();
    let title = parse_title(title).map_err(|m| fields.insert("title", m)).ok();
    let year = parse_year(year).map_err(|m| fields.insert("year", m)).ok();
    let poster = parse_poster_url(file_url)
        .map_err(|m| fields.insert("fileUrl", m))
        .ok();

    match (title, year, poster) {
        (Some(title), Some(year), Some(poster)) => Ok(MovieInput {
            title,
            year,
            poster,
        }),
        _ => Err(AppError::Validation(fields)),
    }
}

/// A malformed id cannot name a record, so it is reported as not found.
pub fn parse_movie_id(raw: &str) -> AppResult<Uuid> {
    Uuid::parse_str(raw).map_err(|_| AppError::not_found(NOT_FOUND))
}

pub fn total_pages(total_records: i64, limit: i64) -> i64 {
    if limit <= 0 {
        return 0;
    }
    (total_records + limit - 1) / limit
}

pub async fn list_page(st: &AppState, p: Pagination) -> AppResult<MoviePage> {
    let page = p.page.max(1);
    let limit = p.limit.clamp(1, MAX_LIMIT);
    let offset = (page - 1).saturating_mul(limit);

    let movies = st.movies.list(limit, offset).await?;
    let total_records = st.movies.count().await?;

    Ok(MoviePage {
        movies,
        total_records,
        total_pages: total_pages(total_records, limit),
        current_page: page,
    })
}

pub async fn get_movie(st: &AppState, id: Uuid) -> AppResult<Movie> {
    st.movies
        .get(id)
        .await?
        .ok_or_else(|| AppError::not_found(NOT_FOUND))
}

pub async fn create_movie(st: &AppState, input: MovieInput) -> AppResult<Movie> {
    let movie = st.movies.create(&input).await?;
    info!(movie_id = %movie.id, title = %movie.title, "movie created");
    Ok(movie)
}

pub async fn update_movie(st: &AppState, id: Uuid, input: MovieInput) -> AppResult<Movie> {
    match st.movies.update(id, &input).await? {
        Some(movie) => {
            info!(movie_id = %id, "movie updated");
            Ok(movie)
        }
        None => {
            warn!(movie_id = %id, "update of unknown movie");
            Err(AppError::not_found(NOT_FOUND))
        }
    }
}

pub async fn delete_movie(st: &AppState, id: Uuid) -> AppResult<()> {
    if !st.movies.delete(id).await? {
        warn!(movie_id = %id, "delete of unknown movie");
        return Err(AppError::not_found(NOT_FOUND));
    }
    info!(movie_id = %id, "movie deleted");
    Ok(())
}
