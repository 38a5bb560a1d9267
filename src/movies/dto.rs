use serde::{Deserialize, Serialize};

use super::repo_types::Movie;

pub const DEFAULT_PAGE: i64 = 1;
pub const DEFAULT_LIMIT: i64 = 8;
pub const MAX_LIMIT: i64 = 100;

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Pagination {
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_page() -> i64 {
    DEFAULT_PAGE
}

fn default_limit() -> i64 {
    DEFAULT_LIMIT
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            limit: DEFAULT_LIMIT,
        }
    }
}

/// Body of create and update. `year` stays raw so a non-integer can be
/// reported as a field error instead of a deserialization failure.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovieRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub year: serde_json::Value,
    #[serde(default)]
    pub file_url: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MoviePage {
    pub movies: Vec<Movie>,
    pub total_records: i64,
    pub total_pages: i64,
    pub current_page: i64,
}

#[derive(Debug, Serialize)]
pub struct MovieResponse {
    pub movie: Movie,
    pub message: &'static str,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}
