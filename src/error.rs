use std::collections::BTreeMap;

use axum::{
    async_trait,
    extract::{FromRequest, Request},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::de::DeserializeOwned;
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

/// Field name -> message, reported next to the offending input.
pub type FieldErrors = BTreeMap<&'static str, String>;

pub type AppResult<T> = Result<T, AppError>;

/// Error returned from every handler. Anything that is not a client
/// mistake collapses into `Internal` and leaves the process as a generic 500.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("validation failed")]
    Validation(FieldErrors),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn not_found(message: impl Into<String>) -> Self {
        AppError::NotFound(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        AppError::Unauthorized(message.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = match self {
            AppError::Validation(fields) => json!({
                "error": "Validation failed",
                "fields": fields,
            }),
            AppError::Conflict(msg) => json!({ "error": msg, "user": null }),
            AppError::BadRequest(msg) | AppError::NotFound(msg) | AppError::Unauthorized(msg) => {
                json!({ "error": msg })
            }
            AppError::Internal(e) => {
                error!(error = ?e, "request failed");
                json!({ "error": "Something went wrong" })
            }
        };
        (status, Json(body)).into_response()
    }
}

/// `Json` whose rejections (bad syntax, wrong content type, mistyped
/// fields) answer through `AppError` instead of axum's plain-text body.
pub struct ApiJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(ApiJson(value)),
            Err(rejection) => {
                warn!(error = %rejection.body_text(), "json body rejected");
                Err(AppError::BadRequest("Invalid JSON body".into()))
            }
        }
    }
}
