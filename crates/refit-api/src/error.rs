use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

use refit_db::{ViewerRequired, is_unique_violation, tables::UnknownEntity};
use refit_types::api::UnknownTarget;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Authentication required")]
    Unauthenticated,

    #[error("Not found")]
    NotFound,

    /// Ownership and existence failures look the same to the caller.
    #[error("Result not found or no access")]
    NotFoundOrNoAccess,

    #[error("{0}")]
    Forbidden(&'static str),

    #[error("{0}")]
    Validation(String),

    #[error("Already exists")]
    Conflict,

    #[error("Something went wrong. Please try again later.")]
    Upstream(#[source] anyhow::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::NotFound | Self::NotFoundOrNoAccess => StatusCode::NOT_FOUND,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Conflict => StatusCode::CONFLICT,
            Self::Upstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        if is_unique_violation(&err) {
            Self::Conflict
        } else {
            Self::Upstream(err)
        }
    }
}

impl From<ViewerRequired> for ApiError {
    fn from(_: ViewerRequired) -> Self {
        Self::Unauthenticated
    }
}

impl From<UnknownEntity> for ApiError {
    fn from(err: UnknownEntity) -> Self {
        Self::Validation(err.to_string())
    }
}

impl From<UnknownTarget> for ApiError {
    fn from(err: UnknownTarget) -> Self {
        Self::Validation(err.to_string())
    }
}

// Extractor rejections are malformed input; they answer in the same JSON
// shape as every other error.

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::Validation(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::Validation(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self::Validation(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let Self::Upstream(err) = &self {
            error!("Upstream failure: {:#}", err);
        }

        let body = Json(serde_json::json!({ "error": self.to_string() }));
        (self.status(), body).into_response()
    }
}
