use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

use swopp_core::SwoppError;
use swopp_types::api::ErrorBody;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Swopp(#[from] SwoppError),

    #[error("{0}")]
    Unauthorized(&'static str),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::Swopp(SwoppError::validation(message))
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Swopp(e) => match e {
                SwoppError::Validation(_) => StatusCode::BAD_REQUEST,
                SwoppError::NotFound(_) => StatusCode::NOT_FOUND,
                SwoppError::Forbidden(_) => StatusCode::FORBIDDEN,
                SwoppError::InvalidTransition { .. }
                | SwoppError::InvalidState { .. }
                | SwoppError::Conflict(_) => StatusCode::CONFLICT,
                SwoppError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    fn code(&self) -> &'static str {
        match self {
            Self::Unauthorized(_) => "unauthorized",
            Self::Swopp(e) => e.code(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let Self::Swopp(SwoppError::Storage(source)) = &self {
            error!("Storage error: {:#}", source);
        }
        let body = ErrorBody {
            code: self.code().to_string(),
            message: self.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}
