use swopp_types::models::RequestStatus;
use thiserror::Error;

/// Failure of a lifecycle, item or user operation.
///
/// Each variant maps to one HTTP status at the API boundary; the `Display`
/// text is safe to show to clients except for [`SwoppError::Storage`], whose
/// source is only logged.
#[derive(Debug, Error)]
pub enum SwoppError {
    #[error("{0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Forbidden(&'static str),

    #[error("cannot move request from {from} to {to}")]
    InvalidTransition {
        from: RequestStatus,
        to: RequestStatus,
    },

    #[error("cannot {action} while request is {status}")]
    InvalidState {
        status: RequestStatus,
        action: &'static str,
    },

    #[error("{0}")]
    Conflict(String),

    #[error("storage failure")]
    Storage(#[source] anyhow::Error),
}

impl SwoppError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Stable machine-readable code for the error kind.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::NotFound(_) => "not_found",
            Self::Forbidden(_) => "forbidden",
            Self::InvalidTransition { .. } => "invalid_transition",
            Self::InvalidState { .. } => "invalid_state",
            Self::Conflict(_) => "conflict",
            Self::Storage(_) => "storage_error",
        }
    }
}

impl From<anyhow::Error> for SwoppError {
    fn from(err: anyhow::Error) -> Self {
        if swopp_db::is_busy(&err) {
            Self::Conflict("request is being modified concurrently, retry".into())
        } else {
            Self::Storage(err)
        }
    }
}

pub type Result<T> = std::result::Result<T, SwoppError>;
