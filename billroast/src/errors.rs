use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error as ThisError;
use utoipa::ToSchema;

#[derive(ThisError, Debug)]
pub enum Error {
    /// Malformed or missing client input
    #[error("{message}")]
    BadRequest { message: String },

    /// Requested resource not found
    #[error("{resource} '{id}' not found")]
    NotFound { resource: String, id: String },

    /// Unexpected fault while performing an operation ("upload", "analysis", ...)
    #[error("Internal Server Error during {operation}")]
    Internal { operation: String },

    /// An operation did not complete in time; safe for the client to retry
    #[error("{operation} timed out")]
    Timeout { operation: String },
}

/// JSON body returned for every error response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    #[schema(example = "No file uploaded")]
    pub error: String,
}

impl Error {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Error::BadRequest { message: message.into() }
    }

    pub fn internal(operation: impl Into<String>) -> Self {
        Error::Internal {
            operation: operation.into(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Error::NotFound { .. } => StatusCode::NOT_FOUND,
            Error::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Timeout { .. } => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Returns a user-safe error message, without leaking internal implementation details
    pub fn user_message(&self) -> String {
        match self {
            Error::BadRequest { message } => message.clone(),
            Error::NotFound { .. } | Error::Internal { .. } | Error::Timeout { .. } => self.to_string(),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        match &self {
            Error::Internal { .. } => {
                tracing::error!("Internal service error: {}", self);
            }
            Error::Timeout { .. } => {
                tracing::warn!("Timeout: {}", self);
            }
            Error::BadRequest { .. } | Error::NotFound { .. } => {
                tracing::debug!("Client error: {}", self);
            }
        }

        let body = ErrorBody { error: self.user_message() };
        (self.status_code(), Json(body)).into_response()
    }
}

/// Type alias for handler results
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(Error::bad_request("No file uploaded").status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            Error::NotFound {
                resource: "File".into(),
                id: "x.png".into()
            }
            .status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(Error::internal("upload").status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            Error::Timeout {
                operation: "Analysis".into()
            }
            .status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn test_internal_messages_name_the_operation() {
        assert_eq!(Error::internal("upload").user_message(), "Internal Server Error during upload");
        assert_eq!(Error::internal("analysis").user_message(), "Internal Server Error during analysis");
    }
}
