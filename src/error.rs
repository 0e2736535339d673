//! Request-level error taxonomy.
//!
//! Every handler returns `Result<_, ApiError>`; the `IntoResponse` impl is the
//! single place where an error becomes an HTTP status and a `{ok:false, ...}`
//! body.

use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed or missing input.
    #[error("{0}")]
    Validation(String),

    /// Missing, invalid or expired credential.
    #[error("{0}")]
    Auth(String),

    /// Authenticated but not allowed.
    #[error("{message}")]
    Forbidden {
        message: String,
        details: Map<String, Value>,
    },

    #[error("{0}")]
    NotFound(String),

    /// Unique-constraint or state conflict.
    #[error("{message}")]
    Conflict {
        message: String,
        details: Map<String, Value>,
    },

    /// Anything unexpected. Logged, never shown to the client.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden {
            message: message.into(),
            details: Map::new(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
            details: Map::new(),
        }
    }

    /// Adds a field to the response body. Only Forbidden and Conflict carry details.
    pub fn with_detail(mut self, key: &str, value: impl Into<Value>) -> Self {
        if let Self::Forbidden { details, .. } | Self::Conflict { details, .. } = &mut self {
            details.insert(key.to_string(), value.into());
        }
        self
    }

    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Auth(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden { .. } => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict { .. } => StatusCode::CONFLICT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        Self::Internal(anyhow::Error::new(err).context("database error"))
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::Validation(format!("Invalid JSON body: {}", rejection.body_text()))
    }
}

impl From<PathRejection> for ApiError {
    fn from(_: PathRejection) -> Self {
        Self::Validation("Invalid id".to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let mut body = Map::new();
        body.insert("ok".to_string(), Value::Bool(false));

        match self {
            Self::Internal(err) => {
                error!("Internal error: {:#}", err);
                body.insert("error".to_string(), Value::from("Server error"));
            }
            Self::Forbidden { message, details } | Self::Conflict { message, details } => {
                body.insert("error".to_string(), Value::from(message));
                body.extend(details);
            }
            Self::Validation(message) | Self::Auth(message) | Self::NotFound(message) => {
                body.insert("error".to_string(), Value::from(message));
            }
        }

        (status, Json(Value::Object(body))).into_response()
    }
}
