//! # Error Handling for the Marketplace API
//!
//! Every handler returns `Result<_, ApiError>`. The error type:
//! - maps to an appropriate HTTP status code
//! - sends a sanitized, user-friendly JSON body
//! - logs internal details (database errors, upstream failures) through `tracing`
//!
//! Database errors, storage failures and third-party responses are logged
//! server-side and never sent to clients.
//!
//! ```rust,ignore
//! async fn get_listing(
//!     State(state): State<AppState>,
//!     Path(id): Path<Uuid>,
//! ) -> Result<Json<Equipment>, ApiError> {
//!     let model = equipment::Entity::find_by_id(id)
//!         .one(&state.db)
//!         .await?
//!         .ok_or_else(|| ApiError::not_found("Equipment", Some(id.to_string())))?;
//!     Ok(Json(model.into()))
//! }
//! ```

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use sea_orm::{DbErr, SqlErr};
use serde::Serialize;
use std::fmt;

use crate::validation::{ValidationError, ValidationErrors};

/// API error type with automatic logging and sanitized responses
#[derive(Debug)]
pub enum ApiError {
    /// 404 Not Found - Resource doesn't exist
    NotFound {
        /// Resource type (e.g., "Equipment", "Booking")
        resource: String,
        /// Optional ID that wasn't found
        id: Option<String>,
    },

    /// 400 Bad Request - Invalid input from user
    BadRequest { message: String },

    /// 401 Unauthorized - Authentication required or failed
    Unauthorized { message: String },

    /// 403 Forbidden - User lacks permission
    Forbidden { message: String },

    /// 409 Conflict - State conflict (duplicate key, overlapping booking, illegal transition)
    Conflict { message: String },

    /// 422 Unprocessable Entity - Validation failed
    ValidationFailed { errors: Vec<String> },

    /// 500 Internal Server Error - Database error (details logged, not exposed)
    Database { message: String, internal: DbErr },

    /// 500 Internal Server Error - Generic internal error
    Internal {
        message: String,
        internal: Option<String>,
    },

    /// Custom error with specific status code
    Custom {
        status: StatusCode,
        message: String,
        internal: Option<String>,
    },
}

impl ApiError {
    pub fn not_found(resource: impl Into<String>, id: Option<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
            id,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized {
            message: message.into(),
        }
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden {
            message: message.into(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    pub fn validation_failed(errors: Vec<String>) -> Self {
        Self::ValidationFailed { errors }
    }

    /// Create a 500 from a database error. The details are logged, not returned.
    pub fn database(err: DbErr) -> Self {
        Self::Database {
            message: "A database error occurred".to_string(),
            internal: err,
        }
    }

    pub fn internal(message: impl Into<String>, internal: Option<String>) -> Self {
        Self::Internal {
            message: message.into(),
            internal,
        }
    }

    pub fn custom(status: StatusCode, message: impl Into<String>, internal: Option<String>) -> Self {
        Self::Custom {
            status,
            message: message.into(),
            internal,
        }
    }

    /// HTTP status code for this error
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Self::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            Self::Forbidden { .. } => StatusCode::FORBIDDEN,
            Self::Conflict { .. } => StatusCode::CONFLICT,
            Self::ValidationFailed { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Database { .. } | Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Custom { status, .. } => *status,
        }
    }

    /// User-facing (sanitized) message
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::NotFound { resource, id } => match id {
                Some(id) => format!("{resource} with ID '{id}' not found"),
                None => format!("{resource} not found"),
            },
            Self::ValidationFailed { errors } => {
                if errors.len() == 1 {
                    errors[0].clone()
                } else {
                    format!("Validation failed: {}", errors.join(", "))
                }
            }
            Self::BadRequest { message }
            | Self::Unauthorized { message }
            | Self::Forbidden { message }
            | Self::Conflict { message }
            | Self::Database { message, .. }
            | Self::Internal { message, .. }
            | Self::Custom { message, .. } => message.clone(),
        }
    }

    fn log_internal(&self) {
        match self {
            Self::Database { internal, .. } => {
                tracing::error!(error = ?internal, "Database error occurred");
            }
            Self::Internal {
                internal: Some(details),
                ..
            } => {
                tracing::error!(details = %details, "Internal error occurred");
            }
            Self::Custom {
                internal: Some(details),
                status,
                ..
            } => {
                tracing::error!(status = %status, details = %details, "Custom error occurred");
            }
            _ => {
                tracing::debug!(
                    error = %self.user_message(),
                    status = %self.status_code(),
                    "API error"
                );
            }
        }
    }
}

/// Error body sent to clients
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Vec<String>>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        self.log_internal();

        let status = self.status_code();
        let response = match &self {
            Self::ValidationFailed { errors } => ErrorResponse {
                error: "Validation failed".to_string(),
                details: Some(errors.clone()),
            },
            _ => ErrorResponse {
                error: self.user_message(),
                details: None,
            },
        };

        (status, Json(response)).into_response()
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.user_message())
    }
}

impl std::error::Error for ApiError {}

/// `RecordNotFound` becomes 404, unique violations become 409, the rest 500.
impl From<DbErr> for ApiError {
    fn from(err: DbErr) -> Self {
        if let DbErr::RecordNotFound(msg) = &err {
            let resource = msg.split_whitespace().next().unwrap_or("Resource");
            return Self::NotFound {
                resource: resource.to_string(),
                id: None,
            };
        }
        if let Some(SqlErr::UniqueConstraintViolation(detail)) = err.sql_err() {
            tracing::debug!(detail = %detail, "Unique constraint violation");
            return Self::Conflict {
                message: "A record with the same unique value already exists".to_string(),
            };
        }
        Self::database(err)
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        Self::ValidationFailed {
            errors: vec![err.to_string()],
        }
    }
}

impl From<ValidationErrors> for ApiError {
    fn from(errors: ValidationErrors) -> Self {
        Self::ValidationFailed {
            errors: errors.errors().iter().map(ToString::to_string).collect(),
        }
    }
}
