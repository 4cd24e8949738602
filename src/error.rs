use opentelemetry_semantic_conventions::{attribute::OTEL_STATUS_CODE, trace::ERROR_TYPE};
use rocket::http::Status;
use rocket::response::status::Custom;
use rocket::serde::json::Json;
use serde_json::{Value, json};
use thiserror::Error;
use tracing::{Span, error, warn};

use crate::response::FailBody;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Validation error: {message}")]
    Validation { message: String, errors: Value },

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Authorization error: {0}")]
    Authorization(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Partial failure: {message}")]
    PartialFailure { message: String, errors: Value },

    /// Identity provider failure whose detail is returned to the caller.
    #[error("{message}: {detail}")]
    Provider { message: String, detail: String },

    #[error("External service error: {0}")]
    ExternalService(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn validation(source: &str, errors: Value) -> Self {
        AppError::Validation {
            message: format!("{} validation failed", source),
            errors,
        }
    }

    pub fn log_and_record(&self, ctx: &str) {
        let current_span = Span::current();
        let is_valid_span = !current_span.is_none();

        let message = self.to_string();
        let error_kind = match self {
            AppError::Database(err) => {
                error!(error = %message, context = %ctx, db_error = %err, "Database error");
                "database_error"
            }
            AppError::Validation { errors, .. } => {
                warn!(message = %message, context = %ctx, errors = %errors, "Validation error");
                "validation_error"
            }
            AppError::Authentication(msg) => {
                warn!(message = %msg, context = %ctx, "Authentication error");
                "authentication_error"
            }
            AppError::Authorization(msg) => {
                warn!(message = %msg, context = %ctx, "Authorization error");
                "authorization_error"
            }
            AppError::NotFound(msg) => {
                warn!(message = %msg, context = %ctx, "Not found error");
                "not_found_error"
            }
            AppError::Conflict(msg) => {
                warn!(message = %msg, context = %ctx, "Conflict error");
                "conflict_error"
            }
            AppError::PartialFailure { errors, .. } => {
                warn!(message = %message, context = %ctx, failed = %errors, "Partial failure");
                "partial_failure"
            }
            AppError::Provider { detail, .. } => {
                error!(message = %message, context = %ctx, detail = %detail, "Identity provider error");
                "identity_provider_error"
            }
            AppError::ExternalService(msg) => {
                error!(message = %msg, context = %ctx, "External service error");
                "external_service_error"
            }
            AppError::Internal(msg) => {
                error!(message = %msg, context = %ctx, "Internal server error");
                "internal_error"
            }
        };

        if is_valid_span {
            current_span.record("error", tracing::field::display(true));
            current_span.record(ERROR_TYPE, tracing::field::display(error_kind));
            current_span.record("error.message", tracing::field::display(&message));

            match self {
                AppError::Database(_)
                | AppError::Internal(_)
                | AppError::ExternalService(_)
                | AppError::Provider { .. } => {
                    current_span.record(OTEL_STATUS_CODE, tracing::field::display("ERROR"));
                }
                _ => {}
            }
        }
    }

    pub fn status_code(&self) -> Status {
        match self {
            AppError::Database(_) => Status::InternalServerError,
            AppError::Validation { .. } => Status::BadRequest,
            AppError::Authentication(_) => Status::Unauthorized,
            AppError::Authorization(_) => Status::Forbidden,
            AppError::NotFound(_) => Status::NotFound,
            AppError::Conflict(_) => Status::Conflict,
            AppError::PartialFailure { .. } => Status::MultiStatus,
            AppError::Provider { .. } => Status::InternalServerError,
            AppError::ExternalService(_) => Status::InternalServerError,
            AppError::Internal(_) => Status::InternalServerError,
        }
    }

    /// Failure envelope sent to the client. Internal detail never leaves the process.
    pub fn to_fail_body(&self) -> FailBody {
        match self {
            AppError::Validation { message, errors }
            | AppError::PartialFailure { message, errors } => {
                FailBody::with_errors(message, errors.clone())
            }
            AppError::Authentication(msg)
            | AppError::Authorization(msg)
            | AppError::NotFound(msg)
            | AppError::Conflict(msg) => FailBody::new(msg),
            AppError::Provider { message, detail } => {
                FailBody::with_errors(message, json!([detail]))
            }
            AppError::Database(_) | AppError::ExternalService(_) | AppError::Internal(_) => {
                FailBody::new("Internal server error")
            }
        }
    }

    pub fn to_status_with_log(&self, context: &str) -> Status {
        self.log_and_record(context);
        self.status_code()
    }

    pub fn is_unique_violation(&self) -> bool {
        match self {
            AppError::Database(err) => err
                .as_database_error()
                .is_some_and(|db_err| db_err.is_unique_violation()),
            _ => false,
        }
    }
}

impl<'r> rocket::response::Responder<'r, 'static> for AppError {
    fn respond_to(self, req: &'r rocket::Request<'_>) -> rocket::response::Result<'static> {
        let status = self.to_status_with_log(&format!("Request to {} {}", req.method(), req.uri()));
        Custom(status, Json(self.to_fail_body())).respond_to(req)
    }
}

impl From<serde_json::Error> for AppError {
    fn from(error: serde_json::Error) -> Self {
        AppError::Internal(format!("Serialization error: {}", error))
    }
}
