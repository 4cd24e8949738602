//! The JSON envelope every API response is wrapped in.
//!
//! Success: `{"success": true, "data": ..., "message": "..."}`
//! Failure: `{"success": false, "message": "...", "errors": ...}` (`errors` omitted when empty)

use rocket::http::Status;
use rocket::response::status::Custom;
use rocket::response::{self, Responder};
use rocket::serde::json::Json;
use rocket::Request;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Serialize, Deserialize)]
pub struct SuccessBody<T> {
    pub success: bool,
    pub data: T,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailBody {
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<Value>,
}

impl FailBody {
    pub fn new(message: &str) -> Self {
        Self {
            success: false,
            message: message.to_string(),
            errors: None,
        }
    }

    pub fn with_errors(message: &str, errors: Value) -> Self {
        Self {
            success: false,
            message: message.to_string(),
            errors: Some(errors),
        }
    }
}

/// A successful response carrying `data` in the envelope.
pub struct ApiSuccess<T> {
    status: Status,
    data: T,
    message: String,
}

impl<T: Serialize> ApiSuccess<T> {
    pub fn ok(data: T) -> Self {
        Self {
            status: Status::Ok,
            data,
            message: "OK".to_string(),
        }
    }

    pub fn created(data: T) -> Self {
        Self {
            status: Status::Created,
            data,
            message: "Created".to_string(),
        }
    }

    pub fn with_message(mut self, message: &str) -> Self {
        self.message = message.to_string();
        self
    }
}

impl<'r, T: Serialize> Responder<'r, 'static> for ApiSuccess<T> {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'static> {
        Custom(
            self.status,
            Json(SuccessBody {
                success: true,
                data: self.data,
                message: self.message,
            }),
        )
        .respond_to(req)
    }
}
