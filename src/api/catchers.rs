use rocket::Request;
use rocket::http::Status;
use rocket::response::status::Custom;
use rocket::serde::json::Json;

use crate::auth::recorded_failure;
use crate::response::FailBody;

/// Renders every unhandled error status in the failure envelope. Guard
/// failures carry their own message; everything else uses the status reason.
#[catch(default)]
pub fn default_catcher(status: Status, request: &Request<'_>) -> Custom<Json<FailBody>> {
    let message = recorded_failure(request).unwrap_or_else(|| match status.code {
        500..=599 => "Internal server error".to_string(),
        _ => status.reason_lossy().to_string(),
    });

    Custom(status, Json(FailBody::new(&message)))
}
