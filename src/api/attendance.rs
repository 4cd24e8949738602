use rocket::State;
use rocket::http::Status;
use rocket::serde::json::{self, Json};
use sqlx::SqlitePool;

use crate::auth::User;
use crate::error::AppError;
use crate::models::{AttendanceEntry, ClientAttendanceMap};
use crate::response::ApiSuccess;
use crate::services::attendance;
use crate::validation::{
    AttendanceQuery, AttendanceUpsert, ClientAttendanceQuery, JsonValidateListExt,
};

#[get("/attendance?<date>&<side>")]
pub async fn api_get_attendance(
    _user: User,
    date: Option<&str>,
    side: Option<&str>,
    db: &State<SqlitePool>,
) -> Result<ApiSuccess<Vec<AttendanceEntry>>, AppError> {
    let query = AttendanceQuery::parse(date, side)?;
    Ok(ApiSuccess::ok(attendance::get_attendance(db, query).await?))
}

#[post("/attendance", data = "<records>")]
pub async fn api_upsert_attendance(
    _user: User,
    records: Result<Json<Vec<AttendanceUpsert>>, json::Error<'_>>,
    db: &State<SqlitePool>,
) -> Result<Status, AppError> {
    let records = records.validate_each()?;
    attendance::upsert_attendance(db, &records).await?;
    Ok(Status::NoContent)
}

#[get("/attendance/client?<month>&<cid>")]
pub async fn api_get_client_attendance(
    _user: User,
    month: Option<&str>,
    cid: Option<&str>,
    db: &State<SqlitePool>,
) -> Result<ApiSuccess<ClientAttendanceMap>, AppError> {
    let query = ClientAttendanceQuery::parse(month, cid)?;
    Ok(ApiSuccess::ok(
        attendance::get_client_attendance(db, query).await?,
    ))
}
