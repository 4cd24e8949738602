use rocket::State;
use rocket::http::Status;
use rocket::serde::json::{self, Json};
use sqlx::SqlitePool;

use crate::auth::User;
use crate::error::AppError;
use crate::models::{Client, CreatedId, RosterInterval};
use crate::response::ApiSuccess;
use crate::services::clients;
use crate::validation::{
    ClientData, CreateClient, DateParam, JsonValidateExt, RosterEnd, RosterEnrollment, SerialId,
};

#[get("/clients?<name>")]
pub async fn api_get_clients(
    _user: User,
    name: Option<&str>,
    db: &State<SqlitePool>,
) -> Result<ApiSuccess<Vec<Client>>, AppError> {
    Ok(ApiSuccess::ok(clients::list_clients(db, name).await?))
}

#[get("/clients/<id>")]
pub async fn api_get_client(
    id: Result<SerialId, AppError>,
    _user: User,
    db: &State<SqlitePool>,
) -> Result<ApiSuccess<Client>, AppError> {
    let SerialId(id) = id?;
    Ok(ApiSuccess::ok(clients::get_client(db, id).await?))
}

#[put("/clients/<id>", data = "<client_data>")]
pub async fn api_update_client(
    id: Result<SerialId, AppError>,
    _user: User,
    client_data: Result<Json<ClientData>, json::Error<'_>>,
    db: &State<SqlitePool>,
) -> Result<Status, AppError> {
    let SerialId(id) = id?;
    let client_data = client_data.validate_custom()?;
    clients::update_client(db, id, &client_data).await?;
    Ok(Status::NoContent)
}

#[post("/clients", data = "<request>")]
pub async fn api_create_client(
    _user: User,
    request: Result<Json<CreateClient>, json::Error<'_>>,
    db: &State<SqlitePool>,
) -> Result<ApiSuccess<CreatedId>, AppError> {
    let request = request.validate_custom()?;
    let id = clients::create_client(db, &request).await?;
    Ok(ApiSuccess::created(CreatedId { id }).with_message("Client created"))
}

#[get("/clients/<id>/roster")]
pub async fn api_get_roster(
    id: Result<SerialId, AppError>,
    _user: User,
    db: &State<SqlitePool>,
) -> Result<ApiSuccess<Vec<RosterInterval>>, AppError> {
    let SerialId(id) = id?;
    Ok(ApiSuccess::ok(clients::get_roster(db, id).await?))
}

#[post("/clients/<id>/roster", data = "<request>")]
pub async fn api_add_roster_interval(
    id: Result<SerialId, AppError>,
    _user: User,
    request: Result<Json<RosterEnrollment>, json::Error<'_>>,
    db: &State<SqlitePool>,
) -> Result<Status, AppError> {
    let SerialId(id) = id?;
    let request = request.validate_custom()?;
    clients::add_roster_interval(db, id, &request).await?;
    Ok(Status::Created)
}

#[put("/clients/<id>/roster/<start>", data = "<request>")]
pub async fn api_set_roster_end(
    id: Result<SerialId, AppError>,
    start: Result<DateParam, AppError>,
    _user: User,
    request: Result<Json<RosterEnd>, json::Error<'_>>,
    db: &State<SqlitePool>,
) -> Result<Status, AppError> {
    let SerialId(id) = id?;
    let DateParam(start) = start?;
    let request = request.validate_custom()?;
    clients::set_roster_end(db, id, start, request.end_date).await?;
    Ok(Status::NoContent)
}
