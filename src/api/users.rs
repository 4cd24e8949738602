use rocket::State;
use rocket::http::Status;
use rocket::serde::json::{self, Json};
use sqlx::SqlitePool;

use crate::auth::{AdminUser, User};
use crate::error::AppError;
use crate::integrations::Integrations;
use crate::response::ApiSuccess;
use crate::services::users;
use crate::validation::{JsonValidateExt, JsonValidateListExt, SerialId, UserData, UserRef};

#[get("/users")]
pub async fn api_get_users(
    _admin: AdminUser,
    db: &State<SqlitePool>,
) -> Result<ApiSuccess<Vec<User>>, AppError> {
    Ok(ApiSuccess::ok(users::list_users(db).await?))
}

#[get("/users/<id>")]
pub async fn api_get_user(
    id: Result<SerialId, AppError>,
    _admin: AdminUser,
    db: &State<SqlitePool>,
) -> Result<ApiSuccess<User>, AppError> {
    let SerialId(id) = id?;
    Ok(ApiSuccess::ok(users::get_user(db, id).await?))
}

#[put("/users/<id>", data = "<user_data>")]
pub async fn api_update_user(
    id: Result<SerialId, AppError>,
    _admin: AdminUser,
    user_data: Result<Json<UserData>, json::Error<'_>>,
    db: &State<SqlitePool>,
) -> Result<Status, AppError> {
    let SerialId(id) = id?;
    let user_data = user_data.validate_custom()?;
    users::update_user(db, id, &user_data).await?;
    Ok(Status::NoContent)
}

#[delete("/users", data = "<targets>")]
pub async fn api_delete_users(
    _admin: AdminUser,
    targets: Result<Json<Vec<UserRef>>, json::Error<'_>>,
    db: &State<SqlitePool>,
    integrations: &State<Integrations>,
) -> Result<Status, AppError> {
    let targets = targets.validate_each()?;
    users::delete_users(db, integrations.identity.as_ref(), &targets).await?;
    Ok(Status::NoContent)
}
