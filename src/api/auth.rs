use rocket::State;
use rocket::http::{CookieJar, Status};
use rocket::serde::json::{self, Json};
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::info;

use crate::auth::{AdminUser, SESSION_COOKIE, User, session_cookie};
use crate::config::AppConfig;
use crate::error::AppError;
use crate::integrations::Integrations;
use crate::response::ApiSuccess;
use crate::services::auth::{self, ChallengeResponse, LoginOutcome};
use crate::validation::{CompleteChallenge, Credentials, JsonValidateExt, UserData};

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum LoginData {
    User(User),
    Challenge(ChallengeResponse),
}

#[post("/auth/login", data = "<credentials>")]
pub async fn api_login(
    credentials: Result<Json<Credentials>, json::Error<'_>>,
    cookies: &CookieJar<'_>,
    db: &State<SqlitePool>,
    integrations: &State<Integrations>,
    config: &State<AppConfig>,
) -> Result<ApiSuccess<LoginData>, AppError> {
    let credentials = credentials.validate_custom()?;

    match auth::login(
        db,
        integrations.identity.as_ref(),
        &config.session,
        &credentials,
    )
    .await?
    {
        LoginOutcome::LoggedIn { user, sid } => {
            cookies.add_private(session_cookie(sid, &config.session));
            info!(username = %user.username, "User logged in");
            Ok(ApiSuccess::ok(LoginData::User(user)).with_message("Logged in successfully"))
        }
        LoginOutcome::Challenge(challenge) => Ok(ApiSuccess::ok(LoginData::Challenge(challenge))
            .with_message("Password change required")),
    }
}

#[post("/auth/logout")]
pub async fn api_logout(
    user: User,
    cookies: &CookieJar<'_>,
    db: &State<SqlitePool>,
) -> Result<ApiSuccess<Option<()>>, AppError> {
    if let Some(sid) = cookies
        .get_private(SESSION_COOKIE)
        .map(|cookie| cookie.value().to_string())
    {
        auth::logout(db, &sid).await.map_err(|err| {
            err.log_and_record("Logout");
            AppError::Internal("Failed to logout".to_string())
        })?;
    }

    cookies.remove_private(SESSION_COOKIE);
    info!(username = %user.username, "User logged out");
    Ok(ApiSuccess::ok(None).with_message("Logged out successfully"))
}

#[post("/auth/challenge", data = "<request>")]
pub async fn api_complete_challenge(
    request: Result<Json<CompleteChallenge>, json::Error<'_>>,
    integrations: &State<Integrations>,
) -> Result<Status, AppError> {
    let request = request.validate_custom()?;
    auth::complete_challenge(integrations.identity.as_ref(), &request).await?;
    Ok(Status::NoContent)
}

#[post("/auth/register", data = "<user_data>")]
pub async fn api_register(
    _admin: AdminUser,
    user_data: Result<Json<UserData>, json::Error<'_>>,
    db: &State<SqlitePool>,
    integrations: &State<Integrations>,
    config: &State<AppConfig>,
) -> Result<Status, AppError> {
    let user_data = user_data.validate_custom()?;
    auth::register(
        db,
        integrations.identity.as_ref(),
        &config.cognito,
        &user_data,
    )
    .await?;
    Ok(Status::Created)
}

#[get("/auth/me")]
pub async fn api_me(user: User) -> ApiSuccess<User> {
    ApiSuccess::ok(user)
}
