use chrono::{NaiveDateTime, Utc};
use rand::Rng;
use rand::distr::Alphanumeric;
use rocket::Request;
use rocket::http::{Cookie, SameSite};
use rocket::outcome::try_outcome;
use rocket::request::{FromRequest, Outcome};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::{Instrument, error, info, info_span};

use crate::config::SessionConfig;
use crate::db::{get_session, get_user};
use crate::error::AppError;

use super::{Role, User};

pub const SESSION_COOKIE: &str = "sid";

const SID_LENGTH: usize = 48;

/// Payload stored in the `sess` column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionData {
    pub uid: i64,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Session {
    pub sess: String,
    pub expire: NaiveDateTime,
}

impl Session {
    pub fn is_valid(&self) -> bool {
        self.expire > Utc::now().naive_utc()
    }

    pub fn data(&self) -> Result<SessionData, AppError> {
        Ok(serde_json::from_str(&self.sess)?)
    }
}

pub fn generate_sid() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(SID_LENGTH)
        .map(char::from)
        .collect()
}

pub fn session_cookie(sid: String, config: &SessionConfig) -> Cookie<'static> {
    let millis = i64::try_from(config.duration.as_millis()).unwrap_or(i64::MAX);
    let builder = Cookie::build((SESSION_COOKIE, sid))
        .path("/")
        .http_only(true)
        .max_age(rocket::time::Duration::milliseconds(millis));

    if config.cross_site {
        builder.secure(true).same_site(SameSite::None).build()
    } else {
        builder.same_site(SameSite::Lax).build()
    }
}

/// Message left behind by a failed guard so the catcher can render it.
#[derive(Debug, Default)]
pub struct AuthFailure(pub Option<String>);

fn reject<T>(request: &Request<'_>, error: AppError) -> Outcome<T, AppError> {
    error.log_and_record("Session guard");
    let message = error.to_fail_body().message;
    request.local_cache(|| AuthFailure(Some(message)));
    Outcome::Error((error.status_code(), error))
}

fn unauthorized() -> AppError {
    AppError::Authentication("Unauthorized".to_string())
}

async fn authenticate(request: &Request<'_>) -> Outcome<User, AppError> {
    let Some(sid) = request
        .cookies()
        .get_private(SESSION_COOKIE)
        .map(|cookie| cookie.value().to_string())
    else {
        return reject(request, unauthorized());
    };

    let Some(pool) = request.rocket().state::<SqlitePool>() else {
        error!("Database pool not found in managed state");
        return reject(
            request,
            AppError::Internal("Database pool not managed".to_string()),
        );
    };

    let session = match get_session(pool, &sid).await {
        Ok(session) if session.is_valid() => session,
        Ok(_) => {
            info!("Session expired");
            return reject(request, unauthorized());
        }
        Err(AppError::Authentication(_)) => return reject(request, unauthorized()),
        Err(err) => return reject(request, err),
    };

    let data = match session.data() {
        Ok(data) => data,
        Err(_) => return reject(request, unauthorized()),
    };

    match get_user(pool, data.uid).await {
        Ok(user) if !user.is_active() => reject(
            request,
            AppError::Authorization("User deactivated".to_string()),
        ),
        Ok(user) => {
            info!(username = %user.username, role = %user.role, "User authenticated via session");
            Outcome::Success(user)
        }
        Err(AppError::NotFound(_)) => reject(
            request,
            AppError::Authorization("User not found".to_string()),
        ),
        Err(err) => reject(request, err),
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for User {
    type Error = AppError;

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        authenticate(request)
            .instrument(info_span!("user_auth_guard"))
            .await
    }
}

/// A session user holding the `Admin` role.
#[derive(Debug, Clone)]
pub struct AdminUser(pub User);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AdminUser {
    type Error = AppError;

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let user = try_outcome!(request.guard::<User>().await);

        match user.require_role(Role::Admin) {
            Ok(()) => Outcome::Success(AdminUser(user)),
            Err(err) => reject(request, err),
        }
    }
}

/// Message recorded by a failed guard for this request, if any.
pub fn recorded_failure(request: &Request<'_>) -> Option<String> {
    request.local_cache(AuthFailure::default).0.clone()
}
