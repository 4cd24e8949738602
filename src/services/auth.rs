use chrono::{TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::{info, instrument, warn};

use crate::auth::{SessionData, User, generate_sid};
use crate::config::{CognitoConfig, SessionConfig};
use crate::db;
use crate::error::AppError;
use crate::integrations::{AuthOutcome, IdentityError, IdentityProvider};
use crate::validation::{CompleteChallenge, Credentials, UserData};

/// Returned instead of a user when the provider requires another step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChallengeResponse {
    pub challenge: String,
    pub session: String,
    pub username: String,
}

#[derive(Debug)]
pub enum LoginOutcome {
    LoggedIn { user: User, sid: String },
    Challenge(ChallengeResponse),
}

fn session_lifetime(config: &SessionConfig) -> TimeDelta {
    TimeDelta::from_std(config.duration).unwrap_or(TimeDelta::days(1))
}

#[instrument(skip_all, fields(username = %credentials.username))]
pub async fn login(
    pool: &SqlitePool,
    identity: &dyn IdentityProvider,
    session_config: &SessionConfig,
    credentials: &Credentials,
) -> Result<LoginOutcome, AppError> {
    match identity
        .authenticate(&credentials.username, &credentials.password)
        .await
    {
        Ok(AuthOutcome::Authenticated) => {}
        Ok(AuthOutcome::Challenge { name, session }) => {
            info!(challenge = %name, "Login requires challenge");
            return Ok(LoginOutcome::Challenge(ChallengeResponse {
                challenge: name,
                session,
                username: credentials.username.clone(),
            }));
        }
        Err(IdentityError::NotAuthorized) => {
            return Err(AppError::Authentication(
                "Incorrect username or password".to_string(),
            ));
        }
        Err(IdentityError::Service(detail)) => {
            return Err(AppError::Provider {
                message: "Authentication failed".to_string(),
                detail,
            });
        }
    }

    let user = db::get_user_by_username(pool, &credentials.username).await?;

    if !user.is_active() {
        return Err(AppError::Authorization("User deactivated".to_string()));
    }

    let sid = generate_sid();
    let expire = Utc::now().naive_utc() + session_lifetime(session_config);
    db::create_session(pool, &sid, &SessionData { uid: user.id }, expire).await?;

    info!(user_id = user.id, "Session created");
    Ok(LoginOutcome::LoggedIn { user, sid })
}

#[instrument(skip_all, fields(username = %request.username))]
pub async fn complete_challenge(
    identity: &dyn IdentityProvider,
    request: &CompleteChallenge,
) -> Result<(), AppError> {
    identity
        .complete_new_password_challenge(&request.username, &request.new_password, &request.session)
        .await
        .map_err(|err| match err {
            IdentityError::NotAuthorized => {
                AppError::Authentication("Password challenge failed".to_string())
            }
            IdentityError::Service(detail) => AppError::Provider {
                message: "Password challenge failed".to_string(),
                detail,
            },
        })
}

/// Creates the identity-provider account first and the local row last, so no
/// database write is held open across provider calls. Any failure after the
/// provider account exists removes it again.
#[instrument(skip_all, fields(username = %data.username, role = %data.role))]
pub async fn register(
    pool: &SqlitePool,
    identity: &dyn IdentityProvider,
    cognito: &CognitoConfig,
    data: &UserData,
) -> Result<i64, AppError> {
    match db::get_user_by_username(pool, &data.username).await {
        Ok(_) => return Err(AppError::Conflict("Username already exists".to_string())),
        Err(AppError::NotFound(_)) => {}
        Err(err) => return Err(err),
    }

    identity
        .create_user(&data.username, &cognito.temp_password)
        .await
        .map_err(|err| AppError::ExternalService(format!("create provider user: {}", err)))?;

    if let Err(err) = identity
        .add_user_to_group(&data.username, data.role.group_name())
        .await
    {
        remove_provider_user(identity, &data.username).await;
        return Err(AppError::ExternalService(format!(
            "add provider user to group: {}",
            err
        )));
    }

    let inserted = match pool.acquire().await {
        Ok(mut conn) => db::insert_user(&mut *conn, data).await,
        Err(err) => Err(err.into()),
    };

    match inserted {
        Ok(id) => {
            info!(user_id = id, "User registered");
            Ok(id)
        }
        Err(err) => {
            remove_provider_user(identity, &data.username).await;
            if err.is_unique_violation() {
                Err(AppError::Conflict("Username already exists".to_string()))
            } else {
                Err(err)
            }
        }
    }
}

async fn remove_provider_user(identity: &dyn IdentityProvider, username: &str) {
    if let Err(err) = identity.delete_user(username).await {
        warn!(error = %err, "Failed to remove provider user after registration failure");
    }
}

#[instrument(skip_all)]
pub async fn logout(pool: &SqlitePool, sid: &str) -> Result<(), AppError> {
    db::delete_session(pool, sid).await
}
