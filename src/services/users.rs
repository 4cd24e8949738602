use serde_json::json;
use sqlx::SqlitePool;
use tracing::{info, instrument, warn};

use crate::auth::User;
use crate::db;
use crate::error::AppError;
use crate::integrations::IdentityProvider;
use crate::validation::{UserData, UserRef};

#[instrument(skip(pool))]
pub async fn list_users(pool: &SqlitePool) -> Result<Vec<User>, AppError> {
    db::get_all_users(pool).await
}

#[instrument(skip(pool))]
pub async fn get_user(pool: &SqlitePool, id: i64) -> Result<User, AppError> {
    db::get_user(pool, id).await
}

#[instrument(skip(pool, data))]
pub async fn update_user(pool: &SqlitePool, id: i64, data: &UserData) -> Result<(), AppError> {
    match db::update_user(pool, id, data).await {
        Err(err) if err.is_unique_violation() => {
            Err(AppError::Conflict("Username already exists".to_string()))
        }
        result => result,
    }
}

async fn delete_one(
    pool: &SqlitePool,
    identity: &dyn IdentityProvider,
    target: &UserRef,
) -> Result<(), AppError> {
    identity
        .delete_user(&target.username)
        .await
        .map_err(|err| AppError::ExternalService(format!("delete provider user: {}", err)))?;

    let mut conn = pool.acquire().await?;
    db::delete_user(&mut *conn, target.id).await?;
    Ok(())
}

/// Deletes each user independently, provider account first. Items that fail
/// keep their local row and are reported; the ones that succeeded stay deleted.
#[instrument(skip_all, fields(count = targets.len()))]
pub async fn delete_users(
    pool: &SqlitePool,
    identity: &dyn IdentityProvider,
    targets: &[UserRef],
) -> Result<(), AppError> {
    let mut failed = Vec::new();

    for target in targets {
        match delete_one(pool, identity, target).await {
            Ok(()) => info!(user_id = target.id, "User deleted"),
            Err(err) => {
                warn!(user_id = target.id, error = %err, "User deletion failed");
                failed.push(target.clone());
            }
        }
    }

    if failed.is_empty() {
        Ok(())
    } else {
        Err(AppError::PartialFailure {
            message: "Some users failed to delete".to_string(),
            errors: json!(failed),
        })
    }
}
