#[macro_use]
extern crate rocket;

mod api;
mod auth;
mod config;
mod cors;
mod db;
mod error;
mod integrations;
mod models;
mod response;
mod services;
mod telemetry;
#[cfg(test)]
mod test;
mod validation;

use std::str::FromStr;
use std::time::Duration;

use api::attendance::{api_get_attendance, api_get_client_attendance, api_upsert_attendance};
use api::auth::{api_complete_challenge, api_login, api_logout, api_me, api_register};
use api::catchers::default_catcher;
use api::clients::{
    api_add_roster_interval, api_create_client, api_get_client, api_get_clients, api_get_roster,
    api_set_roster_end, api_update_client,
};
use api::public::{api_ping, api_submit_application, api_submit_contact};
use api::users::{api_delete_users, api_get_user, api_get_users, api_update_user};
use config::{AppConfig, ConfigError};
use cors::{Cors, preflight};
use db::clean_expired_sessions;
use error::AppError;
use integrations::Integrations;
use rocket::{Build, Rocket, tokio};
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use telemetry::{TelemetryFairing, init_tracing};
use thiserror::Error;
use tracing::{error, info};

const SESSION_PRUNE_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);
const DB_BUSY_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    Anyhow(#[from] anyhow::Error),
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("{0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("Migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
    #[error("Application error: {0}")]
    App(#[from] AppError),
    #[error("Launch error: {0}")]
    Launch(Box<rocket::Error>),
}

impl From<rocket::Error> for Error {
    fn from(value: rocket::Error) -> Self {
        Error::Launch(Box::new(value))
    }
}

fn spawn_session_pruning(pool: SqlitePool) {
    tokio::spawn(async move {
        loop {
            match clean_expired_sessions(&pool).await {
                Ok(count) => {
                    if count > 0 {
                        info!("Cleaned up {} expired sessions", count);
                    }
                }
                Err(e) => {
                    error!("Failed to clean expired sessions: {}", e);
                }
            }

            tokio::time::sleep(SESSION_PRUNE_INTERVAL).await;
        }
    });
}

#[rocket::main]
async fn main() -> Result<(), Error> {
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

    config::load_environment()?;
    let config = AppConfig::from_env()?;
    let _telemetry = init_tracing(&config)?;

    let options = SqliteConnectOptions::from_str(&config.database_url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(DB_BUSY_TIMEOUT);
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    info!("Running database migrations...");
    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("Migrations completed successfully");

    let integrations = Integrations::from_config(&config).await?;

    spawn_session_pruning(pool.clone());

    let result = init_rocket(pool.clone(), config, integrations).launch().await;

    info!("Closing database pool");
    pool.close().await;

    result?;
    Ok(())
}

pub fn init_rocket(pool: SqlitePool, config: AppConfig, integrations: Integrations) -> Rocket<Build> {
    info!(environment = config.env.as_str(), "Starting day program API");

    rocket::custom(config.figment())
        .attach(Cors::new(&config.cors))
        .attach(TelemetryFairing)
        .manage(pool)
        .manage(integrations)
        .manage(config)
        .mount(
            "/api",
            routes![
                api_login,
                api_logout,
                api_complete_challenge,
                api_register,
                api_me,
                api_get_users,
                api_get_user,
                api_update_user,
                api_delete_users,
                api_get_clients,
                api_get_client,
                api_update_client,
                api_create_client,
                api_get_roster,
                api_add_roster_interval,
                api_set_roster_end,
                api_get_attendance,
                api_upsert_attendance,
                api_get_client_attendance,
            ],
        )
        .mount("/public", routes![api_submit_contact, api_submit_application, api_ping])
        .mount("/", routes![preflight])
        .register("/", catchers![default_catcher])
}
