use std::path::Path;
use std::time::Duration;

use rocket::data::{Limits, ToByteUnit};
use rocket::figment::Figment;
use thiserror::Error;
use tracing::{info, warn};

/// Largest accepted application document.
pub const MAX_DOCUMENT_BYTES: u64 = 5 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variables: {}", .0.join(", "))]
    Missing(Vec<String>),

    #[error("Invalid value for {key}: {reason}")]
    Invalid { key: String, reason: String },

    #[error("Failed to load environment file: {0}")]
    EnvFile(#[from] dotenvy::Error),
}

pub fn load_environment() -> Result<(), ConfigError> {
    let is_production = dotenvy::var("APP_ENV").unwrap_or("development".to_string()) == "production";

    let env_files = if is_production {
        vec!["config/common.env", "config/prod.env", ".secrets.env"]
    } else {
        vec!["config/common.env", "config/dev.env", ".secrets.env"]
    };

    for env_file in env_files {
        load_env_file(env_file)?;
    }

    Ok(())
}

fn load_env_file(path: &str) -> Result<(), ConfigError> {
    if !Path::new(path).exists() {
        warn!("Warning: Environment file {} not found, skipping", path);
        return Ok(());
    }

    dotenvy::from_filename_override(path)?;
    info!("Loaded environment from: {}", path);
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Production => "production",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub address: String,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Base64 or hex encoded 256-bit key used to encrypt the session cookie.
    pub secret: String,
    pub duration: Duration,
    /// Production cookies are `Secure` and `SameSite=None`.
    pub cross_site: bool,
}

#[derive(Debug, Clone)]
pub struct CognitoConfig {
    pub client_id: String,
    pub user_pool_id: String,
    pub region: String,
    pub temp_password: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct CorsConfig {
    pub internal_origin: String,
    pub public_origin: String,
}

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub sender: String,
    pub recipient: String,
}

#[derive(Debug, Clone)]
pub struct S3Config {
    pub region: String,
    pub bucket: String,
}

#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub otlp_endpoint: Option<String>,
    pub otlp_headers: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub env: Environment,
    pub server: ServerConfig,
    pub database_url: String,
    pub session: SessionConfig,
    pub cognito: CognitoConfig,
    pub cors: CorsConfig,
    pub smtp: SmtpConfig,
    pub s3: S3Config,
    pub max_application_files: usize,
    pub telemetry: TelemetryConfig,
}

struct EnvReader {
    missing: Vec<String>,
}

impl EnvReader {
    fn required(&mut self, key: &str) -> String {
        match dotenvy::var(key) {
            Ok(value) if !value.is_empty() => value,
            _ => {
                self.missing.push(key.to_string());
                String::new()
            }
        }
    }

    fn optional(&self, key: &str) -> Option<String> {
        dotenvy::var(key).ok().filter(|value| !value.is_empty())
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, ConfigError> {
    raw.parse::<T>().map_err(|_| ConfigError::Invalid {
        key: key.to_string(),
        reason: format!("'{}' is not a valid number", raw),
    })
}

impl AppConfig {
    /// Reads the configuration from the process environment, failing on the
    /// first pass with every missing required variable listed.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut env = EnvReader {
            missing: Vec::new(),
        };

        let app_env = env.optional("APP_ENV").unwrap_or("development".to_string());
        let port = env.required("API_PORT");
        let database_url = env.required("DATABASE_URL");
        let session_secret = env.required("SESSION_SECRET");
        let session_duration = env.required("SESSION_DURATION");
        let cognito_client_id = env.required("COGNITO_CLIENT_ID");
        let cognito_user_pool_id = env.required("COGNITO_USER_POOL_ID");
        let cognito_region = env.required("COGNITO_REGION");
        let cognito_temp_password = env.required("COGNITO_TEMP_PASSWORD");
        let app_url = env.required("APP_URL");
        let website_url = env.required("WEBSITE_URL");
        let smtp_host = env.required("SMTP_HOST");
        let smtp_port = env.required("SMTP_PORT");
        let smtp_username = env.required("SMTP_USERNAME");
        let smtp_password = env.required("SMTP_PSWD");
        let email_sender = env.required("EMAIL_SENDER");
        let email_recipient = env.required("EMAIL_RECIPIENT");
        let s3_region = env.required("S3_REGION");
        let s3_bucket = env.required("S3_BUCKET");

        if !env.missing.is_empty() {
            return Err(ConfigError::Missing(env.missing));
        }

        let environment = match app_env.as_str() {
            "production" => Environment::Production,
            "development" | "test" => Environment::Development,
            other => {
                return Err(ConfigError::Invalid {
                    key: "APP_ENV".to_string(),
                    reason: format!("unknown environment '{}'", other),
                });
            }
        };

        let identity_timeout = match env.optional("IDENTITY_TIMEOUT_SECS") {
            Some(raw) => parse_number::<u64>("IDENTITY_TIMEOUT_SECS", &raw)?,
            None => 10,
        };

        let max_application_files = match env.optional("MAX_APPLICATION_FILES") {
            Some(raw) => parse_number::<usize>("MAX_APPLICATION_FILES", &raw)?,
            None => 5,
        };

        Ok(Self {
            env: environment,
            server: ServerConfig {
                address: env.optional("API_ADDRESS").unwrap_or("0.0.0.0".to_string()),
                port: parse_number("API_PORT", &port)?,
            },
            database_url,
            session: SessionConfig {
                secret: session_secret,
                duration: Duration::from_millis(parse_number(
                    "SESSION_DURATION",
                    &session_duration,
                )?),
                cross_site: environment == Environment::Production,
            },
            cognito: CognitoConfig {
                client_id: cognito_client_id,
                user_pool_id: cognito_user_pool_id,
                region: cognito_region,
                temp_password: cognito_temp_password,
                timeout: Duration::from_secs(identity_timeout),
            },
            cors: CorsConfig {
                internal_origin: app_url,
                public_origin: website_url,
            },
            smtp: SmtpConfig {
                host: smtp_host,
                port: parse_number("SMTP_PORT", &smtp_port)?,
                username: smtp_username,
                password: smtp_password,
                sender: email_sender,
                recipient: email_recipient,
            },
            s3: S3Config {
                region: s3_region,
                bucket: s3_bucket,
            },
            max_application_files,
            telemetry: TelemetryConfig {
                otlp_endpoint: env.optional("OTEL_EXPORTER_OTLP_ENDPOINT"),
                otlp_headers: env.optional("OTEL_EXPORTER_OTLP_HEADERS"),
            },
        })
    }

    pub fn is_production(&self) -> bool {
        self.env == Environment::Production
    }

    /// Rocket settings derived from this configuration.
    pub fn figment(&self) -> Figment {
        let max_files = self.max_application_files.max(1) as u64;
        let limits = Limits::default()
            .limit("file", MAX_DOCUMENT_BYTES.bytes())
            .limit("data-form", (max_files * MAX_DOCUMENT_BYTES + 1024 * 1024).bytes());

        rocket::Config::figment()
            .merge(("address", self.server.address.clone()))
            .merge(("port", self.server.port))
            .merge(("secret_key", self.session.secret.clone()))
            .merge(("limits", limits))
            .merge(("cli_colors", false))
    }
}
