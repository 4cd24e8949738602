//! External collaborators: the identity provider, the notification mailer and
//! the document store. Each sits behind a trait so tests can swap in doubles.

pub mod identity;
pub mod mail;
pub mod storage;

use std::sync::Arc;

pub use identity::*;
pub use mail::*;
pub use storage::*;

use crate::config::AppConfig;
use crate::error::AppError;

#[derive(Clone)]
pub struct Integrations {
    pub identity: Arc<dyn IdentityProvider>,
    pub mailer: Arc<dyn Mailer>,
    pub documents: Arc<dyn DocumentStore>,
}

impl Integrations {
    /// Builds the AWS and SMTP backed implementations.
    pub async fn from_config(config: &AppConfig) -> Result<Self, AppError> {
        let identity = CognitoIdentityProvider::from_config(&config.cognito).await;
        let mailer = SmtpMailer::from_config(&config.smtp)?;
        let documents = S3DocumentStore::from_config(&config.s3).await;

        Ok(Self {
            identity: Arc::new(identity),
            mailer: Arc::new(mailer),
            documents: Arc::new(documents),
        })
    }
}
