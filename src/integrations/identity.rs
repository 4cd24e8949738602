use async_trait::async_trait;
use aws_config::timeout::TimeoutConfig;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_cognitoidentityprovider::Client;
use aws_sdk_cognitoidentityprovider::error::DisplayErrorContext;
use aws_sdk_cognitoidentityprovider::types::{
    AttributeType, AuthFlowType, ChallengeNameType, MessageActionType,
};
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::config::CognitoConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    Authenticated,
    /// The provider wants another step (e.g. a forced password change) first.
    Challenge { name: String, session: String },
}

#[derive(Debug, Error)]
pub enum IdentityError {
    /// Wrong credentials, unknown user, or a rejected challenge.
    #[error("Not authorized")]
    NotAuthorized,

    #[error("{0}")]
    Service(String),
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn authenticate(&self, username: &str, password: &str)
    -> Result<AuthOutcome, IdentityError>;

    async fn complete_new_password_challenge(
        &self,
        username: &str,
        new_password: &str,
        session: &str,
    ) -> Result<(), IdentityError>;

    async fn create_user(&self, username: &str, temporary_password: &str)
    -> Result<(), IdentityError>;

    async fn add_user_to_group(&self, username: &str, group: &str) -> Result<(), IdentityError>;

    async fn delete_user(&self, username: &str) -> Result<(), IdentityError>;
}

pub struct CognitoIdentityProvider {
    client: Client,
    client_id: String,
    user_pool_id: String,
}

impl CognitoIdentityProvider {
    pub async fn from_config(config: &CognitoConfig) -> Self {
        let timeouts = TimeoutConfig::builder()
            .operation_timeout(config.timeout)
            .build();

        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .timeout_config(timeouts)
            .load()
            .await;

        info!(region = %config.region, "Cognito client initialized");

        Self {
            client: Client::new(&sdk_config),
            client_id: config.client_id.clone(),
            user_pool_id: config.user_pool_id.clone(),
        }
    }
}

fn service_error<E>(err: E) -> IdentityError
where
    E: std::error::Error + Send + Sync + 'static,
{
    IdentityError::Service(DisplayErrorContext(err).to_string())
}

#[async_trait]
impl IdentityProvider for CognitoIdentityProvider {
    #[instrument(skip(self, password))]
    async fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> Result<AuthOutcome, IdentityError> {
        let output = self
            .client
            .initiate_auth()
            .auth_flow(AuthFlowType::UserPasswordAuth)
            .client_id(&self.client_id)
            .auth_parameters("USERNAME", username)
            .auth_parameters("PASSWORD", password)
            .send()
            .await
            .map_err(|err| {
                let rejected = err.as_service_error().is_some_and(|e| {
                    e.is_not_authorized_exception() || e.is_user_not_found_exception()
                });
                if rejected {
                    IdentityError::NotAuthorized
                } else {
                    service_error(err)
                }
            })?;

        if let Some(challenge) = output.challenge_name() {
            let session = output.session().ok_or_else(|| {
                IdentityError::Service("Challenge response missing session".to_string())
            })?;
            return Ok(AuthOutcome::Challenge {
                name: challenge.as_str().to_string(),
                session: session.to_string(),
            });
        }

        Ok(AuthOutcome::Authenticated)
    }

    #[instrument(skip(self, new_password, session))]
    async fn complete_new_password_challenge(
        &self,
        username: &str,
        new_password: &str,
        session: &str,
    ) -> Result<(), IdentityError> {
        let output = self
            .client
            .respond_to_auth_challenge()
            .client_id(&self.client_id)
            .challenge_name(ChallengeNameType::NewPasswordRequired)
            .session(session)
            .challenge_responses("USERNAME", username)
            .challenge_responses("NEW_PASSWORD", new_password)
            .send()
            .await
            .map_err(|err| {
                if err
                    .as_service_error()
                    .is_some_and(|e| e.is_not_authorized_exception())
                {
                    IdentityError::NotAuthorized
                } else {
                    service_error(err)
                }
            })?;

        match output.authentication_result().and_then(|r| r.id_token()) {
            Some(_) => Ok(()),
            None => Err(IdentityError::NotAuthorized),
        }
    }

    #[instrument(skip(self, temporary_password))]
    async fn create_user(
        &self,
        username: &str,
        temporary_password: &str,
    ) -> Result<(), IdentityError> {
        let email = AttributeType::builder()
            .name("email")
            .value(format!("{}@placeholder.com", username))
            .build()
            .map_err(service_error)?;
        let email_verified = AttributeType::builder()
            .name("email_verified")
            .value("true")
            .build()
            .map_err(service_error)?;

        let output = self
            .client
            .admin_create_user()
            .user_pool_id(&self.user_pool_id)
            .username(username)
            .temporary_password(temporary_password)
            .message_action(MessageActionType::Suppress)
            .user_attributes(email)
            .user_attributes(email_verified)
            .send()
            .await
            .map_err(service_error)?;

        if output.user().is_none() {
            return Err(IdentityError::Service(
                "Identity provider returned no user".to_string(),
            ));
        }

        Ok(())
    }

    #[instrument(skip(self))]
    async fn add_user_to_group(&self, username: &str, group: &str) -> Result<(), IdentityError> {
        self.client
            .admin_add_user_to_group()
            .user_pool_id(&self.user_pool_id)
            .username(username)
            .group_name(group)
            .send()
            .await
            .map_err(service_error)?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete_user(&self, username: &str) -> Result<(), IdentityError> {
        match self
            .client
            .admin_delete_user()
            .user_pool_id(&self.user_pool_id)
            .username(username)
            .send()
            .await
        {
            Ok(_) => Ok(()),
            Err(err)
                if err
                    .as_service_error()
                    .is_some_and(|e| e.is_user_not_found_exception()) =>
            {
                warn!("Identity provider account already absent");
                Ok(())
            }
            Err(err) => Err(service_error(err)),
        }
    }
}
