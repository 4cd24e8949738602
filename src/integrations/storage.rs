use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::Client;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use tracing::{debug, info, instrument};

use crate::config::S3Config;
use crate::error::AppError;

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<(), AppError>;
}

pub struct S3DocumentStore {
    client: Client,
    bucket: String,
}

impl S3DocumentStore {
    pub async fn from_config(config: &S3Config) -> Self {
        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .load()
            .await;

        info!(bucket = %config.bucket, "S3 client initialized");

        Self {
            client: Client::new(&sdk_config),
            bucket: config.bucket.clone(),
        }
    }
}

#[async_trait]
impl DocumentStore for S3DocumentStore {
    #[instrument(skip(self, bytes), fields(size = bytes.len()))]
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<(), AppError> {
        debug!("Writing to S3 bucket {} with key: {}", self.bucket, key);

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(bytes))
            .content_type(content_type)
            .send()
            .await
            .map_err(|err| {
                AppError::ExternalService(format!(
                    "upload {}: {}",
                    key,
                    DisplayErrorContext(err)
                ))
            })?;

        Ok(())
    }
}
