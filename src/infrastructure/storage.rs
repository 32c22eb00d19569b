use crate::config::StorageConfig;
use crate::services::storage::S3StorageService;
use aws_sdk_s3::config::{Credentials, Region};
use std::sync::Arc;
use tracing::info;

pub async fn setup_storage(config: &StorageConfig) -> Arc<S3StorageService> {
    info!(
        "☁️  S3 Storage: {} (Bucket: {})",
        config.endpoint_url, config.bucket
    );

    let aws_config = aws_config::from_env()
        .endpoint_url(&config.endpoint_url)
        .region(Region::new(config.region.clone()))
        .credentials_provider(Credentials::new(
            config.access_key.clone(),
            config.secret_key.clone(),
            None,
            None,
            "static",
        ))
        .load()
        .await;

    let s3_config = aws_sdk_s3::config::Builder::from(&aws_config)
        .force_path_style(true)
        .build();

    let s3_client = aws_sdk_s3::Client::from_conf(s3_config);
    Arc::new(S3StorageService::new(s3_client, config.bucket.clone()))
}
