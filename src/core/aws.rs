//! Shared AWS SDK configuration.

use aws_config::{BehaviorVersion, Region, SdkConfig};

use crate::config::AwsSettings;

/// Build an SDK config from explicit credentials, or the default provider
/// chain (env vars, profile, IAM role) when none are configured.
pub async fn load_sdk_config(settings: &AwsSettings) -> SdkConfig {
    let mut loader = aws_config::defaults(BehaviorVersion::latest());
    if let Some(region) = settings.region.clone() {
        loader = loader.region(Region::new(region));
    }

    if let (Some(access_key_id), Some(secret_access_key)) = (
        settings.access_key_id.as_deref(),
        settings.secret_access_key.as_deref(),
    ) {
        let credentials = aws_credential_types::Credentials::new(
            access_key_id,
            secret_access_key,
            settings.session_token.clone(),
            None, // Expiration
            "call-event-processor",
        );
        loader = loader.credentials_provider(credentials);
    }

    loader.load().await
}
