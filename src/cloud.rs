use anyhow::anyhow;
use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_iam::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{
    BucketLocationConstraint, CreateBucketConfiguration, PublicAccessBlockConfiguration,
};
use serde_json::json;
use tracing::debug;

use crate::error::RemoteError;
use crate::keys::{IssuerDocuments, DISCOVERY_DOCUMENT_KEY, JWKS_KEY};
use crate::models::strip_scheme;

/// Audiences trusted by the OIDC provider
pub const OIDC_CLIENT_IDS: [&str; 2] = ["openshift", "sts.amazonaws.com"];

/// Bucket policy letting STS fetch the issuer documents anonymously
pub fn public_read_policy(bucket: &str) -> serde_json::Value {
    json!({
        "Version": "2012-10-17",
        "Statement": [{
            "Effect": "Allow",
            "Principal": "*",
            "Action": "s3:GetObject",
            "Resource": format!("arn:aws:s3:::{}/*", bucket),
        }]
    })
}

/// Cloud side of an OIDC config: the IAM OIDC provider plus, for unmanaged
/// configs, the bucket serving the issuer documents and the secret holding
/// the signing key.
#[async_trait]
pub trait CloudProvider: Send + Sync {
    fn region(&self) -> Option<&str>;

    /// Creates the IAM OIDC provider for `issuer_url` and returns its ARN.
    async fn create_oidc_provider(&self, issuer_url: &str) -> Result<String, RemoteError>;
    async fn find_oidc_provider(&self, issuer_url: &str) -> Result<Option<String>, RemoteError>;
    async fn delete_oidc_provider(&self, arn: &str) -> Result<(), RemoteError>;

    async fn publish_issuer(
        &self,
        bucket: &str,
        documents: &IssuerDocuments,
    ) -> Result<(), RemoteError>;
    async fn delete_issuer(&self, bucket: &str) -> Result<(), RemoteError>;

    /// Stores `value` as a new secret and returns its ARN.
    async fn create_secret(&self, name: &str, value: &str) -> Result<String, RemoteError>;
    async fn delete_secret(&self, arn: &str) -> Result<(), RemoteError>;
}

pub struct AwsProvider {
    region: Option<String>,
    iam: aws_sdk_iam::Client,
    s3: aws_sdk_s3::Client,
    secrets: aws_sdk_secretsmanager::Client,
}

impl AwsProvider {
    /// Resolves credentials and region from the standard AWS chain. Nothing
    /// is sent until a method is called.
    pub async fn load(region: Option<String>) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = region {
            loader = loader.region(Region::new(region));
        }
        let config = loader.load().await;
        Self {
            region: config.region().map(|r| r.to_string()),
            iam: aws_sdk_iam::Client::new(&config),
            s3: aws_sdk_s3::Client::new(&config),
            secrets: aws_sdk_secretsmanager::Client::new(&config),
        }
    }
}

#[async_trait]
impl CloudProvider for AwsProvider {
    fn region(&self) -> Option<&str> {
        self.region.as_deref()
    }

    async fn create_oidc_provider(&self, issuer_url: &str) -> Result<String, RemoteError> {
        debug!("creating OIDC provider for {}", issuer_url);
        let mut req = self.iam.create_open_id_connect_provider().url(issuer_url);
        for client_id in OIDC_CLIENT_IDS {
            req = req.client_id_list(client_id);
        }
        let out = req.send().await.map_err(sdk_error)?;
        out.open_id_connect_provider_arn()
            .map(str::to_string)
            .ok_or_else(|| anyhow!("no ARN returned for OIDC provider {}", issuer_url).into())
    }

    async fn find_oidc_provider(&self, issuer_url: &str) -> Result<Option<String>, RemoteError> {
        let suffix = format!("oidc-provider/{}", strip_scheme(issuer_url));
        let out = self
            .iam
            .list_open_id_connect_providers()
            .send()
            .await
            .map_err(sdk_error)?;
        Ok(out
            .open_id_connect_provider_list()
            .iter()
            .filter_map(|p| p.arn())
            .find(|arn| arn.ends_with(&suffix))
            .map(str::to_string))
    }

    async fn delete_oidc_provider(&self, arn: &str) -> Result<(), RemoteError> {
        debug!("deleting OIDC provider {}", arn);
        self.iam
            .delete_open_id_connect_provider()
            .open_id_connect_provider_arn(arn)
            .send()
            .await
            .map_err(sdk_error)?;
        Ok(())
    }

    async fn publish_issuer(
        &self,
        bucket: &str,
        documents: &IssuerDocuments,
    ) -> Result<(), RemoteError> {
        let region = self
            .region
            .as_deref()
            .ok_or_else(|| anyhow!("AWS region is not set"))?;

        debug!("creating issuer bucket {} in {}", bucket, region);
        let mut create = self.s3.create_bucket().bucket(bucket);
        // us-east-1 rejects an explicit location constraint
        if region != "us-east-1" {
            create = create.create_bucket_configuration(
                CreateBucketConfiguration::builder()
                    .location_constraint(BucketLocationConstraint::from(region))
                    .build(),
            );
        }
        create.send().await.map_err(sdk_error)?;

        self.s3
            .put_public_access_block()
            .bucket(bucket)
            .public_access_block_configuration(
                PublicAccessBlockConfiguration::builder()
                    .block_public_acls(true)
                    .ignore_public_acls(true)
                    .block_public_policy(false)
                    .restrict_public_buckets(false)
                    .build(),
            )
            .send()
            .await
            .map_err(sdk_error)?;

        let policy = public_read_policy(bucket);
        self.s3
            .put_bucket_policy()
            .bucket(bucket)
            .policy(policy.to_string())
            .send()
            .await
            .map_err(sdk_error)?;

        for (key, body) in documents.objects()? {
            self.s3
                .put_object()
                .bucket(bucket)
                .key(key)
                .content_type("application/json")
                .body(ByteStream::from(body.into_bytes()))
                .send()
                .await
                .map_err(sdk_error)?;
        }
        Ok(())
    }

    async fn delete_issuer(&self, bucket: &str) -> Result<(), RemoteError> {
        debug!("deleting issuer bucket {}", bucket);
        for key in [DISCOVERY_DOCUMENT_KEY, JWKS_KEY] {
            self.s3
                .delete_object()
                .bucket(bucket)
                .key(key)
                .send()
                .await
                .map_err(sdk_error)?;
        }
        self.s3
            .delete_bucket()
            .bucket(bucket)
            .send()
            .await
            .map_err(sdk_error)?;
        Ok(())
    }

    async fn create_secret(&self, name: &str, value: &str) -> Result<String, RemoteError> {
        debug!("creating secret {}", name);
        let out = self
            .secrets
            .create_secret()
            .name(name)
            .description("Private key of an OIDC issuer")
            .secret_string(value)
            .send()
            .await
            .map_err(sdk_error)?;
        out.arn()
            .map(str::to_string)
            .ok_or_else(|| anyhow!("no ARN returned for secret {}", name).into())
    }

    async fn delete_secret(&self, arn: &str) -> Result<(), RemoteError> {
        debug!("deleting secret {}", arn);
        self.secrets
            .delete_secret()
            .secret_id(arn)
            .force_delete_without_recovery(true)
            .send()
            .await
            .map_err(sdk_error)?;
        Ok(())
    }
}

fn sdk_error<E: std::error::Error>(err: E) -> RemoteError {
    RemoteError::Cloud(anyhow!("{}", DisplayErrorContext(err)))
}
