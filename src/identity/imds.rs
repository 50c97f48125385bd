//! EC2 Instance Metadata Service (IMDS) identity resolver
//!
//! Reads the instance identity document and extracts `instanceId`.
//! Supports both IMDSv1 and IMDSv2 (preferred for security).

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::{IdentityResolver, InstanceIdentity};
use crate::PrepError;
use crate::config::IdentityConfig;

/// EC2 metadata service base URL (link-local address)
pub const IMDS_BASE_URL: &str = "http://169.254.169.254";

/// IMDSv2 token TTL in seconds
pub const TOKEN_TTL_SECONDS: u32 = 300;

const DOCUMENT_PATH: &str = "latest/dynamic/instance-identity/document";

/// The one field of the instance identity document we read
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IdentityDocument {
    instance_id: Option<String>,
}

/// IMDS-backed identity resolver
pub struct Imds {
    client: Client,
    base_url: String,
    token_ttl: u32,
}

impl Imds {
    /// Resolver against the default link-local endpoint
    pub fn new() -> Result<Self, PrepError> {
        Self::with_base_url(IMDS_BASE_URL)
    }

    /// Resolver against a custom endpoint (useful for testing)
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self, PrepError> {
        Self::build(
            base_url.into(),
            Duration::from_secs(5),
            Duration::from_secs(2),
            TOKEN_TTL_SECONDS,
        )
    }

    pub fn from_config(config: &IdentityConfig) -> Result<Self, PrepError> {
        Self::build(
            config.imds_url.clone(),
            Duration::from_secs(config.timeout_secs),
            Duration::from_secs(config.connect_timeout_secs),
            config.token_ttl_secs,
        )
    }

    fn build(
        base_url: String,
        timeout: Duration,
        connect_timeout: Duration,
        token_ttl: u32,
    ) -> Result<Self, PrepError> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(connect_timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token_ttl,
        })
    }

    /// Get IMDSv2 token for authenticated requests
    async fn get_imdsv2_token(&self) -> Option<String> {
        let url = format!("{}/latest/api/token", self.base_url);
        let response = self
            .client
            .put(&url)
            .header("X-aws-ec2-metadata-token-ttl-seconds", self.token_ttl.to_string())
            .send()
            .await
            .ok()?;

        if response.status().is_success() {
            response.text().await.ok()
        } else {
            None
        }
    }

    /// Fetch the raw identity document, trying IMDSv2 first then IMDSv1
    async fn fetch_document(&self) -> Result<String, PrepError> {
        let url = format!("{}/{}", self.base_url, DOCUMENT_PATH);

        let request = match self.get_imdsv2_token().await {
            Some(token) => {
                debug!("Using IMDSv2 for identity document");
                self.client
                    .get(&url)
                    .header("X-aws-ec2-metadata-token", token)
            }
            None => {
                debug!("Falling back to IMDSv1 for identity document");
                self.client.get(&url)
            }
        };

        let response = request
            .send()
            .await
            .map_err(|e| PrepError::identity(format!("request to {url} failed: {e}")))?;

        if !response.status().is_success() {
            return Err(PrepError::identity(format!(
                "{} returned {}",
                url,
                response.status()
            )));
        }

        response
            .text()
            .await
            .map_err(|e| PrepError::identity(format!("reading {url} failed: {e}")))
    }

    /// Extract the instance id from a raw identity document
    pub fn parse_document(body: &str) -> Result<InstanceIdentity, PrepError> {
        let document: IdentityDocument = serde_json::from_str(body)
            .map_err(|e| PrepError::identity(format!("malformed identity document: {e}")))?;

        let id = document
            .instance_id
            .ok_or_else(|| PrepError::identity("identity document has no instanceId"))?;

        InstanceIdentity::new(id)
    }
}

#[async_trait]
impl IdentityResolver for Imds {
    fn name(&self) -> &'static str {
        "IMDS"
    }

    async fn resolve(&self) -> Result<InstanceIdentity, PrepError> {
        debug!("Fetching instance identity document from {}", self.base_url);
        let body = self.fetch_document().await?;
        Self::parse_document(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_document() {
        let body = r#"{
            "accountId": "123456789012",
            "architecture": "x86_64",
            "availabilityZone": "us-east-1a",
            "imageId": "ami-0abcdef1234567890",
            "instanceId": "i-1234567890abcdef0",
            "instanceType": "t3.micro",
            "region": "us-east-1"
        }"#;

        let id = Imds::parse_document(body).unwrap();
        assert_eq!(id.as_str(), "i-1234567890abcdef0");
    }

    #[test]
    fn test_parse_document_missing_instance_id() {
        let err = Imds::parse_document(r#"{"region": "us-east-1"}"#).unwrap_err();
        assert!(err.to_string().contains("no instanceId"));
    }

    #[test]
    fn test_parse_document_ignores_other_fields() {
        // Only instanceId is read, so odd shapes elsewhere are not an error
        let body = r#"{"instanceId": "i-0abc", "region": null, "availabilityZone": 7}"#;
        let id = Imds::parse_document(body).unwrap();
        assert_eq!(id.as_str(), "i-0abc");
    }

    #[test]
    fn test_parse_document_not_json() {
        let err = Imds::parse_document("<html>proxy error</html>").unwrap_err();
        assert!(matches!(err, PrepError::IdentityUnavailable(_)));
    }

    #[test]
    fn test_trailing_slash_is_trimmed() {
        let imds = Imds::with_base_url("http://127.0.0.1:1234/").unwrap();
        assert_eq!(imds.base_url, "http://127.0.0.1:1234");
    }
}
