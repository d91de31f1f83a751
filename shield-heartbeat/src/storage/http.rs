//! HTTP PUT store for S3-compatible endpoints

use super::ObjectStore;
use async_trait::async_trait;
use shield_common::{Error, Result};
use std::time::Duration;
use tracing::debug;

const USER_AGENT: &str = concat!("shield-heartbeat/", env!("CARGO_PKG_VERSION"));

/// Uploads objects with `PUT {endpoint}/{bucket}/{key}`
pub struct HttpObjectStore {
    http_client: reqwest::Client,
    endpoint: String,
    bucket: String,
    auth_token: Option<String>,
}

impl HttpObjectStore {
    pub fn new(
        endpoint: impl Into<String>,
        bucket: impl Into<String>,
        auth_token: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            bucket: bucket.into(),
            auth_token,
        })
    }

    pub fn object_url(&self, key: &str) -> String {
        format!("{}/{}/{}", self.endpoint, self.bucket, key)
    }
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    async fn put(&self, key: &str, body: Vec<u8>, content_type: &str) -> Result<()> {
        let url = self.object_url(key);
        let bytes = body.len();

        let mut request = self
            .http_client
            .put(&url)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(body);
        if let Some(token) = &self.auth_token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::Internal(format!("PUT {} failed: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(Error::Internal(format!(
                "PUT {} returned HTTP {}: {}",
                url,
                status.as_u16(),
                error_text.trim()
            )));
        }

        debug!(url = %url, bytes, content_type, "Uploaded artifact");
        Ok(())
    }

    fn describe(&self) -> String {
        format!("http:{}/{}", self.endpoint, self.bucket)
    }
}
