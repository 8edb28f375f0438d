use async_trait::async_trait;
use serde::Deserialize;

use crate::config::BackendConfig;
use crate::error::{BackendError, Result};

#[derive(Debug, Clone)]
pub struct StoredObject {
    pub path: String,
}

/// Uploaded objects live in named buckets and are addressed by a public
/// URL afterwards; the URL is plain string construction, no round-trip.
#[async_trait]
pub trait MediaStore: Send + Sync {
    async fn upload(
        &self,
        bucket: &str,
        filename: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<StoredObject>;

    fn public_url(&self, bucket: &str, path: &str) -> String;
}

pub struct HttpMedia {
    http: reqwest::Client,
    config: BackendConfig,
}

#[derive(Deserialize)]
struct UploadResponse {
    #[serde(default)]
    path: Option<String>,
}

impl HttpMedia {
    pub fn new(config: BackendConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }
}

#[async_trait]
impl MediaStore for HttpMedia {
    async fn upload(
        &self,
        bucket: &str,
        filename: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<StoredObject> {
        let url = format!("{}/object/{}/{}", self.config.storage_url, bucket, filename);
        let response = self
            .http
            .post(url)
            .bearer_auth(&self.config.api_key)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(BackendError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let path = serde_json::from_str::<UploadResponse>(&body)
            .ok()
            .and_then(|r| r.path)
            .unwrap_or_else(|| filename.to_string());
        Ok(StoredObject { path })
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        format!("{}/object/public/{}/{}", self.config.storage_url, bucket, path)
    }
}
