//! Blob storage for proof-of-return and listing photos.
//!
//! `BlobStore` is the seam the rental services use; `PhotoStorage` is the
//! production implementation speaking the storage HTTP API.

use async_trait::async_trait;
use reqwest::{multipart, Client};
use std::path::Path;
use std::time::Duration;
use uuid::Uuid;

use crate::error::Error;

const CLIENT_INFO: &str = "rent-a-bike/0.2.0";

/// Uploads a photo and hands back its public URL
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn upload_photo(
        &self,
        bucket: &str,
        file_name: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> Result<String, Error>;
}

/// Storage-API photo store
pub struct PhotoStorage {
    base_url: String,
    key: String,
    http: Client,
    timeout: Option<Duration>,
}

impl PhotoStorage {
    pub fn new(base_url: &str, key: &str, http: Client, timeout: Option<Duration>) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            key: key.to_string(),
            http,
            timeout,
        }
    }

    fn object_url(&self, bucket: &str, path: &str) -> String {
        format!("{}/storage/v1/object/{}/{}", self.base_url, bucket, path)
    }

    /// Public URL for an already-uploaded object
    pub fn public_url(&self, bucket: &str, path: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{}",
            self.base_url, bucket, path
        )
    }

    /// Prefix uploads with a random component so retries never collide
    fn object_path(file_name: &str) -> String {
        let name = Path::new(file_name)
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "photo".to_string());
        format!("{}-{}", Uuid::new_v4(), name)
    }
}

#[async_trait]
impl BlobStore for PhotoStorage {
    async fn upload_photo(
        &self,
        bucket: &str,
        file_name: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> Result<String, Error> {
        let path = Self::object_path(file_name);
        let url = self.object_url(bucket, &path);

        let part = multipart::Part::bytes(data)
            .file_name(path.clone())
            .mime_str(content_type)
            .map_err(|e| Error::storage(format!("bad content type: {}", e)))?;
        let form = multipart::Form::new().part("file", part);

        let request = self
            .http
            .post(&url)
            .header("apikey", &self.key)
            .header("X-Client-Info", CLIENT_INFO)
            .header("Cache-Control", "3600")
            .header("x-upsert", "false")
            .multipart(form);

        let response = match self.timeout {
            Some(bound) => tokio::time::timeout(bound, request.send())
                .await
                .map_err(|_| Error::RemoteTimeout)??,
            None => request.send().await?,
        };

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await?;
            return Err(Error::storage(format!(
                "Upload failed with status {}: {}",
                status, text
            )));
        }

        Ok(self.public_url(bucket, &path))
    }
}
