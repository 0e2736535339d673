//! Media upload to external object storage.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::CloudinaryConfig;

#[derive(Debug, Clone)]
pub struct UploadedMedia {
    pub url: String,
    pub id: String,
}

#[async_trait]
pub trait MediaStore: Send + Sync {
    async fn upload(&self, file_name: &str, bytes: Vec<u8>) -> Result<UploadedMedia>;
}

pub struct DisabledMedia;

#[async_trait]
impl MediaStore for DisabledMedia {
    async fn upload(&self, _file_name: &str, _bytes: Vec<u8>) -> Result<UploadedMedia> {
        bail!("media storage is not configured")
    }
}

/// Signed uploads to Cloudinary's video endpoint.
pub struct CloudinaryStore {
    http: reqwest::Client,
    config: CloudinaryConfig,
    folder: String,
}

impl CloudinaryStore {
    pub fn new(config: CloudinaryConfig, folder: String, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(timeout)
            .timeout(timeout)
            .build()?;
        Ok(Self {
            http,
            config,
            folder,
        })
    }
}

/// Cloudinary request signature: sorted `k=v` pairs joined with `&`, the API
/// secret appended, SHA-256, lowercase hex.
pub fn sign_params(params: &[(&str, &str)], api_secret: &str) -> String {
    let mut sorted: Vec<_> = params.to_vec();
    sorted.sort_by(|a, b| a.0.cmp(b.0));
    let joined = sorted
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&");
    let digest = Sha256::digest(format!("{}{}", joined, api_secret).as_bytes());
    hex::encode(digest)
}

#[async_trait]
impl MediaStore for CloudinaryStore {
    async fn upload(&self, file_name: &str, bytes: Vec<u8>) -> Result<UploadedMedia> {
        #[derive(Deserialize)]
        struct UploadResponse {
            secure_url: String,
            public_id: String,
        }

        let public_id = Uuid::new_v4().to_string();
        let timestamp = chrono::Utc::now().timestamp().to_string();
        let signature = sign_params(
            &[
                ("folder", self.folder.as_str()),
                ("public_id", public_id.as_str()),
                ("timestamp", timestamp.as_str()),
            ],
            &self.config.api_secret,
        );

        let part = reqwest::multipart::Part::bytes(bytes).file_name(file_name.to_string());
        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("api_key", self.config.api_key.clone())
            .text("folder", self.folder.clone())
            .text("public_id", public_id)
            .text("timestamp", timestamp)
            .text("signature_algorithm", "sha256")
            .text("signature", signature);

        let url = format!(
            "https://api.cloudinary.com/v1_1/{}/video/upload",
            self.config.cloud_name
        );
        let response = self.http.post(url).multipart(form).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("upload rejected ({}): {}", status, body));
        }

        let uploaded: UploadResponse = response.json().await?;
        info!("Uploaded media {}", uploaded.public_id);
        Ok(UploadedMedia {
            url: uploaded.secure_url,
            id: uploaded.public_id,
        })
    }
}

pub fn store_from_config(
    config: Option<&CloudinaryConfig>,
    folder: &str,
    timeout: Duration,
) -> Result<Arc<dyn MediaStore>> {
    match config {
        Some(c) => Ok(Arc::new(CloudinaryStore::new(
            c.clone(),
            folder.to_string(),
            timeout,
        )?)),
        None => {
            warn!("CLOUDINARY_* not set; media upload disabled");
            Ok(Arc::new(DisabledMedia))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_ignores_parameter_order() {
        let a = sign_params(&[("timestamp", "1700000000"), ("folder", "falls")], "s3cr3t");
        let b = sign_params(&[("folder", "falls"), ("timestamp", "1700000000")], "s3cr3t");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);

        let expected = hex::encode(Sha256::digest(b"folder=falls&timestamp=1700000000s3cr3t"));
        assert_eq!(a, expected);
    }
}
