//! Signed image uploads to Cloudinary.

use std::time::Duration;

use chrono::Utc;
use reqwest::Client;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::info;
use ts_rs::TS;
use utils::config::CloudinaryConfig;

pub const DEFAULT_FOLDER: &str = "giftgenie";

#[derive(Debug, Error)]
pub enum CloudinaryError {
    #[error("source must be an http(s) URL or an image data URI")]
    InvalidSource,
    #[error("folder may only contain letters, digits, '-', '_' and '/'")]
    InvalidFolder,
    #[error("network error: {0}")]
    Transport(String),
    #[error("upload rejected: http {status}: {body}")]
    Rejected { status: u16, body: String },
    #[error("json error: {0}")]
    Serde(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct UploadImageRequest {
    pub source: String,
    pub folder: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct UploadedImage {
    pub url: String,
    pub public_id: String,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    secure_url: String,
    public_id: String,
}

/// SHA-256 request signature over the alphabetically sorted parameters.
pub fn sign(params: &[(&str, &str)], api_secret: &str) -> String {
    let mut sorted = params.to_vec();
    sorted.sort_by_key(|(key, _)| *key);
    let to_sign = sorted
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join("&");
    hex::encode(Sha256::digest(format!("{to_sign}{api_secret}").as_bytes()))
}

fn validate_source(source: &str) -> Result<&str, CloudinaryError> {
    let source = source.trim();
    if source.starts_with("https://") || source.starts_with("http://") || source.starts_with("data:image/") {
        Ok(source)
    } else {
        Err(CloudinaryError::InvalidSource)
    }
}

fn validate_folder(folder: Option<&str>) -> Result<String, CloudinaryError> {
    let folder = folder.map(str::trim).filter(|f| !f.is_empty()).unwrap_or(DEFAULT_FOLDER);
    if folder
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '/'))
    {
        Ok(folder.to_string())
    } else {
        Err(CloudinaryError::InvalidFolder)
    }
}

#[derive(Clone)]
pub struct CloudinaryService {
    http: Client,
    config: CloudinaryConfig,
}

impl CloudinaryService {
    pub fn new(config: CloudinaryConfig) -> Result<Self, CloudinaryError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| CloudinaryError::Transport(e.to_string()))?;
        Ok(Self { http, config })
    }

    pub async fn upload(&self, request: &UploadImageRequest) -> Result<UploadedImage, CloudinaryError> {
        let source = validate_source(&request.source)?;
        let folder = validate_folder(request.folder.as_deref())?;
        let timestamp = Utc::now().timestamp().to_string();
        let signature = sign(
            &[("folder", folder.as_str()), ("timestamp", timestamp.as_str())],
            self.config.api_secret.expose_secret(),
        );

        let url = format!(
            "https://api.cloudinary.com/v1_1/{}/image/upload",
            self.config.cloud_name
        );
        let res = self
            .http
            .post(url)
            .form(&[
                ("file", source),
                ("api_key", self.config.api_key.as_str()),
                ("folder", folder.as_str()),
                ("timestamp", timestamp.as_str()),
                ("signature", signature.as_str()),
                ("signature_algorithm", "sha256"),
            ])
            .send()
            .await
            .map_err(|e| CloudinaryError::Transport(e.to_string()))?;

        if !res.status().is_success() {
            let status = res.status().as_u16();
            let body = res.text().await.unwrap_or_default();
            return Err(CloudinaryError::Rejected { status, body });
        }
        let body: UploadResponse = res
            .json()
            .await
            .map_err(|e| CloudinaryError::Serde(e.to_string()))?;
        info!(public_id = %body.public_id, "Image uploaded to Cloudinary");
        Ok(UploadedImage {
            url: body.secure_url,
            public_id: body.public_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_sorts_parameters() {
        let expected = hex::encode(Sha256::digest(b"folder=gifts&timestamp=1700000000secret"));
        assert_eq!(sign(&[("timestamp", "1700000000"), ("folder", "gifts")], "secret"), expected);
        assert_eq!(expected.len(), 64);
    }

    #[test]
    fn source_must_be_url_or_image_data() {
        assert!(validate_source("https://cdn.example.com/a.jpg").is_ok());
        assert!(validate_source("data:image/png;base64,iVBORw0KGgo=").is_ok());
        assert!(validate_source("file:///etc/passwd").is_err());
        assert!(validate_source("data:text/html,<b>").is_err());
    }

    #[test]
    fn folder_defaults_and_is_restricted() {
        assert_eq!(validate_folder(None).unwrap(), DEFAULT_FOLDER);
        assert_eq!(validate_folder(Some("giftgenie/friends")).unwrap(), "giftgenie/friends");
        assert!(validate_folder(Some("../etc")).is_err());
    }
}
