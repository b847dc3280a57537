// SPDX-FileCopyrightText: 2026 Sadhya Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Payment proof archival.
//!
//! Downloads WhatsApp media into the artifact directory so a proof survives
//! the provider's media retention window.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info};

use sadhya_config::model::{ArtifactsConfig, WhatsAppConfig};
use sadhya_core::{AdapterType, ArtifactStore, HealthStatus, OrderId, PluginAdapter, SadhyaError};

use crate::dispatcher::{graph_client, status_error, transport_error};

/// [`ArtifactStore`] that copies WhatsApp media to local disk.
#[derive(Debug, Clone)]
pub struct MediaArchive {
    client: reqwest::Client,
    graph_url: String,
    directory: PathBuf,
}

#[derive(Debug, Deserialize)]
struct MediaInfo {
    url: String,
    #[serde(default)]
    mime_type: Option<String>,
}

impl MediaArchive {
    pub fn new(whatsapp: &WhatsAppConfig, artifacts: &ArtifactsConfig) -> Result<Self, SadhyaError> {
        let token = whatsapp
            .access_token
            .as_deref()
            .ok_or_else(|| SadhyaError::Config("whatsapp.access_token is not set".into()))?;
        Ok(Self {
            client: graph_client(token)?,
            graph_url: format!(
                "{}/{}",
                whatsapp.api_base_url.trim_end_matches('/'),
                whatsapp.api_version
            ),
            directory: PathBuf::from(&artifacts.directory),
        })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    async fn media_info(&self, media_id: &str) -> Result<MediaInfo, SadhyaError> {
        let response = self
            .client
            .get(format!("{}/{media_id}", self.graph_url))
            .send()
            .await
            .map_err(transport_error)?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, &body));
        }
        response.json().await.map_err(|e| SadhyaError::Channel {
            message: format!("failed to parse media info: {e}"),
            source: Some(Box::new(e)),
        })
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, SadhyaError> {
        let response = self.client.get(url).send().await.map_err(transport_error)?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, &body));
        }
        let bytes = response.bytes().await.map_err(|e| SadhyaError::Channel {
            message: format!("failed to download media: {e}"),
            source: Some(Box::new(e)),
        })?;
        Ok(bytes.to_vec())
    }
}

fn extension_for(mime_type: Option<&str>) -> &'static str {
    match mime_type.map(|m| m.split(';').next().unwrap_or(m).trim()) {
        Some("image/jpeg") | Some("image/jpg") => "jpg",
        Some("image/png") => "png",
        Some("image/webp") => "webp",
        Some("application/pdf") => "pdf",
        _ => "bin",
    }
}

fn io_error(context: &str, path: &Path, e: std::io::Error) -> SadhyaError {
    SadhyaError::Sync {
        message: format!("{context} {}: {e}", path.display()),
        source: Some(Box::new(e)),
    }
}

#[async_trait]
impl PluginAdapter for MediaArchive {
    fn name(&self) -> &str {
        "whatsapp-media-archive"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::ArtifactStore
    }

    async fn health_check(&self) -> Result<HealthStatus, SadhyaError> {
        match tokio::fs::metadata(&self.directory).await {
            Ok(meta) if meta.is_dir() => Ok(HealthStatus::Healthy),
            Ok(_) => Ok(HealthStatus::Unhealthy(format!(
                "{} is not a directory",
                self.directory.display()
            ))),
            // Created lazily on the first archived proof.
            Err(_) => Ok(HealthStatus::Degraded(format!(
                "{} does not exist yet",
                self.directory.display()
            ))),
        }
    }

    async fn shutdown(&self) -> Result<(), SadhyaError> {
        Ok(())
    }
}

#[async_trait]
impl ArtifactStore for MediaArchive {
    async fn store_payment_proof(
        &self,
        order_id: &OrderId,
        media_id: &str,
    ) -> Result<String, SadhyaError> {
        let info = self.media_info(media_id).await?;
        let bytes = self.download(&info.url).await?;

        tokio::fs::create_dir_all(&self.directory)
            .await
            .map_err(|e| io_error("failed to create", &self.directory, e))?;

        let ext = extension_for(info.mime_type.as_deref());
        let path = self.directory.join(format!("{order_id}.{ext}"));
        let partial = self.directory.join(format!("{order_id}.{ext}.part"));

        // Write then rename so a crash never leaves a truncated proof behind.
        tokio::fs::write(&partial, &bytes)
            .await
            .map_err(|e| io_error("failed to write", &partial, e))?;
        tokio::fs::rename(&partial, &path)
            .await
            .map_err(|e| io_error("failed to move proof into", &path, e))?;

        debug!(order_id = %order_id, media_id, size = bytes.len(), "payment proof downloaded");
        info!(order_id = %order_id, path = %path.display(), "payment proof archived");
        Ok(format!("file:{}", path.display()))
    }
}
