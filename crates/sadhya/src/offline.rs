// SPDX-FileCopyrightText: 2026 Sadhya Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Stand-in collaborators used when WhatsApp credentials are not configured.
//!
//! The server still accepts webhooks and runs the flow, but outbound
//! messages only go to the log and payment proofs keep their media id.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tracing::info;

use sadhya_core::{
    AdapterType, ArtifactStore, ChannelAdapter, HealthStatus, MessageId, OrderId, OutboundIntent,
    PluginAdapter, SadhyaError, redact_phone,
};

/// Writes every outbound message to the log instead of sending it.
#[derive(Debug, Default)]
pub struct LogDispatcher {
    sent: AtomicU64,
}

impl LogDispatcher {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PluginAdapter for LogDispatcher {
    fn name(&self) -> &str {
        "log-dispatcher"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Channel
    }

    async fn health_check(&self) -> Result<HealthStatus, SadhyaError> {
        Ok(HealthStatus::Degraded(
            "whatsapp credentials missing, messages are only logged".into(),
        ))
    }

    async fn shutdown(&self) -> Result<(), SadhyaError> {
        Ok(())
    }
}

#[async_trait]
impl ChannelAdapter for LogDispatcher {
    async fn send(&self, intent: &OutboundIntent) -> Result<MessageId, SadhyaError> {
        let n = self.sent.fetch_add(1, Ordering::Relaxed) + 1;
        info!(
            to = %redact_phone(intent.recipient()),
            body = intent.body(),
            "outbound message (not sent)"
        );
        Ok(MessageId(format!("offline-{n}")))
    }
}

/// Keeps the WhatsApp media id as the payment proof reference.
#[derive(Debug, Default)]
pub struct MediaReference;

#[async_trait]
impl PluginAdapter for MediaReference {
    fn name(&self) -> &str {
        "media-reference"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::ArtifactStore
    }

    async fn health_check(&self) -> Result<HealthStatus, SadhyaError> {
        Ok(HealthStatus::Degraded("payment proofs are not archived".into()))
    }

    async fn shutdown(&self) -> Result<(), SadhyaError> {
        Ok(())
    }
}

#[async_trait]
impl ArtifactStore for MediaReference {
    async fn store_payment_proof(
        &self,
        order_id: &OrderId,
        media_id: &str,
    ) -> Result<String, SadhyaError> {
        info!(order_id = %order_id, media_id, "payment proof left with the provider");
        Ok(format!("whatsapp-media:{media_id}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn log_dispatcher_numbers_its_messages() {
        let dispatcher = LogDispatcher::new();
        let first = dispatcher
            .send(&OutboundIntent::text("919812345678", "hello"))
            .await
            .unwrap();
        let second = dispatcher
            .send(&OutboundIntent::text("919812345678", "again"))
            .await
            .unwrap();
        assert_eq!(first, MessageId("offline-1".into()));
        assert_eq!(second, MessageId("offline-2".into()));
    }

    #[tokio::test]
    async fn media_reference_keeps_the_media_id() {
        let store = MediaReference;
        let reference = store
            .store_payment_proof(&OrderId("EO260824AAAAAA".into()), "media-42")
            .await
            .unwrap();
        assert_eq!(reference, "whatsapp-media:media-42");
    }

    #[tokio::test]
    async fn stand_ins_report_degraded() {
        assert!(matches!(
            LogDispatcher::new().health_check().await.unwrap(),
            HealthStatus::Degraded(_)
        ));
        assert!(matches!(
            MediaReference.health_check().await.unwrap(),
            HealthStatus::Degraded(_)
        ));
    }
}
