// SPDX-FileCopyrightText: 2026 Sadhya Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock channel adapter for deterministic testing.
//!
//! `MockDispatcher` implements `ChannelAdapter`, capturing every outbound
//! intent for assertion in tests. It can be told to fail the next sends
//! with a transient error to exercise outbox retries.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use sadhya_core::{
    AdapterType, ChannelAdapter, HealthStatus, MessageId, OutboundIntent, PluginAdapter,
    SadhyaError,
};

/// A mock messaging channel for testing.
pub struct MockDispatcher {
    sent: Arc<Mutex<Vec<OutboundIntent>>>,
    failures: AtomicU32,
    counter: AtomicU64,
}

impl MockDispatcher {
    /// Create a new mock dispatcher with an empty capture buffer.
    pub fn new() -> Self {
        Self {
            sent: Arc::new(Mutex::new(Vec::new())),
            failures: AtomicU32::new(0),
            counter: AtomicU64::new(0),
        }
    }

    /// Make the next `count` sends fail with a transient channel error.
    pub fn fail_next(&self, count: u32) {
        self.failures.store(count, Ordering::SeqCst);
    }

    /// Get all intents that were sent through `send()`.
    pub async fn sent(&self) -> Vec<OutboundIntent> {
        self.sent.lock().await.clone()
    }

    /// Intents addressed to one phone, in send order.
    pub async fn sent_to(&self, phone: &str) -> Vec<OutboundIntent> {
        self.sent
            .lock()
            .await
            .iter()
            .filter(|i| i.recipient() == phone)
            .cloned()
            .collect()
    }

    /// Get the count of sent intents.
    pub async fn sent_count(&self) -> usize {
        self.sent.lock().await.len()
    }

    /// Clear all captured intents.
    pub async fn clear_sent(&self) {
        self.sent.lock().await.clear();
    }
}

impl Default for MockDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PluginAdapter for MockDispatcher {
    fn name(&self) -> &str {
        "mock-dispatcher"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Channel
    }

    async fn health_check(&self) -> Result<HealthStatus, SadhyaError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), SadhyaError> {
        Ok(())
    }
}

#[async_trait]
impl ChannelAdapter for MockDispatcher {
    async fn send(&self, intent: &OutboundIntent) -> Result<MessageId, SadhyaError> {
        if self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(SadhyaError::Channel {
                message: "mock dispatcher: injected failure".into(),
                source: None,
            });
        }
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        self.sent.lock().await.push(intent.clone());
        Ok(MessageId(format!("wamid.mock-{n}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_captures_intents() {
        let dispatcher = MockDispatcher::new();
        let id = dispatcher
            .send(&OutboundIntent::text("919800000001", "hello"))
            .await
            .unwrap();
        assert_eq!(id.0, "wamid.mock-1");

        dispatcher
            .send(&OutboundIntent::text("919800000002", "other"))
            .await
            .unwrap();
        assert_eq!(dispatcher.sent_count().await, 2);

        let to_first = dispatcher.sent_to("919800000001").await;
        assert_eq!(to_first.len(), 1);
        assert_eq!(to_first[0].body(), "hello");
    }

    #[tokio::test]
    async fn injected_failures_are_transient_and_counted() {
        let dispatcher = MockDispatcher::new();
        dispatcher.fail_next(2);
        let intent = OutboundIntent::text("919800000001", "retry me");

        for _ in 0..2 {
            let err = dispatcher.send(&intent).await.unwrap_err();
            assert!(err.is_transient());
        }
        assert!(dispatcher.send(&intent).await.is_ok());
        assert_eq!(dispatcher.sent_count().await, 1);
    }

    #[tokio::test]
    async fn sent_count_and_clear() {
        let dispatcher = MockDispatcher::new();
        dispatcher
            .send(&OutboundIntent::text("919800000001", "x"))
            .await
            .unwrap();
        dispatcher.clear_sent().await;
        assert_eq!(dispatcher.sent_count().await, 0);
    }
}
