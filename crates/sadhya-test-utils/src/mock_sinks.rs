// SPDX-FileCopyrightText: 2026 Sadhya Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock artifact store and order sink.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use sadhya_core::{
    AdapterType, ArtifactStore, HealthStatus, Order, OrderId, OrderSink, PluginAdapter,
    SadhyaError, VerificationStatus,
};

/// Records archival requests and hands back `mock-proof:` references.
#[derive(Default)]
pub struct MockArtifactStore {
    stored: Mutex<Vec<(OrderId, String)>>,
}

impl MockArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// `(order_id, media_id)` pairs in the order they were archived.
    pub async fn stored(&self) -> Vec<(OrderId, String)> {
        self.stored.lock().await.clone()
    }
}

#[async_trait]
impl PluginAdapter for MockArtifactStore {
    fn name(&self) -> &str {
        "mock-artifacts"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::ArtifactStore
    }

    async fn health_check(&self) -> Result<HealthStatus, SadhyaError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), SadhyaError> {
        Ok(())
    }
}

#[async_trait]
impl ArtifactStore for MockArtifactStore {
    async fn store_payment_proof(
        &self,
        order_id: &OrderId,
        media_id: &str,
    ) -> Result<String, SadhyaError> {
        self.stored
            .lock()
            .await
            .push((order_id.clone(), media_id.to_string()));
        Ok(format!("mock-proof:{order_id}"))
    }
}

/// An in-memory "spreadsheet": one row per order id, replaced on every write.
#[derive(Default)]
pub struct MockOrderSink {
    rows: Mutex<BTreeMap<String, Order>>,
    writes: Mutex<u32>,
}

impl MockOrderSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn row(&self, order_id: &OrderId) -> Option<Order> {
        self.rows.lock().await.get(order_id.as_str()).cloned()
    }

    pub async fn rows(&self) -> Vec<Order> {
        self.rows.lock().await.values().cloned().collect()
    }

    /// Total number of upserts, including overwrites.
    pub async fn writes(&self) -> u32 {
        *self.writes.lock().await
    }

    pub async fn status_of(&self, order_id: &OrderId) -> Option<VerificationStatus> {
        self.row(order_id).await.map(|o| o.verification_status)
    }
}

#[async_trait]
impl PluginAdapter for MockOrderSink {
    fn name(&self) -> &str {
        "mock-sink"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::OrderSink
    }

    async fn health_check(&self) -> Result<HealthStatus, SadhyaError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), SadhyaError> {
        Ok(())
    }
}

#[async_trait]
impl OrderSink for MockOrderSink {
    async fn record_order(&self, order: &Order) -> Result<(), SadhyaError> {
        self.rows
            .lock()
            .await
            .insert(order.order_id.0.clone(), order.clone());
        *self.writes.lock().await += 1;
        Ok(())
    }
}
