// SPDX-FileCopyrightText: 2026 Sadhya Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end integration testing.
//!
//! `TestHarness` assembles the flow engine, verification service, outbox
//! worker and reaper over a temp SQLite database (or `MemoryStorage`) with
//! mock collaborators, a fixed clock and sequential ids. Tests drive it by
//! sending chat events and then calling [`TestHarness::deliver`] to run the
//! outbox.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};

use sadhya_config::model::{SadhyaConfig, StorageConfig};
use sadhya_core::{
    InboundEvent, InboundPayload, MessageId, Order, OrderId, OutboundIntent, SadhyaError, Session,
    StorageAdapter, TokenAction, VerificationToken,
};
use sadhya_flow::{
    EventOutcome, FlowEngine, FlowSettings, JobReport, KeyedLocks, OutboxSettings, OutboxWorker,
    ReaperSettings, SessionReaper, SnapshotCatalog, VerificationOutcome, VerificationService,
};
use sadhya_storage::{MemoryStorage, SqliteStorage};

use crate::clock::{FixedClock, SequentialIds};
use crate::mock_channel::MockDispatcher;
use crate::mock_sinks::{MockArtifactStore, MockOrderSink};

/// Admin phone configured by default.
pub const ADMIN_PHONE: &str = "919900000001";

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    config: SadhyaConfig,
    in_memory: bool,
    start: DateTime<Utc>,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        let mut config = SadhyaConfig::default();
        config.server.base_url = "https://sadhya.test".to_string();
        config.admin.notify_phones = vec![ADMIN_PHONE.to_string()];
        config.payment.upi_id = Some("eeonam@okaxis".to_string());
        Self {
            config,
            in_memory: false,
            start: FixedClock::default_start(),
        }
    }

    /// Replace the whole configuration.
    pub fn with_config(mut self, config: SadhyaConfig) -> Self {
        self.config = config;
        self
    }

    /// Adjust the default configuration in place.
    pub fn configure(mut self, f: impl FnOnce(&mut SadhyaConfig)) -> Self {
        f(&mut self.config);
        self
    }

    /// Use `MemoryStorage` instead of a temp SQLite file.
    pub fn in_memory(mut self) -> Self {
        self.in_memory = true;
        self
    }

    /// Initial reading of the fixed clock.
    pub fn starting_at(mut self, start: DateTime<Utc>) -> Self {
        self.start = start;
        self
    }

    /// Build the test harness, creating all required subsystems.
    pub async fn build(self) -> Result<TestHarness, SadhyaError> {
        let (storage, temp_dir): (Arc<dyn StorageAdapter>, _) = if self.in_memory {
            (Arc::new(MemoryStorage::new()), None)
        } else {
            let temp_dir =
                tempfile::TempDir::new().map_err(|e| SadhyaError::Storage { source: e.into() })?;
            let db_path = temp_dir.path().join("test.db");
            let storage = SqliteStorage::new(StorageConfig {
                database_path: db_path.to_string_lossy().to_string(),
                wal_mode: true,
            });
            storage.initialize().await?;
            (Arc::new(storage), Some(temp_dir))
        };

        let clock = Arc::new(FixedClock::new(self.start));
        let dispatcher = Arc::new(MockDispatcher::new());
        let artifacts = Arc::new(MockArtifactStore::new());
        let sink = Arc::new(MockOrderSink::new());
        let catalog = Arc::new(SnapshotCatalog::from_config(&self.config.catalog));
        let locks = Arc::new(KeyedLocks::new());
        let settings = FlowSettings::from_config(&self.config);

        let engine = FlowEngine::new(storage.clone(), catalog.clone(), settings.clone())
            .with_clock(clock.clone())
            .with_ids(Arc::new(SequentialIds::new()))
            .with_locks(locks.clone());
        let verification =
            VerificationService::new(storage.clone(), locks.clone(), settings.clone())
                .with_clock(clock.clone());
        let outbox = OutboxWorker::new(
            storage.clone(),
            dispatcher.clone(),
            artifacts.clone(),
            sink.clone(),
            OutboxSettings::from_config(&self.config.outbox),
        )
        .with_clock(clock.clone());
        let reaper = SessionReaper::new(
            storage.clone(),
            locks.clone(),
            ReaperSettings::from_config(&self.config.bot),
        )
        .with_clock(clock.clone());

        Ok(TestHarness {
            storage,
            dispatcher,
            artifacts,
            sink,
            clock,
            catalog,
            locks,
            engine: Arc::new(engine),
            verification: Arc::new(verification),
            outbox: Arc::new(outbox),
            reaper: Arc::new(reaper),
            settings,
            config: self.config,
            next_message: AtomicU64::new(0),
            _temp_dir: temp_dir,
        })
    }
}

/// A complete test environment with mock collaborators and temp storage.
pub struct TestHarness {
    pub storage: Arc<dyn StorageAdapter>,
    pub dispatcher: Arc<MockDispatcher>,
    pub artifacts: Arc<MockArtifactStore>,
    pub sink: Arc<MockOrderSink>,
    pub clock: Arc<FixedClock>,
    pub catalog: Arc<SnapshotCatalog>,
    pub locks: Arc<KeyedLocks>,
    pub engine: Arc<FlowEngine>,
    pub verification: Arc<VerificationService>,
    pub outbox: Arc<OutboxWorker>,
    pub reaper: Arc<SessionReaper>,
    pub settings: FlowSettings,
    pub config: SadhyaConfig,
    next_message: AtomicU64,
    /// Temp directory kept alive for cleanup on drop.
    _temp_dir: Option<tempfile::TempDir>,
}

impl TestHarness {
    /// Create a new builder for configuring the test harness.
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// Next unused provider message id.
    pub fn fresh_message_id(&self) -> MessageId {
        let n = self.next_message.fetch_add(1, Ordering::SeqCst) + 1;
        MessageId(format!("wamid.test-{n}"))
    }

    /// Deliver one event under an explicit message id (for redelivery tests).
    pub async fn send_with_id(
        &self,
        phone: &str,
        message_id: MessageId,
        payload: InboundPayload,
    ) -> Result<EventOutcome, SadhyaError> {
        self.engine
            .handle_event(InboundEvent {
                message_id,
                phone: phone.to_string(),
                profile_name: None,
                received_at: sadhya_core::Clock::now(self.clock.as_ref()),
                payload,
            })
            .await
    }

    pub async fn send(
        &self,
        phone: &str,
        payload: InboundPayload,
    ) -> Result<EventOutcome, SadhyaError> {
        let id = self.fresh_message_id();
        self.send_with_id(phone, id, payload).await
    }

    pub async fn send_text(&self, phone: &str, body: &str) -> Result<EventOutcome, SadhyaError> {
        self.send(
            phone,
            InboundPayload::Text {
                body: body.to_string(),
            },
        )
        .await
    }

    pub async fn send_selection(
        &self,
        phone: &str,
        id: &str,
        title: &str,
    ) -> Result<EventOutcome, SadhyaError> {
        self.send(
            phone,
            InboundPayload::Selection {
                id: id.to_string(),
                title: title.to_string(),
            },
        )
        .await
    }

    pub async fn send_image(
        &self,
        phone: &str,
        media_id: &str,
    ) -> Result<EventOutcome, SadhyaError> {
        self.send(
            phone,
            InboundPayload::Image {
                media_id: media_id.to_string(),
                mime_type: Some("image/jpeg".to_string()),
                caption: None,
            },
        )
        .await
    }

    pub async fn send_location(
        &self,
        phone: &str,
        latitude: f64,
        longitude: f64,
    ) -> Result<EventOutcome, SadhyaError> {
        self.send(
            phone,
            InboundPayload::Location {
                latitude,
                longitude,
                name: None,
                address: None,
            },
        )
        .await
    }

    /// Walks a pickup order from greeting to screenshot. Returns the order id.
    pub async fn place_pickup_order(&self, phone: &str) -> Result<OrderId, SadhyaError> {
        self.send_text(phone, "hi").await?;
        self.send_selection(phone, "date_2026-08-24", "Mon, 24 Aug").await?;
        self.send_selection(phone, "pickup", "Pickup").await?;
        self.send_text(phone, "1 x 2, 3 x 1").await?;
        self.send_image(phone, "media-proof-1").await?;
        self.session(phone)
            .await?
            .and_then(|s| s.order_id)
            .ok_or_else(|| SadhyaError::Internal("flow did not produce an order".into()))
    }

    /// Runs every outbox job that is due now.
    pub async fn deliver(&self) -> Result<Vec<JobReport>, SadhyaError> {
        self.outbox.drain().await
    }

    pub async fn session(&self, phone: &str) -> Result<Option<Session>, SadhyaError> {
        self.storage.get_session(phone).await
    }

    pub async fn order(&self, order_id: &OrderId) -> Result<Option<Order>, SadhyaError> {
        self.storage.get_order(order_id).await
    }

    /// Messages delivered to `phone` so far.
    pub async fn replies_to(&self, phone: &str) -> Vec<OutboundIntent> {
        self.dispatcher.sent_to(phone).await
    }

    /// The token of `order_id` carrying `action`.
    pub async fn token(
        &self,
        order_id: &OrderId,
        action: TokenAction,
    ) -> Result<VerificationToken, SadhyaError> {
        self.storage
            .tokens_for_order(order_id)
            .await?
            .into_iter()
            .find(|t| t.action == action)
            .ok_or_else(|| SadhyaError::NotFound {
                kind: "verification token".into(),
                id: order_id.to_string(),
            })
    }

    /// Follows the admin link for `action` on `order_id`.
    pub async fn decide(
        &self,
        order_id: &OrderId,
        action: TokenAction,
    ) -> Result<VerificationOutcome, SadhyaError> {
        let token = self.token(order_id, action).await?;
        self.verification.resolve(&token.token, action).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sadhya_core::{Stage, VerificationStatus};

    const CUSTOMER: &str = "919812345678";

    #[tokio::test]
    async fn builder_creates_working_environment() {
        let harness = TestHarness::builder().build().await.unwrap();
        assert!(harness.session(CUSTOMER).await.unwrap().is_none());
        assert!(harness.deliver().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn pickup_order_reaches_verification() {
        let harness = TestHarness::builder().build().await.unwrap();
        let order_id = harness.place_pickup_order(CUSTOMER).await.unwrap();
        assert_eq!(order_id.as_str(), "EO260820TEST01");

        let session = harness.session(CUSTOMER).await.unwrap().unwrap();
        assert_eq!(session.stage, Stage::AwaitingVerification);

        let order = harness.order(&order_id).await.unwrap().unwrap();
        assert_eq!(order.total, 340);
        assert_eq!(order.verification_status, VerificationStatus::Pending);
    }

    #[tokio::test]
    async fn in_memory_harness_behaves_the_same() {
        let harness = TestHarness::builder().in_memory().build().await.unwrap();
        let order_id = harness.place_pickup_order(CUSTOMER).await.unwrap();
        harness.deliver().await.unwrap();
        assert_eq!(
            harness.sink.status_of(&order_id).await,
            Some(VerificationStatus::Pending)
        );
    }

    #[tokio::test]
    async fn temp_db_is_unique_per_harness() {
        let h1 = TestHarness::builder().build().await.unwrap();
        let h2 = TestHarness::builder().build().await.unwrap();

        h1.send_text(CUSTOMER, "hi").await.unwrap();
        assert!(h1.session(CUSTOMER).await.unwrap().is_some());
        assert!(h2.session(CUSTOMER).await.unwrap().is_none());
    }
}
