// SPDX-FileCopyrightText: 2026 Sadhya Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Outbox worker.
//!
//! Delivers the side effects recorded next to each transition: outbound
//! messages, payment proof archival and spreadsheet sync. Every job is
//! leased while it runs, retried with exponential backoff on transient
//! failures, and parked as failed after `max_attempts`.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use sadhya_config::model::OutboxConfig;
use sadhya_core::{
    ArtifactStore, ChannelAdapter, Clock, OrderId, OrderSink, OutboxEntry, OutboxJob,
    SadhyaError, StorageAdapter, SystemClock,
};

/// How long a dequeued job stays invisible to other pollers.
const LEASE: Duration = Duration::from_secs(120);

/// Retry and polling parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboxSettings {
    pub poll_interval: Duration,
    pub max_attempts: u32,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
    pub lease: Duration,
}

impl OutboxSettings {
    pub fn from_config(config: &OutboxConfig) -> Self {
        Self {
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            max_attempts: config.max_attempts.max(1),
            base_backoff: Duration::from_secs(config.base_backoff_secs),
            max_backoff: Duration::from_secs(config.max_backoff_secs),
            lease: LEASE,
        }
    }

    /// Delay before the retry that follows attempt number `attempts`.
    pub fn backoff(&self, attempts: u32) -> Duration {
        let exponent = attempts.saturating_sub(1).min(31);
        self.base_backoff
            .saturating_mul(1u32 << exponent)
            .min(self.max_backoff)
    }
}

impl Default for OutboxSettings {
    fn default() -> Self {
        Self::from_config(&OutboxConfig::default())
    }
}

/// What happened to one dequeued job.
#[derive(Debug, Clone, PartialEq)]
pub enum JobReport {
    Delivered {
        id: i64,
        job: &'static str,
    },
    Retrying {
        id: i64,
        job: &'static str,
        retry_at: DateTime<Utc>,
    },
    /// Gave up; the row stays in the outbox with status `failed`.
    Parked {
        id: i64,
        job: &'static str,
    },
}

pub struct OutboxWorker {
    storage: Arc<dyn StorageAdapter>,
    channel: Arc<dyn ChannelAdapter>,
    artifacts: Arc<dyn ArtifactStore>,
    sink: Arc<dyn OrderSink>,
    clock: Arc<dyn Clock>,
    settings: OutboxSettings,
}

impl OutboxWorker {
    pub fn new(
        storage: Arc<dyn StorageAdapter>,
        channel: Arc<dyn ChannelAdapter>,
        artifacts: Arc<dyn ArtifactStore>,
        sink: Arc<dyn OrderSink>,
        settings: OutboxSettings,
    ) -> Self {
        Self {
            storage,
            channel,
            artifacts,
            sink,
            clock: Arc::new(SystemClock),
            settings,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Polls until `cancel` fires. A job already running is finished first.
    pub async fn run(&self, cancel: CancellationToken) {
        info!(
            poll_ms = self.settings.poll_interval.as_millis() as u64,
            max_attempts = self.settings.max_attempts,
            "outbox worker started"
        );
        loop {
            if cancel.is_cancelled() {
                break;
            }
            match self.process_next().await {
                Ok(Some(_)) => continue,
                Ok(None) => {}
                Err(e) => warn!(error = %e, "outbox poll failed"),
            }
            tokio::select! {
                _ = tokio::time::sleep(self.settings.poll_interval) => {}
                _ = cancel.cancelled() => break,
            }
        }
        info!("outbox worker shutting down");
    }

    /// Runs every job that is due now. Returns the reports in order.
    pub async fn drain(&self) -> Result<Vec<JobReport>, SadhyaError> {
        let mut reports = Vec::new();
        while let Some(report) = self.process_next().await? {
            reports.push(report);
        }
        Ok(reports)
    }

    /// Claims and runs the oldest due job, if any.
    pub async fn process_next(&self) -> Result<Option<JobReport>, SadhyaError> {
        let now = self.clock.now();
        let lease_until = now + to_delta(self.settings.lease)?;
        let Some(entry) = self.storage.dequeue_job(now, lease_until).await? else {
            return Ok(None);
        };
        let job = entry.job.label();

        match self.execute(&entry).await {
            Ok(()) => {
                self.storage.ack_job(entry.id).await?;
                debug!(id = entry.id, job, attempts = entry.attempts, "outbox job delivered");
                #[cfg(feature = "prometheus")]
                sadhya_prometheus::record_outbox_delivered(job);
                Ok(Some(JobReport::Delivered { id: entry.id, job }))
            }
            Err(e) => {
                let reason = e.to_string();
                let exhausted = entry.attempts >= self.settings.max_attempts;
                if exhausted || !e.is_transient() {
                    self.storage.fail_job(entry.id, &reason, None).await?;
                    warn!(
                        id = entry.id,
                        job,
                        attempts = entry.attempts,
                        error = %reason,
                        "outbox job parked"
                    );
                    #[cfg(feature = "prometheus")]
                    sadhya_prometheus::record_outbox_failure(job, true);
                    Ok(Some(JobReport::Parked { id: entry.id, job }))
                } else {
                    let retry_at = now + to_delta(self.settings.backoff(entry.attempts))?;
                    self.storage
                        .fail_job(entry.id, &reason, Some(retry_at))
                        .await?;
                    debug!(
                        id = entry.id,
                        job,
                        attempts = entry.attempts,
                        retry_at = %retry_at,
                        error = %reason,
                        "outbox job will retry"
                    );
                    #[cfg(feature = "prometheus")]
                    sadhya_prometheus::record_outbox_failure(job, false);
                    Ok(Some(JobReport::Retrying {
                        id: entry.id,
                        job,
                        retry_at,
                    }))
                }
            }
        }
    }

    async fn execute(&self, entry: &OutboxEntry) -> Result<(), SadhyaError> {
        match &entry.job {
            OutboxJob::Send { intent } => {
                self.channel.send(intent).await?;
                Ok(())
            }
            OutboxJob::ArchiveProof { order_id, media_id } => {
                let reference = self
                    .artifacts
                    .store_payment_proof(order_id, media_id)
                    .await?;
                let now = self.clock.now();
                if !self
                    .storage
                    .set_payment_proof_ref(order_id, &reference, now)
                    .await?
                {
                    return Err(order_not_found(order_id));
                }
                self.storage
                    .enqueue_jobs(
                        vec![OutboxJob::SyncOrder {
                            order_id: order_id.clone(),
                        }],
                        now,
                    )
                    .await
            }
            OutboxJob::SyncOrder { order_id } => {
                let order = self
                    .storage
                    .get_order(order_id)
                    .await?
                    .ok_or_else(|| order_not_found(order_id))?;
                self.sink.record_order(&order).await
            }
        }
    }
}

fn order_not_found(order_id: &OrderId) -> SadhyaError {
    SadhyaError::NotFound {
        kind: "order".into(),
        id: order_id.to_string(),
    }
}

fn to_delta(duration: Duration) -> Result<TimeDelta, SadhyaError> {
    TimeDelta::from_std(duration)
        .map_err(|e| SadhyaError::Internal(format!("duration out of range: {e}")))
}
