// SPDX-FileCopyrightText: 2026 Sadhya Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Periodic cleanup of idle sessions, old event receipts and finished
//! outbox jobs.

use std::sync::Arc;
use std::time::Duration;

use chrono::TimeDelta;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use sadhya_config::model::BotConfig;
use sadhya_core::{
    Clock, CommitOutcome, SadhyaError, Session, Stage, StorageAdapter, SystemClock,
    TransitionCommit, redact_phone,
};

use crate::locks::KeyedLocks;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReaperSettings {
    /// Collecting sessions idle this long are abandoned.
    pub idle_timeout: Duration,
    /// Finished sessions idle this long are deleted, as are event receipts.
    pub retention: Duration,
    pub interval: Duration,
}

impl ReaperSettings {
    pub fn from_config(bot: &BotConfig) -> Self {
        Self {
            idle_timeout: Duration::from_secs(bot.session_idle_timeout_secs),
            retention: Duration::from_secs(bot.terminal_session_retention_secs),
            interval: Duration::from_secs(bot.reaper_interval_secs.max(1)),
        }
    }
}

impl Default for ReaperSettings {
    fn default() -> Self {
        Self::from_config(&BotConfig::default())
    }
}

/// Counts from one sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReapReport {
    /// Collecting sessions moved to `Abandoned`.
    pub abandoned: u64,
    /// Sessions that never got past the greeting, removed outright.
    pub dropped: u64,
    /// Finished sessions removed after the retention period.
    pub deleted: u64,
    pub events_pruned: u64,
    /// Completed or parked outbox jobs removed after the retention period.
    pub outbox_pruned: u64,
}

pub struct SessionReaper {
    storage: Arc<dyn StorageAdapter>,
    locks: Arc<KeyedLocks>,
    clock: Arc<dyn Clock>,
    settings: ReaperSettings,
}

impl SessionReaper {
    pub fn new(
        storage: Arc<dyn StorageAdapter>,
        locks: Arc<KeyedLocks>,
        settings: ReaperSettings,
    ) -> Self {
        Self {
            storage,
            locks,
            clock: Arc::new(SystemClock),
            settings,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Sweeps every `interval` until cancelled.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut interval = tokio::time::interval(self.settings.interval);
        // Skip the first immediate tick.
        interval.tick().await;

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    match self.sweep().await {
                        Ok(report) if report != ReapReport::default() => {
                            info!(
                                abandoned = report.abandoned,
                                dropped = report.dropped,
                                deleted = report.deleted,
                                events_pruned = report.events_pruned,
                                outbox_pruned = report.outbox_pruned,
                                "session reaper sweep"
                            );
                        }
                        Ok(_) => debug!("session reaper found nothing to do"),
                        Err(e) => warn!(error = %e, "session reaper sweep failed (non-fatal)"),
                    }
                }
                _ = cancel.cancelled() => {
                    info!("session reaper shutting down");
                    break;
                }
            }
        }
    }

    pub async fn sweep(&self) -> Result<ReapReport, SadhyaError> {
        let now = self.clock.now();
        let idle_cutoff = now - to_delta(self.settings.idle_timeout)?;
        let retention_cutoff = now - to_delta(self.settings.retention)?;
        let mut report = ReapReport::default();

        for session in self.storage.list_sessions_idle_since(idle_cutoff).await? {
            let _guard = self.locks.lock(&session.phone).await;
            match session.stage {
                Stage::AwaitingStart => {
                    if self
                        .storage
                        .delete_session(&session.phone, session.version)
                        .await?
                    {
                        report.dropped += 1;
                    }
                }
                stage if stage.is_collecting() => {
                    if self.abandon(&session, now).await? {
                        debug!(
                            phone = %redact_phone(&session.phone),
                            stage = %stage,
                            "idle session abandoned"
                        );
                        report.abandoned += 1;
                    }
                }
                _ => {}
            }
        }

        for session in self
            .storage
            .list_sessions_idle_since(retention_cutoff)
            .await?
        {
            if !session.stage.is_terminal() {
                continue;
            }
            let _guard = self.locks.lock(&session.phone).await;
            if self
                .storage
                .delete_session(&session.phone, session.version)
                .await?
            {
                report.deleted += 1;
            }
        }

        report.events_pruned = self
            .storage
            .prune_processed_events(retention_cutoff)
            .await?;
        report.outbox_pruned = self.storage.prune_outbox(retention_cutoff).await?;
        self.locks.prune();

        #[cfg(feature = "prometheus")]
        {
            sadhya_prometheus::record_reaped("abandoned", report.abandoned);
            sadhya_prometheus::record_reaped("dropped", report.dropped);
            sadhya_prometheus::record_reaped("deleted", report.deleted);
        }
        Ok(report)
    }

    /// Moves a collecting session to `Abandoned`. False when it changed meanwhile.
    async fn abandon(
        &self,
        session: &Session,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Result<bool, SadhyaError> {
        let mut next = session.clone();
        next.stage = Stage::Abandoned;
        next.version = session.version + 1;
        next.last_activity_at = now;
        let outcome = self
            .storage
            .commit_transition(TransitionCommit {
                session: next,
                expected_version: Some(session.version),
                event: None,
                order: None,
                tokens: Vec::new(),
                jobs: Vec::new(),
            })
            .await?;
        Ok(outcome == CommitOutcome::Committed)
    }
}

fn to_delta(duration: Duration) -> Result<TimeDelta, SadhyaError> {
    TimeDelta::from_std(duration)
        .map_err(|e| SadhyaError::Internal(format!("duration out of range: {e}")))
}
