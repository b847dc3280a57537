// SPDX-FileCopyrightText: 2026 Sadhya Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Applies inbound chat events to sessions.
//!
//! For each event the engine takes the customer's keyed lock, loads the
//! session, runs the pure [`machine::step`] and commits the result in one
//! storage transaction together with the event receipt and the outbox
//! jobs. Nothing is sent from here; the outbox worker delivers afterwards.

use std::sync::Arc;

use tracing::{debug, info, warn};

use sadhya_core::{
    Catalog, Clock, CommitOutcome, EventReceipt, InboundEvent, OutboxJob, SadhyaError, Session,
    Stage, StorageAdapter, SystemClock, TransitionCommit, redact_phone,
};

use crate::ids::{IdGenerator, RandomIds};
use crate::locks::KeyedLocks;
use crate::machine::{self, StepInput, StepOutcome};
use crate::prompts;
use crate::settings::FlowSettings;

/// Result of handling one inbound event.
#[derive(Debug, Clone, PartialEq)]
pub enum EventOutcome {
    /// The transition was committed; `stage` is where the session is now.
    Committed { stage: Stage, step: StepOutcome },
    /// The message id was already processed.
    Duplicate,
    /// Another writer changed the session first.
    Conflict,
}

/// Drives the conversation for every customer.
pub struct FlowEngine {
    storage: Arc<dyn StorageAdapter>,
    catalog: Arc<dyn Catalog>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
    locks: Arc<KeyedLocks>,
    settings: FlowSettings,
}

impl FlowEngine {
    pub fn new(
        storage: Arc<dyn StorageAdapter>,
        catalog: Arc<dyn Catalog>,
        settings: FlowSettings,
    ) -> Self {
        Self {
            storage,
            catalog,
            clock: Arc::new(SystemClock),
            ids: Arc::new(RandomIds),
            locks: Arc::new(KeyedLocks::new()),
            settings,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_ids(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    /// Shares the per-customer locks with the verification service and reaper.
    pub fn with_locks(mut self, locks: Arc<KeyedLocks>) -> Self {
        self.locks = locks;
        self
    }

    pub fn locks(&self) -> Arc<KeyedLocks> {
        self.locks.clone()
    }

    pub fn settings(&self) -> &FlowSettings {
        &self.settings
    }

    /// Handles one inbound event end to end.
    pub async fn handle_event(&self, event: InboundEvent) -> Result<EventOutcome, SadhyaError> {
        #[cfg(feature = "prometheus")]
        sadhya_prometheus::record_inbound(event.payload.kind());

        let _guard = self.locks.lock(&event.phone).await;

        if self.storage.is_event_processed(&event.message_id).await? {
            return self.answer_stale(&event, true).await;
        }

        let current = self.storage.get_session(&event.phone).await?;
        let expected_version = current.as_ref().map(|s| s.version);
        let now = self.clock.now();
        let session = current.unwrap_or_else(|| Session::new(event.phone.clone(), now));
        let catalog = self.catalog.snapshot();

        let step = machine::step(&StepInput {
            session: &session,
            payload: &event.payload,
            now,
            catalog: &catalog,
            settings: &self.settings,
            ids: self.ids.as_ref(),
        });

        let mut next = step.session;
        next.version = session.version + 1;
        let stage = next.stage;
        let order_id = step.order.as_ref().map(|o| o.order_id.clone());

        let commit = TransitionCommit {
            session: next,
            expected_version,
            event: Some(EventReceipt {
                message_id: event.message_id.clone(),
                phone: event.phone.clone(),
                stage: session.stage,
                processed_at: now,
            }),
            order: step.order,
            tokens: step.tokens,
            jobs: step.jobs,
        };

        match self.storage.commit_transition(commit).await? {
            CommitOutcome::Committed => {}
            CommitOutcome::DuplicateEvent => return self.answer_stale(&event, true).await,
            CommitOutcome::VersionConflict => return self.answer_stale(&event, false).await,
        }

        match &step.outcome {
            StepOutcome::Reprompted { stage, error } => {
                debug!(
                    phone = %redact_phone(&event.phone),
                    stage = %stage,
                    reason = %error,
                    "input rejected"
                );
                #[cfg(feature = "prometheus")]
                sadhya_prometheus::record_rejection(&stage.to_string());
            }
            outcome => {
                info!(
                    phone = %redact_phone(&event.phone),
                    from = %session.stage,
                    to = %stage,
                    outcome = outcome.label(),
                    order_id = order_id.as_ref().map(|id| id.as_str()),
                    "transition committed"
                );
                #[cfg(feature = "prometheus")]
                sadhya_prometheus::record_transition(&stage.to_string());
            }
        }

        #[cfg(feature = "prometheus")]
        if let Ok(elapsed) = (now - event.received_at).to_std() {
            sadhya_prometheus::record_latency(elapsed.as_secs_f64());
        }

        Ok(EventOutcome::Committed {
            stage,
            step: step.outcome,
        })
    }

    /// Handles events of one webhook delivery in order, logging failures.
    pub async fn handle_batch(&self, events: Vec<InboundEvent>) {
        for event in events {
            let message_id = event.message_id.clone();
            let phone = redact_phone(&event.phone);
            if let Err(e) = self.handle_event(event).await {
                warn!(phone = %phone, message_id = %message_id.0, error = %e, "inbound event failed");
            }
        }
    }

    async fn answer_stale(
        &self,
        event: &InboundEvent,
        duplicate: bool,
    ) -> Result<EventOutcome, SadhyaError> {
        debug!(
            phone = %redact_phone(&event.phone),
            message_id = %event.message_id.0,
            duplicate,
            "stale transition ignored"
        );
        #[cfg(feature = "prometheus")]
        sadhya_prometheus::record_stale(if duplicate { "duplicate" } else { "conflict" });

        let reply = prompts::stale(&event.phone, duplicate);
        self.storage
            .enqueue_jobs(vec![OutboxJob::send(reply)], self.clock.now())
            .await?;
        Ok(if duplicate {
            EventOutcome::Duplicate
        } else {
            EventOutcome::Conflict
        })
    }
}
