// SPDX-FileCopyrightText: 2026 Sadhya Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory storage adapter with the same commit semantics as SQLite.
//!
//! All state sits behind one mutex so a commit is atomic exactly like a
//! SQLite transaction. Used by tests and by `sadhya serve --in-memory`.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use sadhya_core::{
    AdapterType, CommitOutcome, ConsumeOutcome, HealthStatus, MessageId, Order, OrderId,
    OutboxEntry, OutboxJob, OutboxStatus, PluginAdapter, SadhyaError, Session, StorageAdapter,
    TokenAction, TokenConsumption, TransitionCommit, VerificationStatus, VerificationToken,
};

#[derive(Default)]
struct State {
    sessions: HashMap<String, Session>,
    orders: HashMap<String, Order>,
    tokens: HashMap<String, VerificationToken>,
    processed: HashMap<String, DateTime<Utc>>,
    outbox: BTreeMap<i64, OutboxEntry>,
    next_job_id: i64,
}

impl State {
    fn write_session(&mut self, session: &Session, expected_version: Option<u64>) -> bool {
        let current = self.sessions.get(&session.phone).map(|s| s.version);
        if current != expected_version {
            return false;
        }
        self.sessions
            .insert(session.phone.clone(), session.clone());
        true
    }

    fn push_jobs(&mut self, jobs: &[OutboxJob], now: DateTime<Utc>) {
        for job in jobs {
            self.next_job_id += 1;
            self.outbox.insert(
                self.next_job_id,
                OutboxEntry {
                    id: self.next_job_id,
                    job: job.clone(),
                    status: OutboxStatus::Pending,
                    attempts: 0,
                    available_at: now,
                    last_error: None,
                    created_at: now,
                },
            );
        }
    }
}

/// Volatile [`StorageAdapter`] for tests and throwaway runs.
#[derive(Default)]
pub struct MemoryStorage {
    state: Mutex<State>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>, SadhyaError> {
        self.state
            .lock()
            .map_err(|_| SadhyaError::Internal("memory storage lock poisoned".into()))
    }

    /// Every job ever enqueued, in insertion order (test inspection).
    pub fn outbox_snapshot(&self) -> Vec<OutboxEntry> {
        self.lock()
            .map(|s| s.outbox.values().cloned().collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl PluginAdapter for MemoryStorage {
    fn name(&self) -> &str {
        "memory"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, SadhyaError> {
        self.lock()?;
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), SadhyaError> {
        Ok(())
    }
}

#[async_trait]
impl StorageAdapter for MemoryStorage {
    async fn initialize(&self) -> Result<(), SadhyaError> {
        Ok(())
    }

    async fn close(&self) -> Result<(), SadhyaError> {
        Ok(())
    }

    async fn get_session(&self, phone: &str) -> Result<Option<Session>, SadhyaError> {
        Ok(self.lock()?.sessions.get(phone).cloned())
    }

    async fn commit_transition(
        &self,
        commit: TransitionCommit,
    ) -> Result<CommitOutcome, SadhyaError> {
        let mut state = self.lock()?;

        if let Some(event) = &commit.event
            && state.processed.contains_key(&event.message_id.0)
        {
            return Ok(CommitOutcome::DuplicateEvent);
        }
        if let Some(order) = &commit.order
            && state.orders.contains_key(&order.order_id.0)
        {
            return Err(SadhyaError::storage(format!(
                "order {} already exists",
                order.order_id
            )));
        }
        if !state.write_session(&commit.session, commit.expected_version) {
            return Ok(CommitOutcome::VersionConflict);
        }

        if let Some(event) = &commit.event {
            state
                .processed
                .insert(event.message_id.0.clone(), event.processed_at);
        }
        if let Some(order) = commit.order {
            state.orders.insert(order.order_id.0.clone(), order);
        }
        for token in commit.tokens {
            state.tokens.insert(token.token.clone(), token);
        }
        state.push_jobs(&commit.jobs, commit.session.last_activity_at);
        Ok(CommitOutcome::Committed)
    }

    async fn is_event_processed(&self, message_id: &MessageId) -> Result<bool, SadhyaError> {
        Ok(self.lock()?.processed.contains_key(&message_id.0))
    }

    async fn list_sessions_idle_since(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Session>, SadhyaError> {
        let mut idle: Vec<Session> = self
            .lock()?
            .sessions
            .values()
            .filter(|s| s.last_activity_at < cutoff)
            .cloned()
            .collect();
        idle.sort_by_key(|s| s.last_activity_at);
        Ok(idle)
    }

    async fn delete_session(
        &self,
        phone: &str,
        expected_version: u64,
    ) -> Result<bool, SadhyaError> {
        let mut state = self.lock()?;
        match state.sessions.get(phone) {
            Some(s) if s.version == expected_version => {
                state.sessions.remove(phone);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn prune_processed_events(&self, cutoff: DateTime<Utc>) -> Result<u64, SadhyaError> {
        let mut state = self.lock()?;
        let before = state.processed.len();
        state.processed.retain(|_, at| *at >= cutoff);
        Ok((before - state.processed.len()) as u64)
    }

    async fn get_order(&self, order_id: &OrderId) -> Result<Option<Order>, SadhyaError> {
        Ok(self.lock()?.orders.get(&order_id.0).cloned())
    }

    async fn set_payment_proof_ref(
        &self,
        order_id: &OrderId,
        reference: &str,
        updated_at: DateTime<Utc>,
    ) -> Result<bool, SadhyaError> {
        let mut state = self.lock()?;
        match state.orders.get_mut(&order_id.0) {
            Some(order) => {
                order.payment_proof_ref = Some(reference.to_string());
                order.updated_at = updated_at;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn get_token(&self, token: &str) -> Result<Option<VerificationToken>, SadhyaError> {
        Ok(self.lock()?.tokens.get(token).cloned())
    }

    async fn tokens_for_order(
        &self,
        order_id: &OrderId,
    ) -> Result<Vec<VerificationToken>, SadhyaError> {
        let mut tokens: Vec<VerificationToken> = self
            .lock()?
            .tokens
            .values()
            .filter(|t| t.order_id == *order_id)
            .cloned()
            .collect();
        tokens.sort_by_key(|t| t.action != TokenAction::Verify);
        Ok(tokens)
    }

    async fn consume_token_pair(
        &self,
        consumption: TokenConsumption,
    ) -> Result<ConsumeOutcome, SadhyaError> {
        let mut state = self.lock()?;

        let Some(token) = state.tokens.get(&consumption.token).cloned() else {
            return Ok(ConsumeOutcome::TokenMissing);
        };
        if token.is_consumed() {
            return Ok(ConsumeOutcome::AlreadyConsumed);
        }
        match state.orders.get(&token.order_id.0) {
            Some(order) if order.verification_status == VerificationStatus::Pending => {}
            _ => return Ok(ConsumeOutcome::OrderMissing),
        }

        let siblings: HashSet<String> = state
            .tokens
            .values()
            .filter(|t| t.order_id == token.order_id)
            .map(|t| t.token.clone())
            .collect();
        for value in siblings {
            if let Some(t) = state.tokens.get_mut(&value) {
                t.consumed_at = Some(consumption.consumed_at);
            }
        }

        let order = match state.orders.get_mut(&token.order_id.0) {
            Some(order) => {
                order.verification_status = token.action.resulting_status();
                order.updated_at = consumption.consumed_at;
                order.clone()
            }
            None => return Ok(ConsumeOutcome::OrderMissing),
        };

        if let Some(update) = &consumption.session {
            state.write_session(&update.session, Some(update.expected_version));
        }
        state.push_jobs(&consumption.jobs, consumption.consumed_at);
        Ok(ConsumeOutcome::Consumed(order))
    }

    async fn enqueue_jobs(
        &self,
        jobs: Vec<OutboxJob>,
        now: DateTime<Utc>,
    ) -> Result<(), SadhyaError> {
        self.lock()?.push_jobs(&jobs, now);
        Ok(())
    }

    async fn dequeue_job(
        &self,
        now: DateTime<Utc>,
        lease_until: DateTime<Utc>,
    ) -> Result<Option<OutboxEntry>, SadhyaError> {
        let mut state = self.lock()?;
        let due = state
            .outbox
            .values_mut()
            .filter(|e| {
                matches!(e.status, OutboxStatus::Pending | OutboxStatus::Processing)
                    && e.available_at <= now
            })
            .min_by_key(|e| (e.available_at, e.id));
        Ok(due.map(|entry| {
            entry.status = OutboxStatus::Processing;
            entry.attempts += 1;
            entry.available_at = lease_until;
            entry.clone()
        }))
    }

    async fn ack_job(&self, id: i64) -> Result<(), SadhyaError> {
        if let Some(entry) = self.lock()?.outbox.get_mut(&id) {
            entry.status = OutboxStatus::Completed;
            entry.last_error = None;
        }
        Ok(())
    }

    async fn fail_job(
        &self,
        id: i64,
        error: &str,
        retry_at: Option<DateTime<Utc>>,
    ) -> Result<(), SadhyaError> {
        if let Some(entry) = self.lock()?.outbox.get_mut(&id) {
            entry.last_error = Some(error.to_string());
            match retry_at {
                Some(at) => {
                    entry.status = OutboxStatus::Pending;
                    entry.available_at = at;
                }
                None => entry.status = OutboxStatus::Failed,
            }
        }
        Ok(())
    }

    async fn prune_outbox(&self, before: DateTime<Utc>) -> Result<u64, SadhyaError> {
        let mut state = self.lock()?;
        let count = state.outbox.len();
        state.outbox.retain(|_, entry| {
            !(matches!(entry.status, OutboxStatus::Completed | OutboxStatus::Failed)
                && entry.created_at < before)
        });
        Ok((count - state.outbox.len()) as u64)
    }
}
