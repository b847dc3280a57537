// SPDX-FileCopyrightText: 2026 Sadhya Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Storage adapter trait for persistence backends (SQLite, in-memory).

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::SadhyaError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{
    CommitOutcome, ConsumeOutcome, MessageId, Order, OrderId, OutboxEntry, OutboxJob, Session,
    TokenConsumption, TransitionCommit, VerificationToken,
};

/// Adapter for storage and persistence backends.
///
/// Every write that belongs to one state transition goes through a single
/// call ([`commit_transition`](Self::commit_transition) or
/// [`consume_token_pair`](Self::consume_token_pair)) so it lands atomically.
#[async_trait]
pub trait StorageAdapter: PluginAdapter {
    /// Initializes the storage backend (migrations, connection, etc.).
    async fn initialize(&self) -> Result<(), SadhyaError>;

    /// Closes the storage backend, flushing pending writes and releasing connections.
    async fn close(&self) -> Result<(), SadhyaError>;

    // --- Sessions ---

    async fn get_session(&self, phone: &str) -> Result<Option<Session>, SadhyaError>;

    /// Applies a transition: the session write (compare-and-set on version),
    /// the processed-event receipt, an optional new order with its tokens,
    /// and the outbox jobs. Either everything is written or nothing is.
    async fn commit_transition(
        &self,
        commit: TransitionCommit,
    ) -> Result<CommitOutcome, SadhyaError>;

    /// Whether an inbound event id has already been applied.
    async fn is_event_processed(&self, message_id: &MessageId) -> Result<bool, SadhyaError>;

    /// Sessions whose last activity is older than `cutoff`.
    async fn list_sessions_idle_since(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Session>, SadhyaError>;

    /// Deletes a session if its version still matches. Returns whether a row
    /// was removed.
    async fn delete_session(&self, phone: &str, expected_version: u64)
    -> Result<bool, SadhyaError>;

    /// Forgets processed-event receipts recorded before `cutoff`.
    async fn prune_processed_events(&self, cutoff: DateTime<Utc>) -> Result<u64, SadhyaError>;

    // --- Orders and tokens ---

    async fn get_order(&self, order_id: &OrderId) -> Result<Option<Order>, SadhyaError>;

    /// Replaces the payment proof reference of an order.
    async fn set_payment_proof_ref(
        &self,
        order_id: &OrderId,
        reference: &str,
        updated_at: DateTime<Utc>,
    ) -> Result<bool, SadhyaError>;

    async fn get_token(&self, token: &str) -> Result<Option<VerificationToken>, SadhyaError>;

    async fn tokens_for_order(
        &self,
        order_id: &OrderId,
    ) -> Result<Vec<VerificationToken>, SadhyaError>;

    /// Consumes `consumption.token` and its sibling in one compare-and-swap on
    /// `consumed_at IS NULL`, sets the order status from the token action and,
    /// only for the winning caller, writes the session update and jobs.
    async fn consume_token_pair(
        &self,
        consumption: TokenConsumption,
    ) -> Result<ConsumeOutcome, SadhyaError>;

    // --- Outbox ---

    async fn enqueue_jobs(
        &self,
        jobs: Vec<OutboxJob>,
        now: DateTime<Utc>,
    ) -> Result<(), SadhyaError>;

    /// Claims the oldest due job, counting an attempt and leasing it until
    /// `lease_until`. Expired leases make a job due again.
    async fn dequeue_job(
        &self,
        now: DateTime<Utc>,
        lease_until: DateTime<Utc>,
    ) -> Result<Option<OutboxEntry>, SadhyaError>;

    /// Marks a job as delivered.
    async fn ack_job(&self, id: i64) -> Result<(), SadhyaError>;

    /// Records a failed attempt. With `retry_at` the job becomes due again
    /// at that instant; without it the job is parked as failed.
    async fn fail_job(
        &self,
        id: i64,
        error: &str,
        retry_at: Option<DateTime<Utc>>,
    ) -> Result<(), SadhyaError>;

    /// Deletes completed and parked jobs created before `before`.
    /// Pending and leased jobs are never touched.
    async fn prune_outbox(&self, before: DateTime<Utc>) -> Result<u64, SadhyaError>;
}
