// SPDX-FileCopyrightText: 2026 Sadhya Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types used across adapter traits and the Sadhya ordering flow.
//!
//! Amounts are whole rupees (`u64`); every price in the catalog is an
//! integer rupee value and totals never need fractional arithmetic.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Unique identifier for a finalized order (e.g. `EO250828K3J9QZ`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderId(pub String);

impl OrderId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Provider-assigned identifier of a message (inbound `wamid` or outbound id).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub String);

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the kind of adapter behind a collaborator boundary.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Channel,
    Storage,
    ArtifactStore,
    OrderSink,
    Observability,
}

// --- Conversation ---

/// Position of a session in the ordering flow.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    AwaitingStart,
    AwaitingDate,
    AwaitingJunction,
    AwaitingMenu,
    AwaitingAddress,
    AwaitingPaymentScreenshot,
    AwaitingVerification,
    Completed,
    Rejected,
    Abandoned,
}

impl Stage {
    /// Stages that end a conversation; only a restart leaves them.
    pub fn is_terminal(self) -> bool {
        matches!(self, Stage::Completed | Stage::Rejected | Stage::Abandoned)
    }

    /// Stages where the customer is still filling in the draft order.
    ///
    /// These are the only stages the idle reaper abandons.
    pub fn is_collecting(self) -> bool {
        matches!(
            self,
            Stage::AwaitingDate
                | Stage::AwaitingJunction
                | Stage::AwaitingMenu
                | Stage::AwaitingAddress
                | Stage::AwaitingPaymentScreenshot
        )
    }

    /// Position along the forward path, used to check that transitions
    /// never move backwards.
    pub fn ordinal(self) -> u8 {
        match self {
            Stage::AwaitingStart => 0,
            Stage::AwaitingDate => 1,
            Stage::AwaitingJunction => 2,
            Stage::AwaitingMenu => 3,
            Stage::AwaitingAddress => 4,
            Stage::AwaitingPaymentScreenshot => 5,
            Stage::AwaitingVerification => 6,
            Stage::Completed | Stage::Rejected | Stage::Abandoned => 7,
        }
    }
}

/// Whether a junction is a delivery zone or the pickup sentinel.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum JunctionKind {
    Delivery,
    Pickup,
}

/// The junction chosen for an order, frozen at selection time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Junction {
    pub id: String,
    pub name: String,
    pub kind: JunctionKind,
    pub delivery_fee: u64,
}

impl Junction {
    pub fn is_delivery(&self) -> bool {
        self.kind == JunctionKind::Delivery
    }

    /// Fee charged on top of the items; always zero for pickup.
    pub fn applicable_fee(&self) -> u64 {
        match self.kind {
            JunctionKind::Delivery => self.delivery_fee,
            JunctionKind::Pickup => 0,
        }
    }
}

/// One priced line of an order. The unit price is captured from the catalog
/// at the menu stage and never re-read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub item_number: u32,
    pub name: String,
    pub unit_price: u64,
    pub quantity: u32,
}

/// Largest amount an order can carry. Amounts are stored as SQLite integers.
pub const MAX_ORDER_AMOUNT: u64 = i64::MAX as u64;

impl LineItem {
    /// `unit_price × quantity`, or `None` past [`MAX_ORDER_AMOUNT`].
    pub fn checked_amount(&self) -> Option<u64> {
        self.unit_price
            .checked_mul(u64::from(self.quantity))
            .filter(|a| *a <= MAX_ORDER_AMOUNT)
    }

    pub fn amount(&self) -> u64 {
        self.checked_amount().unwrap_or(MAX_ORDER_AMOUNT)
    }
}

/// Sums line amounts and a fee, or `None` past [`MAX_ORDER_AMOUNT`].
fn checked_sum(items: &[LineItem], fee: u64) -> Option<u64> {
    items
        .iter()
        .try_fold(fee, |acc, item| acc.checked_add(item.checked_amount()?))
        .filter(|t| *t <= MAX_ORDER_AMOUNT)
}

/// Where a delivery goes: a shared location or a typed address, never both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DeliveryAddress {
    Geo {
        latitude: f64,
        longitude: f64,
        maps_link: String,
    },
    Text {
        text: String,
    },
}

impl DeliveryAddress {
    /// Human readable one-line rendering used in messages and sheet rows.
    pub fn display(&self) -> String {
        match self {
            DeliveryAddress::Geo { maps_link, .. } => maps_link.clone(),
            DeliveryAddress::Text { text } => text.clone(),
        }
    }
}

/// Selections accumulated while a session walks through the flow.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DraftOrder {
    #[serde(default)]
    pub delivery_date: Option<NaiveDate>,
    #[serde(default)]
    pub junction: Option<Junction>,
    #[serde(default)]
    pub line_items: Vec<LineItem>,
    #[serde(default)]
    pub delivery_address: Option<DeliveryAddress>,
}

impl DraftOrder {
    pub fn subtotal(&self) -> u64 {
        checked_sum(&self.line_items, 0).unwrap_or(MAX_ORDER_AMOUNT)
    }

    pub fn delivery_fee(&self) -> u64 {
        self.junction.as_ref().map_or(0, Junction::applicable_fee)
    }

    /// Total with the applicable fee, or `None` when it does not fit.
    pub fn checked_total(&self) -> Option<u64> {
        checked_sum(&self.line_items, self.delivery_fee())
    }

    /// Saturates at [`MAX_ORDER_AMOUNT`]; drafts are checked with
    /// [`DraftOrder::checked_total`] before they are accepted.
    pub fn total(&self) -> u64 {
        self.checked_total().unwrap_or(MAX_ORDER_AMOUNT)
    }
}

/// Durable per-user conversation state, keyed by phone number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub phone: String,
    pub stage: Stage,
    pub draft: DraftOrder,
    /// Order carved out of this session at finalization.
    pub order_id: Option<OrderId>,
    /// Compare-and-set counter; incremented by every committed write.
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
}

impl Session {
    /// A fresh session for a first-time sender. Version 0 means "not yet stored".
    pub fn new(phone: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            phone: phone.into(),
            stage: Stage::AwaitingStart,
            draft: DraftOrder::default(),
            order_id: None,
            version: 0,
            created_at: now,
            last_activity_at: now,
        }
    }
}

// --- Orders and verification ---

/// Admin decision on the payment proof of an order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    Pending,
    Verified,
    Rejected,
}

/// A finalized order, independent of the session that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub order_id: OrderId,
    pub phone: String,
    pub delivery_date: NaiveDate,
    pub junction: Junction,
    pub line_items: Vec<LineItem>,
    pub delivery_address: Option<DeliveryAddress>,
    pub delivery_fee: u64,
    pub total: u64,
    pub payment_proof_ref: Option<String>,
    pub verification_status: VerificationStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn subtotal(&self) -> u64 {
        checked_sum(&self.line_items, 0).unwrap_or(MAX_ORDER_AMOUNT)
    }

    /// Recomputes the total from the frozen line items and fee.
    pub fn recomputed_total(&self) -> u64 {
        checked_sum(&self.line_items, self.delivery_fee).unwrap_or(MAX_ORDER_AMOUNT)
    }

    pub fn is_delivery(&self) -> bool {
        self.junction.is_delivery()
    }
}

/// Which admin decision a verification token carries.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TokenAction {
    Verify,
    Reject,
}

impl TokenAction {
    /// The status an order takes when this action succeeds.
    pub fn resulting_status(self) -> VerificationStatus {
        match self {
            TokenAction::Verify => VerificationStatus::Verified,
            TokenAction::Reject => VerificationStatus::Rejected,
        }
    }

    /// URL path segment of the link carrying this action.
    pub fn path_segment(self) -> &'static str {
        match self {
            TokenAction::Verify => "verify",
            TokenAction::Reject => "reject",
        }
    }
}

/// Single-use credential binding one admin action to one order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationToken {
    pub token: String,
    pub order_id: OrderId,
    pub action: TokenAction,
    pub consumed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl VerificationToken {
    pub fn is_consumed(&self) -> bool {
        self.consumed_at.is_some()
    }
}

// --- Inbound channel events ---

/// What the customer sent, normalized from the provider envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundPayload {
    Text {
        body: String,
    },
    /// Reply to an interactive button or list message.
    Selection {
        id: String,
        title: String,
    },
    Location {
        latitude: f64,
        longitude: f64,
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        address: Option<String>,
    },
    Image {
        media_id: String,
        #[serde(default)]
        mime_type: Option<String>,
        #[serde(default)]
        caption: Option<String>,
    },
    /// Stickers, audio, contacts and anything else the flow never accepts.
    Unsupported {
        kind: String,
    },
}

impl InboundPayload {
    /// Text carried by the payload, if any (typed text or a selection title).
    pub fn text(&self) -> Option<&str> {
        match self {
            InboundPayload::Text { body } => Some(body),
            InboundPayload::Selection { title, .. } => Some(title),
            _ => None,
        }
    }

    pub fn kind(&self) -> &str {
        match self {
            InboundPayload::Text { .. } => "text",
            InboundPayload::Selection { .. } => "selection",
            InboundPayload::Location { .. } => "location",
            InboundPayload::Image { .. } => "image",
            InboundPayload::Unsupported { kind } => kind,
        }
    }
}

/// One inbound message from the messaging provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundEvent {
    /// Provider message id; redeliveries carry the same id.
    pub message_id: MessageId,
    pub phone: String,
    #[serde(default)]
    pub profile_name: Option<String>,
    pub received_at: DateTime<Utc>,
    pub payload: InboundPayload,
}

// --- Outbound intents and the outbox ---

/// A quick-reply button attached to an outbound message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyButton {
    pub id: String,
    pub title: String,
}

/// Channel-agnostic "send this to that identity" request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundIntent {
    Text {
        to: String,
        body: String,
    },
    Buttons {
        to: String,
        body: String,
        buttons: Vec<ReplyButton>,
    },
    Image {
        to: String,
        link: String,
        caption: String,
    },
}

impl OutboundIntent {
    pub fn text(to: impl Into<String>, body: impl Into<String>) -> Self {
        OutboundIntent::Text {
            to: to.into(),
            body: body.into(),
        }
    }

    pub fn recipient(&self) -> &str {
        match self {
            OutboundIntent::Text { to, .. }
            | OutboundIntent::Buttons { to, .. }
            | OutboundIntent::Image { to, .. } => to,
        }
    }

    pub fn body(&self) -> &str {
        match self {
            OutboundIntent::Text { body, .. } | OutboundIntent::Buttons { body, .. } => body,
            OutboundIntent::Image { caption, .. } => caption,
        }
    }
}

/// A side effect recorded in the same commit as the transition that caused it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "job", rename_all = "snake_case")]
pub enum OutboxJob {
    /// Deliver a message through the channel.
    Send { intent: OutboundIntent },
    /// Download the payment screenshot and store it durably.
    ArchiveProof { order_id: OrderId, media_id: String },
    /// Push the current order snapshot to the spreadsheet.
    SyncOrder { order_id: OrderId },
}

impl OutboxJob {
    pub fn send(intent: OutboundIntent) -> Self {
        OutboxJob::Send { intent }
    }

    pub fn label(&self) -> &'static str {
        match self {
            OutboxJob::Send { .. } => "send",
            OutboxJob::ArchiveProof { .. } => "archive_proof",
            OutboxJob::SyncOrder { .. } => "sync_order",
        }
    }
}

/// Lifecycle of an outbox row.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OutboxStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

/// A dequeued outbox row.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboxEntry {
    pub id: i64,
    pub job: OutboxJob,
    pub status: OutboxStatus,
    /// Delivery attempts so far, including the one this dequeue starts.
    pub attempts: u32,
    /// While `Processing`, the lease expiry after which the row may be
    /// picked up again.
    pub available_at: DateTime<Utc>,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
}

// --- Commits ---

/// Record that an inbound event was applied while the session sat at `stage`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventReceipt {
    pub message_id: MessageId,
    pub phone: String,
    pub stage: Stage,
    pub processed_at: DateTime<Utc>,
}

/// Everything one state transition writes, applied atomically by storage.
#[derive(Debug, Clone)]
pub struct TransitionCommit {
    /// The session as it should be stored (its `version` already bumped).
    pub session: Session,
    /// Version the stored row must still have; `None` when creating it.
    pub expected_version: Option<u64>,
    /// Inbound event that caused the transition, for duplicate detection.
    pub event: Option<EventReceipt>,
    /// Order carved out of the session by this transition.
    pub order: Option<Order>,
    pub tokens: Vec<VerificationToken>,
    pub jobs: Vec<OutboxJob>,
}

/// Result of trying to apply a [`TransitionCommit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    Committed,
    /// The inbound event id was already recorded; nothing was written.
    DuplicateEvent,
    /// Another writer changed the session first; nothing was written.
    VersionConflict,
}

/// A session write that only applies if the stored version still matches.
#[derive(Debug, Clone)]
pub struct SessionUpdate {
    pub session: Session,
    pub expected_version: u64,
}

/// Everything resolving a verification token writes in one transaction.
///
/// The session update is skipped (not failed) when the stored session moved
/// on; the token pair and order status are still written.
#[derive(Debug, Clone)]
pub struct TokenConsumption {
    pub token: String,
    pub session: Option<SessionUpdate>,
    pub jobs: Vec<OutboxJob>,
    pub consumed_at: DateTime<Utc>,
}

/// Result of the compare-and-swap that consumes a token pair.
#[derive(Debug, Clone, PartialEq)]
pub enum ConsumeOutcome {
    /// This caller won; both sibling tokens are now consumed and the order
    /// carries the new status.
    Consumed(Order),
    AlreadyConsumed,
    TokenMissing,
    OrderMissing,
}
