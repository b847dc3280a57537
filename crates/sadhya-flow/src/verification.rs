// SPDX-FileCopyrightText: 2026 Sadhya Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Admin verify/reject links.
//!
//! Each order carries two single-use tokens. Following either one consumes
//! both, so the first decision wins and every later click is told the order
//! was already handled.

use std::sync::Arc;

use tracing::{error, info, warn};

use sadhya_core::{
    Clock, ConsumeOutcome, Order, OrderId, OutboxJob, SadhyaError, SessionUpdate, Stage,
    StorageAdapter, SystemClock, TokenAction, TokenConsumption, VerificationStatus, redact_phone,
};

use crate::locks::KeyedLocks;
use crate::prompts;
use crate::settings::FlowSettings;

/// What following a verification link did.
#[derive(Debug, Clone, PartialEq)]
pub enum VerificationOutcome {
    Verified(Order),
    Rejected(Order),
    /// A token of this order was used before.
    AlreadyHandled {
        order_id: OrderId,
        status: Option<VerificationStatus>,
    },
    /// Unknown token, or a token used on the wrong action path.
    Invalid,
}

impl VerificationOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            VerificationOutcome::Verified(_) => "verified",
            VerificationOutcome::Rejected(_) => "rejected",
            VerificationOutcome::AlreadyHandled { .. } => "already_handled",
            VerificationOutcome::Invalid => "invalid",
        }
    }
}

pub struct VerificationService {
    storage: Arc<dyn StorageAdapter>,
    clock: Arc<dyn Clock>,
    locks: Arc<KeyedLocks>,
    settings: FlowSettings,
}

impl VerificationService {
    pub fn new(
        storage: Arc<dyn StorageAdapter>,
        locks: Arc<KeyedLocks>,
        settings: FlowSettings,
    ) -> Self {
        Self {
            storage,
            clock: Arc::new(SystemClock),
            locks,
            settings,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Applies the decision behind `token` if nobody decided this order yet.
    pub async fn resolve(
        &self,
        token: &str,
        action: TokenAction,
    ) -> Result<VerificationOutcome, SadhyaError> {
        let outcome = self.resolve_inner(token, action).await?;
        #[cfg(feature = "prometheus")]
        sadhya_prometheus::record_verification(outcome.label());
        Ok(outcome)
    }

    async fn resolve_inner(
        &self,
        token: &str,
        action: TokenAction,
    ) -> Result<VerificationOutcome, SadhyaError> {
        let Some(record) = self.storage.get_token(token).await? else {
            warn!(action = %action, "unknown verification token");
            return Ok(VerificationOutcome::Invalid);
        };
        if record.action != action {
            warn!(
                order_id = %record.order_id,
                expected = %record.action,
                used = %action,
                "verification token used on the wrong path"
            );
            return Ok(VerificationOutcome::Invalid);
        }
        if record.is_consumed() {
            return self.already_handled(record.order_id).await;
        }

        let Some(order) = self.storage.get_order(&record.order_id).await? else {
            error!(order_id = %record.order_id, "verification token without order");
            return Ok(VerificationOutcome::Invalid);
        };

        let _guard = self.locks.lock(&order.phone).await;
        let now = self.clock.now();
        let verified = action == TokenAction::Verify;

        let session = self
            .storage
            .get_session(&order.phone)
            .await?
            .filter(|s| {
                s.stage == Stage::AwaitingVerification
                    && s.order_id.as_ref() == Some(&order.order_id)
            })
            .map(|current| {
                let mut next = current.clone();
                next.stage = if verified {
                    Stage::Completed
                } else {
                    Stage::Rejected
                };
                next.version = current.version + 1;
                next.last_activity_at = now;
                SessionUpdate {
                    session: next,
                    expected_version: current.version,
                }
            });

        let mut decided = order.clone();
        decided.verification_status = action.resulting_status();
        let jobs = vec![
            OutboxJob::send(prompts::verification_result(
                &decided,
                verified,
                &self.settings,
            )),
            OutboxJob::SyncOrder {
                order_id: order.order_id.clone(),
            },
        ];

        let consumption = TokenConsumption {
            token: token.to_string(),
            session,
            jobs,
            consumed_at: now,
        };
        match self.storage.consume_token_pair(consumption).await? {
            ConsumeOutcome::Consumed(order) => {
                info!(
                    order_id = %order.order_id,
                    phone = %redact_phone(&order.phone),
                    status = %order.verification_status,
                    "payment decision recorded"
                );
                Ok(if verified {
                    VerificationOutcome::Verified(order)
                } else {
                    VerificationOutcome::Rejected(order)
                })
            }
            ConsumeOutcome::AlreadyConsumed => self.already_handled(order.order_id).await,
            ConsumeOutcome::TokenMissing => Ok(VerificationOutcome::Invalid),
            ConsumeOutcome::OrderMissing => {
                error!(
                    order_id = %order.order_id,
                    "order is no longer pending but its tokens were unused"
                );
                Ok(VerificationOutcome::Invalid)
            }
        }
    }

    async fn already_handled(
        &self,
        order_id: OrderId,
    ) -> Result<VerificationOutcome, SadhyaError> {
        let status = self
            .storage
            .get_order(&order_id)
            .await?
            .map(|o| o.verification_status);
        Ok(VerificationOutcome::AlreadyHandled { order_id, status })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, NaiveDate, TimeZone, Utc};
    use sadhya_core::{
        CommitOutcome, Junction, JunctionKind, LineItem, OutboundIntent, Session, TransitionCommit,
        VerificationToken,
    };
    use sadhya_storage::MemoryStorage;

    struct Fixed(DateTime<Utc>);

    impl Clock for Fixed {
        fn now(&self) -> DateTime<Utc> {
            self.0
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 20, 12, 0, 0).unwrap()
    }

    fn token(value: &str, action: TokenAction) -> VerificationToken {
        VerificationToken {
            token: value.into(),
            order_id: OrderId("EO260820TEST01".into()),
            action,
            consumed_at: None,
            created_at: now(),
        }
    }

    async fn seeded() -> (Arc<MemoryStorage>, VerificationService) {
        let storage = Arc::new(MemoryStorage::new());
        let order = Order {
            order_id: OrderId("EO260820TEST01".into()),
            phone: "919812345678".into(),
            delivery_date: NaiveDate::from_ymd_opt(2026, 8, 25).unwrap(),
            junction: Junction {
                id: "pickup".into(),
                name: "Pickup".into(),
                kind: JunctionKind::Pickup,
                delivery_fee: 0,
            },
            line_items: vec![LineItem {
                item_number: 1,
                name: "Veg Sadhya".into(),
                unit_price: 150,
                quantity: 2,
            }],
            delivery_address: None,
            delivery_fee: 0,
            total: 300,
            payment_proof_ref: Some("whatsapp-media:m1".into()),
            verification_status: VerificationStatus::Pending,
            created_at: now(),
            updated_at: now(),
        };
        let mut session = Session::new("919812345678", now());
        session.stage = Stage::AwaitingVerification;
        session.order_id = Some(order.order_id.clone());
        session.version = 1;
        let outcome = storage
            .commit_transition(TransitionCommit {
                session,
                expected_version: None,
                event: None,
                order: Some(order),
                tokens: vec![
                    token("tok-v", TokenAction::Verify),
                    token("tok-r", TokenAction::Reject),
                ],
                jobs: Vec::new(),
            })
            .await
            .unwrap();
        assert_eq!(outcome, CommitOutcome::Committed);

        let service = VerificationService::new(
            storage.clone(),
            Arc::new(KeyedLocks::new()),
            FlowSettings::default(),
        )
        .with_clock(Arc::new(Fixed(now())));
        (storage, service)
    }

    #[tokio::test]
    async fn verify_completes_session_and_notifies_customer() {
        let (storage, service) = seeded().await;

        let outcome = service.resolve("tok-v", TokenAction::Verify).await.unwrap();
        let VerificationOutcome::Verified(order) = outcome else {
            panic!("expected Verified, got {outcome:?}");
        };
        assert_eq!(order.verification_status, VerificationStatus::Verified);

        let session = storage.get_session("919812345678").await.unwrap().unwrap();
        assert_eq!(session.stage, Stage::Completed);
        assert_eq!(session.version, 2);

        let jobs: Vec<OutboxJob> = storage.outbox_snapshot().into_iter().map(|e| e.job).collect();
        assert_eq!(jobs.len(), 2);
        let OutboxJob::Send { intent } = &jobs[0] else {
            panic!("expected customer message first");
        };
        assert_eq!(intent.recipient(), "919812345678");
        assert!(intent.body().contains("Payment Verified"));
        assert_eq!(jobs[1].label(), "sync_order");
    }

    #[tokio::test]
    async fn second_link_reports_first_decision() {
        let (storage, service) = seeded().await;

        service.resolve("tok-r", TokenAction::Reject).await.unwrap();
        let again = service.resolve("tok-v", TokenAction::Verify).await.unwrap();
        assert_eq!(
            again,
            VerificationOutcome::AlreadyHandled {
                order_id: OrderId("EO260820TEST01".into()),
                status: Some(VerificationStatus::Rejected),
            }
        );
        let session = storage.get_session("919812345678").await.unwrap().unwrap();
        assert_eq!(session.stage, Stage::Rejected);
        assert_eq!(storage.outbox_snapshot().len(), 2, "loser enqueues nothing");
    }

    #[tokio::test]
    async fn unknown_or_mismatched_tokens_are_invalid() {
        let (_storage, service) = seeded().await;
        assert_eq!(
            service.resolve("nope", TokenAction::Verify).await.unwrap(),
            VerificationOutcome::Invalid
        );
        assert_eq!(
            service.resolve("tok-r", TokenAction::Verify).await.unwrap(),
            VerificationOutcome::Invalid
        );
    }

    #[tokio::test]
    async fn decision_applies_even_after_customer_restarted() {
        let (storage, service) = seeded().await;
        let mut moved_on = storage.get_session("919812345678").await.unwrap().unwrap();
        moved_on.stage = Stage::AwaitingDate;
        moved_on.order_id = None;
        moved_on.version = 2;
        storage
            .commit_transition(TransitionCommit {
                session: moved_on,
                expected_version: Some(1),
                event: None,
                order: None,
                tokens: Vec::new(),
                jobs: vec![OutboxJob::send(OutboundIntent::text("919812345678", "welcome"))],
            })
            .await
            .unwrap();

        let outcome = service.resolve("tok-v", TokenAction::Verify).await.unwrap();
        assert!(matches!(outcome, VerificationOutcome::Verified(_)));
        let session = storage.get_session("919812345678").await.unwrap().unwrap();
        assert_eq!(session.stage, Stage::AwaitingDate);
    }
}
