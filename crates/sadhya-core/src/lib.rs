// SPDX-FileCopyrightText: 2026 Sadhya Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Sadhya ordering bot.
//!
//! This crate provides the domain types (sessions, orders, verification
//! tokens, outbox jobs), the error type, and the collaborator traits that the
//! storage, channel and sync crates implement.

pub mod catalog;
pub mod clock;
pub mod error;
pub mod redact;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use catalog::{Catalog, CatalogSnapshot, Location, MAX_PRICE, MenuItem};
pub use clock::{Clock, SystemClock};
pub use error::SadhyaError;
pub use redact::redact_phone;
pub use types::{
    AdapterType, CommitOutcome, ConsumeOutcome, DeliveryAddress, DraftOrder, EventReceipt,
    HealthStatus, InboundEvent, InboundPayload, Junction, JunctionKind, LineItem, MAX_ORDER_AMOUNT,
    MessageId, Order,
    OrderId, OutboundIntent, OutboxEntry, OutboxJob, OutboxStatus, ReplyButton, Session,
    SessionUpdate, Stage, TokenAction, TokenConsumption, TransitionCommit, VerificationStatus,
    VerificationToken,
};

// Re-export all adapter traits at crate root.
pub use traits::{ArtifactStore, ChannelAdapter, OrderSink, PluginAdapter, StorageAdapter};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sadhya_error_has_all_variants() {
        let _config = SadhyaError::Config("test".into());
        let _storage = SadhyaError::Storage {
            source: Box::new(std::io::Error::other("test")),
        };
        let _channel = SadhyaError::Channel {
            message: "test".into(),
            source: None,
        };
        let _sync = SadhyaError::Sync {
            message: "test".into(),
            source: None,
        };
        let _not_found = SadhyaError::NotFound {
            kind: "order".into(),
            id: "EO250101AAAAAA".into(),
        };
        let _health = SadhyaError::HealthCheckFailed {
            name: "test".into(),
            source: Box::new(std::io::Error::other("test")),
        };
        let _timeout = SadhyaError::Timeout {
            duration: std::time::Duration::from_secs(30),
        };
        let _internal = SadhyaError::Internal("test".into());
    }

    #[test]
    fn transient_errors_are_classified() {
        assert!(SadhyaError::storage("locked").is_transient());
        assert!(
            SadhyaError::Channel {
                message: "503".into(),
                source: None
            }
            .is_transient()
        );
        assert!(!SadhyaError::Config("bad".into()).is_transient());
        assert!(
            !SadhyaError::NotFound {
                kind: "order".into(),
                id: "x".into()
            }
            .is_transient()
        );
    }

    #[test]
    fn stage_display_round_trips() {
        use std::str::FromStr;

        let stages = [
            Stage::AwaitingStart,
            Stage::AwaitingDate,
            Stage::AwaitingJunction,
            Stage::AwaitingMenu,
            Stage::AwaitingAddress,
            Stage::AwaitingPaymentScreenshot,
            Stage::AwaitingVerification,
            Stage::Completed,
            Stage::Rejected,
            Stage::Abandoned,
        ];
        for stage in stages {
            let s = stage.to_string();
            assert_eq!(Stage::from_str(&s).expect("should parse back"), stage);
        }
        assert_eq!(Stage::AwaitingPaymentScreenshot.to_string(), "awaiting_payment_screenshot");
    }

    #[test]
    fn terminal_and_collecting_stages_are_disjoint() {
        assert!(Stage::Completed.is_terminal());
        assert!(Stage::Abandoned.is_terminal());
        assert!(!Stage::AwaitingVerification.is_terminal());
        assert!(!Stage::AwaitingVerification.is_collecting());
        assert!(Stage::AwaitingMenu.is_collecting());
        assert!(!Stage::Rejected.is_collecting());
    }

    #[test]
    fn adapter_type_serialization() {
        let sink = AdapterType::OrderSink;
        let json = serde_json::to_string(&sink).expect("should serialize");
        let parsed: AdapterType = serde_json::from_str(&json).expect("should deserialize");
        assert_eq!(sink, parsed);
    }

    #[test]
    fn health_status_variants() {
        let healthy = HealthStatus::Healthy;
        let degraded = HealthStatus::Degraded("slow".into());
        let unhealthy = HealthStatus::Unhealthy("down".into());

        assert_eq!(healthy, HealthStatus::Healthy);
        assert_ne!(degraded, healthy);
        assert_ne!(unhealthy, healthy);
    }

    #[test]
    fn draft_totals_include_fee_only_for_delivery() {
        let items = vec![
            LineItem {
                item_number: 1,
                name: "Veg Sadhya".into(),
                unit_price: 150,
                quantity: 2,
            },
            LineItem {
                item_number: 3,
                name: "Palada Pradhaman".into(),
                unit_price: 40,
                quantity: 1,
            },
        ];
        let mut draft = DraftOrder {
            line_items: items,
            junction: Some(Junction {
                id: "vyttila_delivery".into(),
                name: "Vyttila".into(),
                kind: JunctionKind::Delivery,
                delivery_fee: 50,
            }),
            ..DraftOrder::default()
        };
        assert_eq!(draft.total(), 390);

        draft.junction = Some(Junction {
            id: "pickup".into(),
            name: "Pickup".into(),
            kind: JunctionKind::Pickup,
            delivery_fee: 50,
        });
        assert_eq!(draft.total(), 340);
    }

    #[test]
    fn oversized_amounts_are_refused_not_wrapped() {
        let mut draft = DraftOrder {
            line_items: vec![LineItem {
                item_number: 1,
                name: "Veg Sadhya".into(),
                unit_price: 150,
                quantity: 2,
            }],
            junction: Some(Junction {
                id: "vyttila_delivery".into(),
                name: "Vyttila".into(),
                kind: JunctionKind::Delivery,
                delivery_fee: u64::MAX - 10,
            }),
            ..DraftOrder::default()
        };
        assert_eq!(draft.checked_total(), None);
        assert_eq!(draft.total(), MAX_ORDER_AMOUNT);

        draft.junction = None;
        draft.line_items[0].unit_price = u64::MAX / 2;
        assert_eq!(draft.line_items[0].checked_amount(), None);
        assert_eq!(draft.checked_total(), None);

        draft.line_items[0].unit_price = 150;
        assert_eq!(draft.checked_total(), Some(300));
    }

    #[test]
    fn outbox_job_serializes_with_tag() {
        let job = OutboxJob::SyncOrder {
            order_id: OrderId("EO250101ABCDEF".into()),
        };
        let json = serde_json::to_value(&job).expect("should serialize");
        assert_eq!(json["job"], "sync_order");
        let back: OutboxJob = serde_json::from_value(json).expect("should deserialize");
        assert_eq!(back, job);
    }

    #[test]
    fn all_trait_modules_are_exported() {
        fn _assert_plugin_adapter<T: PluginAdapter>() {}
        fn _assert_channel_adapter<T: ChannelAdapter>() {}
        fn _assert_storage_adapter<T: StorageAdapter>() {}
        fn _assert_artifact_store<T: ArtifactStore>() {}
        fn _assert_order_sink<T: OrderSink>() {}
        fn _assert_catalog<T: Catalog>() {}
    }
}
