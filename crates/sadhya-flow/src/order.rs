// SPDX-FileCopyrightText: 2026 Sadhya Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Turning a completed draft into an order.

use chrono::{DateTime, Utc};
use thiserror::Error;

use sadhya_core::{DraftOrder, Order, OrderId, VerificationStatus};

/// A draft that cannot become an order. Only reachable through a bug or
/// tampered session data, never through customer input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IncompleteDraft {
    #[error("draft has no delivery date")]
    MissingDate,
    #[error("draft has no junction")]
    MissingJunction,
    #[error("draft has no line items")]
    NoItems,
    #[error("delivery draft has no address")]
    MissingAddress,
}

/// Checks `draft` and freezes it into a pending order.
///
/// Prices and fee come from the draft, captured when the menu and junction
/// were chosen; the catalog is not consulted again. Pickup orders never
/// keep an address.
pub fn finalize(
    draft: &DraftOrder,
    order_id: OrderId,
    phone: &str,
    payment_proof_ref: String,
    now: DateTime<Utc>,
) -> Result<Order, IncompleteDraft> {
    let delivery_date = draft.delivery_date.ok_or(IncompleteDraft::MissingDate)?;
    let junction = draft.junction.clone().ok_or(IncompleteDraft::MissingJunction)?;
    if draft.line_items.is_empty() {
        return Err(IncompleteDraft::NoItems);
    }
    let delivery_address = if junction.is_delivery() {
        Some(
            draft
                .delivery_address
                .clone()
                .ok_or(IncompleteDraft::MissingAddress)?,
        )
    } else {
        None
    };

    Ok(Order {
        order_id,
        phone: phone.to_string(),
        delivery_date,
        delivery_fee: draft.delivery_fee(),
        total: draft.total(),
        junction,
        line_items: draft.line_items.clone(),
        delivery_address,
        payment_proof_ref: Some(payment_proof_ref),
        verification_status: VerificationStatus::Pending,
        created_at: now,
        updated_at: now,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};
    use proptest::prelude::*;
    use sadhya_core::{DeliveryAddress, Junction, JunctionKind, LineItem};

    fn items() -> Vec<LineItem> {
        vec![
            LineItem {
                item_number: 1,
                name: "Veg Sadhya".into(),
                unit_price: 150,
                quantity: 2,
            },
            LineItem {
                item_number: 4,
                name: "Parippu/Gothambu Payasam".into(),
                unit_price: 40,
                quantity: 1,
            },
        ]
    }

    fn junction(kind: JunctionKind) -> Junction {
        Junction {
            id: "j".into(),
            name: "J".into(),
            kind,
            delivery_fee: if kind == JunctionKind::Delivery { 50 } else { 0 },
        }
    }

    fn draft(kind: JunctionKind) -> DraftOrder {
        DraftOrder {
            delivery_date: NaiveDate::from_ymd_opt(2026, 8, 24),
            junction: Some(junction(kind)),
            line_items: items(),
            delivery_address: Some(DeliveryAddress::Text {
                text: "MG Road".into(),
            }),
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 20, 10, 0, 0).unwrap()
    }

    #[test]
    fn delivery_total_includes_fee() {
        let order = finalize(
            &draft(JunctionKind::Delivery),
            OrderId("EO260820AAAAAA".into()),
            "919800000001",
            "whatsapp-media:m1".into(),
            now(),
        )
        .unwrap();
        assert_eq!(order.total, 390);
        assert_eq!(order.delivery_fee, 50);
        assert_eq!(order.recomputed_total(), order.total);
        assert_eq!(order.verification_status, VerificationStatus::Pending);
    }

    #[test]
    fn pickup_total_and_no_address() {
        let order = finalize(
            &draft(JunctionKind::Pickup),
            OrderId("EO260820BBBBBB".into()),
            "919800000001",
            "whatsapp-media:m1".into(),
            now(),
        )
        .unwrap();
        assert_eq!(order.total, 340);
        assert!(order.delivery_address.is_none());
    }

    #[test]
    fn incomplete_drafts_are_refused() {
        let mut d = draft(JunctionKind::Delivery);
        d.delivery_address = None;
        assert_eq!(
            finalize(&d, OrderId("x".into()), "p", "r".into(), now()),
            Err(IncompleteDraft::MissingAddress)
        );
        d.line_items.clear();
        assert_eq!(
            finalize(&d, OrderId("x".into()), "p", "r".into(), now()),
            Err(IncompleteDraft::NoItems)
        );
    }

    proptest! {
        #[test]
        fn total_is_always_recomputable(
            lines in prop::collection::vec((1u32..=6, 1u64..=500, 1u32..=50), 1..6),
            delivery in any::<bool>(),
            fee in 0u64..=200,
        ) {
            let kind = if delivery { JunctionKind::Delivery } else { JunctionKind::Pickup };
            let mut d = draft(kind);
            d.junction = Some(Junction { delivery_fee: if delivery { fee } else { 0 }, ..junction(kind) });
            d.line_items = lines
                .iter()
                .map(|(n, price, qty)| LineItem {
                    item_number: *n,
                    name: format!("item {n}"),
                    unit_price: *price,
                    quantity: *qty,
                })
                .collect();
            let order = finalize(&d, OrderId("EO".into()), "p", "r".into(), now()).unwrap();
            let expected: u64 = lines.iter().map(|(_, p, q)| p * u64::from(*q)).sum::<u64>()
                + if delivery { fee } else { 0 };
            prop_assert_eq!(order.total, expected);
            prop_assert_eq!(order.recomputed_total(), order.total);
        }
    }
}
