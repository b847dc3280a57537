// SPDX-FileCopyrightText: 2026 Sadhya Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Spreadsheet row layout of an order snapshot.

use chrono::{DateTime, FixedOffset, Utc};
use sadhya_core::Order;

/// Header row written to an empty worksheet. Column A is the lookup key.
pub const HEADERS: [&str; 14] = [
    "Order ID",
    "Phone Number",
    "Delivery Date",
    "Junction",
    "Fulfilment",
    "Items",
    "Address",
    "Subtotal",
    "Delivery Fee",
    "Total",
    "Payment Proof",
    "Verification Status",
    "Created At",
    "Updated At",
];

/// Column letter of the last header.
pub const LAST_COLUMN: char = 'N';

fn rupees(amount: u64) -> String {
    format!("₹{amount}")
}

fn local(ts: DateTime<Utc>, offset: FixedOffset) -> String {
    ts.with_timezone(&offset).format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Renders `order` as one row matching [`HEADERS`].
pub fn order_row(order: &Order, offset: FixedOffset) -> Vec<String> {
    let items = order
        .line_items
        .iter()
        .map(|l| format!("{} x{} ({})", l.name, l.quantity, rupees(l.amount())))
        .collect::<Vec<_>>()
        .join("; ");

    vec![
        order.order_id.to_string(),
        order.phone.clone(),
        order.delivery_date.format("%Y-%m-%d").to_string(),
        order.junction.name.clone(),
        order.junction.kind.to_string(),
        items,
        order
            .delivery_address
            .as_ref()
            .map(|a| a.display())
            .unwrap_or_default(),
        rupees(order.subtotal()),
        rupees(order.delivery_fee),
        rupees(order.total),
        order.payment_proof_ref.clone().unwrap_or_default(),
        order.verification_status.to_string(),
        local(order.created_at, offset),
        local(order.updated_at, offset),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};
    use sadhya_core::{
        DeliveryAddress, Junction, JunctionKind, LineItem, OrderId, VerificationStatus,
    };

    fn order() -> Order {
        let created = Utc.with_ymd_and_hms(2026, 8, 20, 4, 30, 0).unwrap();
        Order {
            order_id: OrderId("EO260820K3J9QZ".into()),
            phone: "919800000001".into(),
            delivery_date: NaiveDate::from_ymd_opt(2026, 8, 24).unwrap(),
            junction: Junction {
                id: "vyttila_delivery".into(),
                name: "Vyttila".into(),
                kind: JunctionKind::Delivery,
                delivery_fee: 50,
            },
            line_items: vec![
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
            ],
            delivery_address: Some(DeliveryAddress::Text {
                text: "12 Temple Road".into(),
            }),
            delivery_fee: 50,
            total: 390,
            payment_proof_ref: None,
            verification_status: VerificationStatus::Pending,
            created_at: created,
            updated_at: created,
        }
    }

    #[test]
    fn row_matches_header_width_and_content() {
        let ist = FixedOffset::east_opt(330 * 60).unwrap();
        let row = order_row(&order(), ist);
        assert_eq!(row.len(), HEADERS.len());
        assert_eq!(row[0], "EO260820K3J9QZ");
        assert_eq!(row[4], "delivery");
        assert_eq!(row[5], "Veg Sadhya x2 (₹300); Palada Pradhaman x1 (₹40)");
        assert_eq!(row[6], "12 Temple Road");
        assert_eq!(row[7], "₹340");
        assert_eq!(row[9], "₹390");
        assert_eq!(row[10], "");
        assert_eq!(row[11], "pending");
        assert_eq!(row[12], "2026-08-20 10:00:00");
    }

    #[test]
    fn last_column_matches_header_count() {
        assert_eq!((b'A' + HEADERS.len() as u8 - 1) as char, LAST_COLUMN);
    }
}
