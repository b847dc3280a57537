// SPDX-FileCopyrightText: 2026 Sadhya Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Order persistence.

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, params};
use sadhya_core::{Order, OrderId, SadhyaError};

use super::{decode_enum, decode_ts, encode_ts, from_i64, from_json, to_i64, to_json};
use crate::database::{Database, map_tr_err};

const ORDER_COLUMNS: &str = "order_id, phone, delivery_date, junction, line_items, \
     delivery_address, delivery_fee, total, payment_proof_ref, verification_status, \
     created_at, updated_at";

fn order_from_row(row: &Row<'_>) -> rusqlite::Result<Order> {
    let delivery_date: String = row.get(2)?;
    let junction: String = row.get(3)?;
    let line_items: String = row.get(4)?;
    let address: Option<String> = row.get(5)?;
    let status: String = row.get(9)?;
    Ok(Order {
        order_id: OrderId(row.get(0)?),
        phone: row.get(1)?,
        delivery_date: NaiveDate::parse_from_str(&delivery_date, "%Y-%m-%d").map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(e))
        })?,
        junction: from_json(3, &junction)?,
        line_items: from_json(4, &line_items)?,
        delivery_address: address.map(|a| from_json(5, &a)).transpose()?,
        delivery_fee: from_i64(6, row.get(6)?)?,
        total: from_i64(7, row.get(7)?)?,
        payment_proof_ref: row.get(8)?,
        verification_status: decode_enum(9, &status)?,
        created_at: decode_ts(10, row.get(10)?)?,
        updated_at: decode_ts(11, row.get(11)?)?,
    })
}

pub(crate) fn insert_order(conn: &Connection, order: &Order) -> rusqlite::Result<()> {
    let address = order.delivery_address.as_ref().map(to_json).transpose()?;
    conn.execute(
        &format!(
            "INSERT INTO orders ({ORDER_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)"
        ),
        params![
            order.order_id.0,
            order.phone,
            order.delivery_date.format("%Y-%m-%d").to_string(),
            to_json(&order.junction)?,
            to_json(&order.line_items)?,
            address,
            to_i64(order.delivery_fee)?,
            to_i64(order.total)?,
            order.payment_proof_ref,
            order.verification_status.to_string(),
            encode_ts(order.created_at),
            encode_ts(order.updated_at),
        ],
    )?;
    Ok(())
}

pub(crate) fn select_order(conn: &Connection, order_id: &str) -> rusqlite::Result<Option<Order>> {
    conn.query_row(
        &format!("SELECT {ORDER_COLUMNS} FROM orders WHERE order_id = ?1"),
        params![order_id],
        order_from_row,
    )
    .optional()
}

/// Get an order by id.
pub async fn get_order(db: &Database, order_id: &OrderId) -> Result<Option<Order>, SadhyaError> {
    let order_id = order_id.0.clone();
    db.connection()
        .call(move |conn| select_order(conn, &order_id))
        .await
        .map_err(map_tr_err)
}

/// Replace the payment proof reference. Returns whether the order exists.
pub async fn set_payment_proof_ref(
    db: &Database,
    order_id: &OrderId,
    reference: &str,
    updated_at: DateTime<Utc>,
) -> Result<bool, SadhyaError> {
    let order_id = order_id.0.clone();
    let reference = reference.to_string();
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE orders SET payment_proof_ref = ?2, updated_at = ?3 WHERE order_id = ?1",
                params![order_id, reference, encode_ts(updated_at)],
            )?;
            Ok(changed == 1)
        })
        .await
        .map_err(map_tr_err)
}
