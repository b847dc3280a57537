// SPDX-FileCopyrightText: 2026 Sadhya Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Verification tokens and the single-use consume.

use rusqlite::{Connection, OptionalExtension, Row, params};
use sadhya_core::{
    ConsumeOutcome, OrderId, SadhyaError, TokenAction, TokenConsumption, VerificationToken,
};

use super::{decode_enum, decode_opt_ts, decode_ts, encode_ts};
use crate::database::{Database, map_tr_err};
use crate::queries::{orders, outbox, sessions};

fn token_from_row(row: &Row<'_>) -> rusqlite::Result<VerificationToken> {
    let action: String = row.get(2)?;
    Ok(VerificationToken {
        token: row.get(0)?,
        order_id: OrderId(row.get(1)?),
        action: decode_enum(2, &action)?,
        consumed_at: decode_opt_ts(3, row.get(3)?)?,
        created_at: decode_ts(4, row.get(4)?)?,
    })
}

pub(crate) fn insert_token(conn: &Connection, token: &VerificationToken) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO verification_tokens (token, order_id, action, consumed_at, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            token.token,
            token.order_id.0,
            token.action.to_string(),
            token.consumed_at.map(encode_ts),
            encode_ts(token.created_at),
        ],
    )?;
    Ok(())
}

/// Look up a token by its value.
pub async fn get_token(db: &Database, token: &str) -> Result<Option<VerificationToken>, SadhyaError> {
    let token = token.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT token, order_id, action, consumed_at, created_at
                 FROM verification_tokens WHERE token = ?1",
                params![token],
                token_from_row,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Both tokens of an order, verify first.
pub async fn tokens_for_order(
    db: &Database,
    order_id: &OrderId,
) -> Result<Vec<VerificationToken>, SadhyaError> {
    let order_id = order_id.0.clone();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT token, order_id, action, consumed_at, created_at
                 FROM verification_tokens WHERE order_id = ?1
                 ORDER BY CASE action WHEN 'verify' THEN 0 ELSE 1 END",
            )?;
            let rows = stmt.query_map(params![order_id], token_from_row)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Consume a token and its sibling, and apply the decision, in one transaction.
///
/// The `UPDATE ... WHERE consumed_at IS NULL` is the compare-and-swap: only
/// the first caller changes rows, every later caller sees `AlreadyConsumed`.
pub async fn consume_token_pair(
    db: &Database,
    consumption: TokenConsumption,
) -> Result<ConsumeOutcome, SadhyaError> {
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;

            let found = tx
                .query_row(
                    "SELECT order_id, action, consumed_at FROM verification_tokens WHERE token = ?1",
                    params![consumption.token],
                    |row| {
                        let action: String = row.get(1)?;
                        Ok((
                            row.get::<_, String>(0)?,
                            decode_enum::<TokenAction>(1, &action)?,
                            row.get::<_, Option<String>>(2)?,
                        ))
                    },
                )
                .optional()?;
            let Some((order_id, action, consumed_at)) = found else {
                return Ok(ConsumeOutcome::TokenMissing);
            };
            if consumed_at.is_some() {
                return Ok(ConsumeOutcome::AlreadyConsumed);
            }

            let consumed_at = encode_ts(consumption.consumed_at);
            let claimed = tx.execute(
                "UPDATE verification_tokens SET consumed_at = ?2
                 WHERE order_id = ?1 AND consumed_at IS NULL",
                params![order_id, consumed_at],
            )?;
            if claimed == 0 {
                return Ok(ConsumeOutcome::AlreadyConsumed);
            }

            let updated = tx.execute(
                "UPDATE orders SET verification_status = ?2, updated_at = ?3
                 WHERE order_id = ?1 AND verification_status = 'pending'",
                params![order_id, action.resulting_status().to_string(), consumed_at],
            )?;
            if updated == 0 {
                // Rolls back the token claim.
                return Ok(ConsumeOutcome::OrderMissing);
            }

            if let Some(update) = &consumption.session {
                // Skipped, not failed, when the session moved on.
                sessions::write_session(&tx, &update.session, Some(update.expected_version))?;
            }
            outbox::insert_jobs(&tx, &consumption.jobs, consumption.consumed_at)?;

            let order = orders::select_order(&tx, &order_id)?;
            tx.commit()?;
            Ok(match order {
                Some(order) => ConsumeOutcome::Consumed(order),
                None => ConsumeOutcome::OrderMissing,
            })
        })
        .await
        .map_err(map_tr_err)
}
