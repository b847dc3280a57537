// SPDX-FileCopyrightText: 2026 Sadhya Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `sadhya order <id>` command implementation.
//!
//! Reads the order and the state of its verification links straight from
//! the database. Token values are never printed.

use std::path::Path;

use chrono::{DateTime, FixedOffset, Utc};
use serde::Serialize;

use sadhya_config::SadhyaConfig;
use sadhya_core::{Order, OrderId, SadhyaError, StorageAdapter, TokenAction, VerificationToken};
use sadhya_storage::SqliteStorage;

/// State of one verification link.
#[derive(Debug, Serialize)]
pub struct LinkState {
    pub action: TokenAction,
    pub consumed_at: Option<DateTime<Utc>>,
}

/// Structured output for `--json` mode.
#[derive(Debug, Serialize)]
pub struct OrderReport {
    pub order: Order,
    pub links: Vec<LinkState>,
}

impl OrderReport {
    pub fn new(order: Order, tokens: &[VerificationToken]) -> Self {
        Self {
            order,
            links: tokens
                .iter()
                .map(|t| LinkState {
                    action: t.action,
                    consumed_at: t.consumed_at,
                })
                .collect(),
        }
    }
}

/// Run the `sadhya order` command.
pub async fn run_order(config: &SadhyaConfig, id: &str, json: bool) -> Result<(), SadhyaError> {
    let db_path = &config.storage.database_path;
    if !Path::new(db_path).exists() {
        return Err(SadhyaError::NotFound {
            kind: "database".into(),
            id: db_path.clone(),
        });
    }

    let storage = SqliteStorage::new(config.storage.clone());
    storage.initialize().await?;
    let report = lookup(&storage, &OrderId(id.trim().to_uppercase())).await;
    storage.close().await?;
    let report = report?;

    if json {
        let out = serde_json::to_string_pretty(&report)
            .map_err(|e| SadhyaError::Internal(format!("failed to encode order: {e}")))?;
        println!("{out}");
    } else {
        let offset = FixedOffset::east_opt(config.bot.utc_offset_minutes * 60)
            .ok_or_else(|| SadhyaError::Config("bot.utc_offset_minutes out of range".into()))?;
        print!("{}", render(&report, offset));
    }
    Ok(())
}

/// Loads an order and its links.
pub async fn lookup(
    storage: &dyn StorageAdapter,
    order_id: &OrderId,
) -> Result<OrderReport, SadhyaError> {
    let order = storage
        .get_order(order_id)
        .await?
        .ok_or_else(|| SadhyaError::NotFound {
            kind: "order".into(),
            id: order_id.to_string(),
        })?;
    let tokens = storage.tokens_for_order(order_id).await?;
    Ok(OrderReport::new(order, &tokens))
}

fn local(ts: DateTime<Utc>, offset: FixedOffset) -> String {
    ts.with_timezone(&offset).format("%Y-%m-%d %H:%M").to_string()
}

/// Human readable order card.
pub fn render(report: &OrderReport, offset: FixedOffset) -> String {
    let order = &report.order;
    let mut out = String::new();
    out.push_str(&format!("\n  order {}\n", order.order_id));
    out.push_str(&format!("  {}\n", "-".repeat(40)));
    out.push_str(&format!("    Status:     {}\n", order.verification_status));
    out.push_str(&format!(
        "    Customer:   {}\n",
        sadhya_core::redact_phone(&order.phone)
    ));
    out.push_str(&format!(
        "    Date:       {}\n",
        order.delivery_date.format("%a %d %b %Y")
    ));
    out.push_str(&format!(
        "    Junction:   {} ({})\n",
        order.junction.name, order.junction.kind
    ));
    if let Some(address) = &order.delivery_address {
        out.push_str(&format!("    Address:    {}\n", address.display()));
    }
    out.push_str("    Items:\n");
    for item in &order.line_items {
        out.push_str(&format!(
            "      {} x {} = ₹{}\n",
            item.name,
            item.quantity,
            item.amount()
        ));
    }
    if order.delivery_fee > 0 {
        out.push_str(&format!("    Delivery:   ₹{}\n", order.delivery_fee));
    }
    out.push_str(&format!("    Total:      ₹{}\n", order.total));
    out.push_str(&format!(
        "    Proof:      {}\n",
        order.payment_proof_ref.as_deref().unwrap_or("not received")
    ));
    for link in &report.links {
        let state = match link.consumed_at {
            Some(at) => format!("used {}", local(at, offset)),
            None => "unused".to_string(),
        };
        out.push_str(&format!("    {:<11} {state}\n", format!("{} link:", link.action)));
    }
    out.push_str(&format!("    Created:    {}\n", local(order.created_at, offset)));
    out.push_str(&format!("    Updated:    {}\n", local(order.updated_at, offset)));
    out.push('\n');
    out
}
