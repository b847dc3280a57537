// SPDX-FileCopyrightText: 2026 Sadhya Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `sadhya catalog list` and `sadhya catalog preview`.

use chrono::{NaiveDate, Utc};

use sadhya_config::SadhyaConfig;
use sadhya_core::{CatalogSnapshot, DraftOrder, OutboundIntent, SadhyaError};
use sadhya_flow::parser::ParseContext;
use sadhya_flow::{FlowSettings, prompts};

const PREVIEW_RECIPIENT: &str = "preview";

/// Run `sadhya catalog list`.
pub fn run_list(config: &SadhyaConfig, json: bool) -> Result<(), SadhyaError> {
    let snapshot = config.catalog.to_snapshot();
    if json {
        let out = serde_json::to_string_pretty(&snapshot)
            .map_err(|e| SadhyaError::Internal(format!("failed to encode catalog: {e}")))?;
        println!("{out}");
    } else {
        print!("{}", render_list(&snapshot));
    }
    Ok(())
}

/// Run `sadhya catalog preview`.
pub fn run_preview(config: &SadhyaConfig) -> Result<(), SadhyaError> {
    let snapshot = config.catalog.to_snapshot();
    let settings = FlowSettings::from_config(config);
    let today = settings.local_date(Utc::now());
    print!("{}", render_preview(&snapshot, &settings, today));
    Ok(())
}

fn state_label(active: bool) -> &'static str {
    if active { "active" } else { "inactive" }
}

/// Operator table of every location and menu item.
pub fn render_list(snapshot: &CatalogSnapshot) -> String {
    let mut out = String::new();
    out.push_str("\n  Locations\n");
    out.push_str(&format!("  {}\n", "-".repeat(60)));
    for l in &snapshot.locations {
        out.push_str(&format!(
            "    {:<24} {:<16} {:<9} ₹{:<5} {}\n",
            l.id,
            l.name,
            l.kind.to_string(),
            l.fee,
            state_label(l.active)
        ));
    }

    out.push_str("\n  Menu\n");
    out.push_str(&format!("  {}\n", "-".repeat(60)));
    for item in &snapshot.menu {
        out.push_str(&format!(
            "    {:>3}. {:<32} ₹{:<6} {}\n",
            item.number,
            item.name,
            item.price,
            state_label(item.active)
        ));
    }
    out.push('\n');
    out
}

fn render_intent(intent: &OutboundIntent) -> String {
    let mut out = format!("{}\n", intent.body());
    if let OutboundIntent::Buttons { buttons, .. } = intent {
        for b in buttons {
            out.push_str(&format!("  [{}]  ({})\n", b.title, b.id));
        }
    }
    out
}

/// The date, junction and menu prompts a customer starting today would see.
pub fn render_preview(
    snapshot: &CatalogSnapshot,
    settings: &FlowSettings,
    today: NaiveDate,
) -> String {
    let context = ParseContext {
        today,
        min_lead_days: settings.min_lead_days,
        booking_window_days: settings.booking_window_days,
        max_quantity_per_item: settings.max_quantity_per_item,
        catalog: snapshot,
    };
    let dates = context.available_dates(prompts::BUTTONS_PER_MESSAGE);
    let first_date = context.earliest_date();

    let mut messages = vec![prompts::welcome(PREVIEW_RECIPIENT, settings, &dates)];
    messages.extend(prompts::date_accepted(PREVIEW_RECIPIENT, first_date, snapshot));
    let draft = DraftOrder {
        delivery_date: Some(first_date),
        junction: snapshot.active_locations().first().map(|l| l.to_junction()),
        ..DraftOrder::default()
    };
    messages.push(prompts::menu(PREVIEW_RECIPIENT, &draft, snapshot));

    let divider = format!("{}\n", "=".repeat(40));
    messages
        .iter()
        .map(render_intent)
        .collect::<Vec<_>>()
        .join(&divider)
}
