// SPDX-FileCopyrightText: 2026 Sadhya Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Customer and admin message texts.
//!
//! Every builder returns channel-agnostic [`OutboundIntent`]s; formatting
//! uses WhatsApp's `*bold*` markup since that is the only channel.

use chrono::NaiveDate;

use sadhya_core::{
    CatalogSnapshot, DraftOrder, JunctionKind, LineItem, Order, OrderId, OutboundIntent,
    ReplyButton, TokenAction, VerificationToken,
};

use crate::settings::FlowSettings;

/// WhatsApp rejects reply-button titles longer than this.
pub const BUTTON_TITLE_LIMIT: usize = 20;

/// WhatsApp allows at most this many reply buttons per message.
pub const BUTTONS_PER_MESSAGE: usize = 3;

fn long_date(date: NaiveDate) -> String {
    date.format("%d %B %Y").to_string()
}

fn short_date(date: NaiveDate) -> String {
    date.format("%d %b %Y").to_string()
}

fn truncate_title(title: &str) -> String {
    title.chars().take(BUTTON_TITLE_LIMIT).collect()
}

fn date_buttons(dates: &[NaiveDate]) -> Vec<ReplyButton> {
    dates
        .iter()
        .take(BUTTONS_PER_MESSAGE)
        .map(|d| ReplyButton {
            id: format!("{}{}", crate::parser::DATE_BUTTON_PREFIX, d.format("%Y-%m-%d")),
            title: short_date(*d),
        })
        .collect()
}

fn with_buttons(to: &str, body: String, buttons: Vec<ReplyButton>) -> OutboundIntent {
    if buttons.is_empty() {
        OutboundIntent::text(to, body)
    } else {
        OutboundIntent::Buttons {
            to: to.to_string(),
            body,
            buttons,
        }
    }
}

/// Greeting plus the first bookable dates as buttons.
pub fn welcome(to: &str, settings: &FlowSettings, dates: &[NaiveDate]) -> OutboundIntent {
    let body = format!(
        "🎉 *Welcome to {}!* 🎉\n\n\
         Let's start by selecting your preferred delivery date.\n\n\
         Please choose a date (minimum {} days in advance):",
        settings.bot_name, settings.min_lead_days
    );
    with_buttons(to, body, date_buttons(dates))
}

/// Date prompt repeated after a rejected date, listing what is bookable.
pub fn date_retry(to: &str, reason: &str, dates: &[NaiveDate]) -> OutboundIntent {
    let list = dates
        .iter()
        .map(|d| format!("• {}", short_date(*d)))
        .collect::<Vec<_>>()
        .join("\n");
    let body = format!(
        "{reason}\n\nAvailable dates:\n\n{list}\n\n\
         Tap a button or type the date in YYYY-MM-DD format."
    );
    with_buttons(to, body, date_buttons(dates))
}

/// Text listing active locations with their fees, delivery first.
pub fn location_summary(catalog: &CatalogSnapshot) -> String {
    let active = catalog.active_locations();
    let mut text = String::new();

    let delivery: Vec<_> = active
        .iter()
        .filter(|l| l.kind == JunctionKind::Delivery)
        .collect();
    if !delivery.is_empty() {
        text.push_str("*Delivery Locations*:\n");
        for l in delivery {
            if l.fee > 0 {
                text.push_str(&format!("• {} (₹{} delivery fee)\n", l.name, l.fee));
            } else {
                text.push_str(&format!("• {} (Free delivery)\n", l.name));
            }
        }
        text.push('\n');
    }

    let pickup: Vec<_> = active
        .iter()
        .filter(|l| l.kind == JunctionKind::Pickup)
        .collect();
    if !pickup.is_empty() {
        text.push_str("*Pickup Locations*:\n");
        for l in pickup {
            text.push_str(&format!("• {} (No extra fee)\n", l.name));
        }
    }
    text
}

/// Location buttons in groups of [`BUTTONS_PER_MESSAGE`], delivery first.
pub fn junction_button_groups(catalog: &CatalogSnapshot) -> Vec<Vec<ReplyButton>> {
    let buttons: Vec<ReplyButton> = catalog
        .active_locations()
        .into_iter()
        .map(|l| {
            let title = match l.kind {
                JunctionKind::Delivery if l.fee > 0 => format!("{} (₹{})", l.name, l.fee),
                _ => l.name.clone(),
            };
            ReplyButton {
                id: l.id.clone(),
                title: truncate_title(&title),
            }
        })
        .collect();
    buttons
        .chunks(BUTTONS_PER_MESSAGE)
        .map(<[ReplyButton]>::to_vec)
        .collect()
}

/// The junction question, split over as many messages as the buttons need.
pub fn junction_prompt(to: &str, header: &str, catalog: &CatalogSnapshot) -> Vec<OutboundIntent> {
    let intro = format!(
        "{header}Please select your preferred junction:\n\n{}",
        location_summary(catalog)
    );
    let groups = junction_button_groups(catalog);
    if groups.is_empty() {
        return vec![OutboundIntent::text(
            to,
            "Sorry, no pickup or delivery locations are open right now. Please try again later.",
        )];
    }
    groups
        .into_iter()
        .enumerate()
        .map(|(i, buttons)| {
            let body = if i == 0 {
                intro.clone()
            } else {
                "More options:".to_string()
            };
            with_buttons(to, body, buttons)
        })
        .collect()
}

/// Junction prompt after a date was accepted.
pub fn date_accepted(to: &str, date: NaiveDate, catalog: &CatalogSnapshot) -> Vec<OutboundIntent> {
    junction_prompt(
        to,
        &format!("✅ Date selected: *{}*\n\n", long_date(date)),
        catalog,
    )
}

/// How to write an order, appended to the menu and to menu rejections.
pub const MENU_FORMAT_HELP: &str = "Please reply with your order in this format:\n\
     *Example:* 1 x 2, 3 x 1 (item number x quantity)";

/// The menu, headed by the choices made so far.
pub fn menu(to: &str, draft: &DraftOrder, catalog: &CatalogSnapshot) -> OutboundIntent {
    let mut body = String::new();
    if let Some(junction) = &draft.junction {
        body.push_str(&format!("📍 Junction: *{}*\n", junction.name));
    }
    if let Some(date) = draft.delivery_date {
        body.push_str(&format!("📅 Date: *{}*\n", long_date(date)));
    }
    body.push_str("\n🍽️ *Our Menu:*\n\n");
    for item in catalog.active_menu() {
        body.push_str(&format!("*{}.* {} - ₹{}\n", item.number, item.name, item.price));
        if let Some(description) = &item.description {
            body.push_str(&format!("    _{description}_\n"));
        }
    }
    body.push('\n');
    body.push_str(MENU_FORMAT_HELP);
    OutboundIntent::text(to, body)
}

/// Menu rejection with the format restated.
pub fn menu_retry(to: &str, reason: &str) -> OutboundIntent {
    OutboundIntent::text(to, format!("{reason}\n\n{MENU_FORMAT_HELP}"))
}

fn item_line(item: &LineItem) -> String {
    format!("• {} x {} = ₹{}", item.name, item.quantity, item.amount())
}

/// Itemised lines, the delivery fee when one applies, and the total.
pub fn order_summary(line_items: &[LineItem], delivery_fee: Option<u64>, total: u64) -> String {
    let mut lines: Vec<String> = line_items.iter().map(item_line).collect();
    if let Some(fee) = delivery_fee {
        lines.push(format!("• Delivery Fee = ₹{fee}"));
    }
    lines.push(format!("\n💰 *Total: ₹{total}*"));
    lines.join("\n")
}

fn draft_summary(draft: &DraftOrder) -> String {
    let fee = draft
        .junction
        .as_ref()
        .filter(|j| j.is_delivery())
        .map(|j| j.delivery_fee);
    order_summary(&draft.line_items, fee, draft.total())
}

/// Summary plus the address request, for delivery orders.
pub fn address_request(to: &str, draft: &DraftOrder) -> OutboundIntent {
    OutboundIntent::text(
        to,
        format!(
            "📋 *Order Summary:*\n\n{}\n\n{ADDRESS_HELP}",
            draft_summary(draft)
        ),
    )
}

pub const ADDRESS_HELP: &str = "📍 Since you selected delivery, please share your delivery address.\n\n\
     You can either:\n\
     • Share your location using WhatsApp's location feature, OR\n\
     • Type your complete address";

/// `upi://pay` deep link for `amount`, when a UPI id is configured.
pub fn upi_link(settings: &FlowSettings, order_id: &OrderId, amount: u64) -> Option<String> {
    let upi_id = settings.upi_id.as_deref()?;
    Some(format!(
        "upi://pay?pa={}&pn={}&am={amount}&tn={}&cu=INR",
        urlencoding::encode(upi_id),
        urlencoding::encode(&settings.merchant_name),
        urlencoding::encode(&format!("Order {order_id}")),
    ))
}

/// Payment request: details, UPI link, and the QR image when configured.
pub fn payment_request(
    to: &str,
    order_id: &OrderId,
    draft: &DraftOrder,
    settings: &FlowSettings,
) -> Vec<OutboundIntent> {
    let total = draft.total();
    let mut body = format!(
        "💳 *Payment Details*\n\n\
         Order ID: *{order_id}*\n\
         Amount: *₹{total}*\n\n\
         📋 *Your Order:*\n{}\n\n",
        draft_summary(draft)
    );
    if let Some(link) = upi_link(settings, order_id, total) {
        body.push_str(&format!("Pay with any UPI app: {link}\n\n"));
    }
    body.push_str("After payment, send a screenshot of the transaction here.");

    let mut intents = vec![OutboundIntent::text(to, body)];
    if let Some(qr) = &settings.qr_image_url {
        intents.push(OutboundIntent::Image {
            to: to.to_string(),
            link: qr.clone(),
            caption: format!("Scan to pay ₹{total} for Order {order_id}"),
        });
    }
    intents
}

/// "Under verification" confirmation sent once the screenshot is in.
pub fn submission_confirmed(order: &Order, settings: &FlowSettings) -> OutboundIntent {
    OutboundIntent::text(
        &order.phone,
        format!(
            "✅ *Order Submitted Successfully!*\n\n\
             Order ID: *{}*\n\
             Amount: *₹{}*\n\
             Date: *{}*\n\n\
             Your payment screenshot has been received and is under verification.\n\
             You will receive a confirmation message once verified.\n\n\
             Thank you for ordering with {}! 🎉",
            order.order_id,
            order.total,
            long_date(order.delivery_date),
            settings.bot_name
        ),
    )
}

/// Verification link for `token`.
pub fn verification_link(base_url: &str, token: &VerificationToken) -> String {
    format!("{base_url}/{}/{}/", token.action.path_segment(), token.token)
}

/// Order details and both decision links, for one admin phone.
pub fn admin_notification(
    to: &str,
    order: &Order,
    tokens: &[VerificationToken],
    base_url: &str,
) -> OutboundIntent {
    let fee = order.is_delivery().then_some(order.delivery_fee);
    let mut body = format!(
        "🔔 *New order awaiting verification*\n\n\
         Order ID: *{}*\n\
         Customer: {}\n\
         Date: {}\n\
         Junction: {}\n",
        order.order_id,
        order.phone,
        long_date(order.delivery_date),
        order.junction.name,
    );
    if let Some(address) = &order.delivery_address {
        body.push_str(&format!("Address: {}\n", address.display()));
    }
    body.push_str(&format!(
        "\n{}\n\n",
        order_summary(&order.line_items, fee, order.total)
    ));
    if let Some(proof) = &order.payment_proof_ref {
        body.push_str(&format!("Payment proof: {proof}\n\n"));
    }
    for token in tokens {
        let label = match token.action {
            TokenAction::Verify => "✅ Verify",
            TokenAction::Reject => "❌ Reject",
        };
        body.push_str(&format!("{label}: {}\n", verification_link(base_url, token)));
    }
    OutboundIntent::text(to, body.trim_end().to_string())
}

/// Result message sent to the customer after an admin decision.
pub fn verification_result(order: &Order, verified: bool, settings: &FlowSettings) -> OutboundIntent {
    let body = if verified {
        format!(
            "✅ *Payment Verified!*\n\n\
             Order ID: *{}*\n\
             Amount: *₹{}*\n\
             Date: *{}*\n\n\
             Your order has been confirmed! We'll prepare your delicious sadhya.\n\n\
             Thank you for choosing {}! 🎉",
            order.order_id,
            order.total,
            long_date(order.delivery_date),
            settings.bot_name
        )
    } else {
        format!(
            "❌ *Payment Verification Failed*\n\n\
             Order ID: *{}*\n\n\
             There was an issue with your payment verification. \
             Please contact us or submit a new order by typing *start*.\n\n\
             We apologize for any inconvenience.",
            order.order_id
        )
    };
    OutboundIntent::text(&order.phone, body)
}

/// Reply while the admin has not decided yet.
pub fn awaiting_verification(to: &str, order_id: Option<&OrderId>) -> OutboundIntent {
    let order = order_id.map(|id| format!(" *{id}*")).unwrap_or_default();
    OutboundIntent::text(
        to,
        format!(
            "⏳ Your order{order} is awaiting payment verification. \
             We'll message you as soon as it is checked.\n\n\
             Type *start* to place another order."
        ),
    )
}

/// Reply in a finished session.
pub fn finished(to: &str, verified: bool) -> OutboundIntent {
    let status = if verified {
        "Your last order is confirmed."
    } else {
        "Your last order could not be verified."
    };
    OutboundIntent::text(to, format!("{status} Type *start* to place a new order."))
}

/// Reply in a session closed for inactivity.
pub fn expired(to: &str) -> OutboundIntent {
    OutboundIntent::text(
        to,
        "⌛ Your previous order session expired due to inactivity. \
         Type *start* to begin a new order.",
    )
}

/// Apology sent when a draft could not be turned into an order.
pub fn order_error(to: &str) -> OutboundIntent {
    OutboundIntent::text(
        to,
        "Sorry, something went wrong with your order. Let's start again.",
    )
}

/// Reply to a redelivered or conflicting message.
pub fn stale(to: &str, duplicate: bool) -> OutboundIntent {
    let body = if duplicate {
        "👍 We already received that message."
    } else {
        "We were still working on your previous message. Please send that again."
    };
    OutboundIntent::text(to, body)
}
