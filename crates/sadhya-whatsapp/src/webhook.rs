// SPDX-FileCopyrightText: 2026 Sadhya Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Inbound webhook handling: payload signatures and envelope parsing.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use tracing::debug;

use sadhya_core::{InboundEvent, InboundPayload, MessageId};

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the payload signature.
pub const SIGNATURE_HEADER: &str = "x-hub-signature-256";

/// Checks an `X-Hub-Signature-256` header (`sha256=<hex>`) against the raw
/// request body using the app secret. Comparison is constant time.
pub fn verify_signature(app_secret: &str, body: &[u8], header: Option<&str>) -> bool {
    let Some(hex_sig) = header.and_then(|h| h.trim().strip_prefix("sha256=")) else {
        return false;
    };
    let Ok(expected) = hex::decode(hex_sig) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(app_secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

/// Computes the header value the provider would send for `body`.
pub fn sign(app_secret: &str, body: &[u8]) -> String {
    // HMAC accepts keys of any length, so construction cannot fail.
    let mut mac = match HmacSha256::new_from_slice(app_secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return String::new(),
    };
    mac.update(body);
    format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
}

// --- Envelope ---

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    entry: Vec<Entry>,
}

#[derive(Debug, Deserialize)]
struct Entry {
    #[serde(default)]
    changes: Vec<Change>,
}

#[derive(Debug, Deserialize)]
struct Change {
    #[serde(default)]
    value: ChangeValue,
}

#[derive(Debug, Default, Deserialize)]
struct ChangeValue {
    #[serde(default)]
    contacts: Vec<Contact>,
    #[serde(default)]
    messages: Vec<WireMessage>,
}

#[derive(Debug, Deserialize)]
struct Contact {
    wa_id: String,
    #[serde(default)]
    profile: Option<Profile>,
}

#[derive(Debug, Deserialize)]
struct Profile {
    name: String,
}

#[derive(Debug, Deserialize)]
struct WireMessage {
    id: String,
    from: String,
    #[serde(default)]
    timestamp: Option<String>,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<WireText>,
    #[serde(default)]
    interactive: Option<WireInteractive>,
    #[serde(default)]
    button: Option<WireButton>,
    #[serde(default)]
    location: Option<WireLocation>,
    #[serde(default)]
    image: Option<WireImage>,
}

#[derive(Debug, Deserialize)]
struct WireText {
    body: String,
}

#[derive(Debug, Deserialize)]
struct WireInteractive {
    #[serde(default)]
    button_reply: Option<WireReply>,
    #[serde(default)]
    list_reply: Option<WireReply>,
}

#[derive(Debug, Deserialize)]
struct WireReply {
    id: String,
    title: String,
}

/// Quick-reply button on a template message.
#[derive(Debug, Deserialize)]
struct WireButton {
    payload: String,
    text: String,
}

#[derive(Debug, Deserialize)]
struct WireLocation {
    latitude: f64,
    longitude: f64,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    address: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireImage {
    id: String,
    #[serde(default)]
    mime_type: Option<String>,
    #[serde(default)]
    caption: Option<String>,
}

impl WireMessage {
    fn payload(self) -> InboundPayload {
        match self.kind.as_str() {
            "text" => match self.text {
                Some(t) => InboundPayload::Text { body: t.body },
                None => unsupported("text"),
            },
            "interactive" => match self.interactive.and_then(|i| i.button_reply.or(i.list_reply)) {
                Some(r) => InboundPayload::Selection {
                    id: r.id,
                    title: r.title,
                },
                None => unsupported("interactive"),
            },
            "button" => match self.button {
                Some(b) => InboundPayload::Selection {
                    id: b.payload,
                    title: b.text,
                },
                None => unsupported("button"),
            },
            "location" => match self.location {
                Some(l) => InboundPayload::Location {
                    latitude: l.latitude,
                    longitude: l.longitude,
                    name: l.name,
                    address: l.address,
                },
                None => unsupported("location"),
            },
            "image" => match self.image {
                Some(i) => InboundPayload::Image {
                    media_id: i.id,
                    mime_type: i.mime_type,
                    caption: i.caption,
                },
                None => unsupported("image"),
            },
            other => unsupported(other),
        }
    }
}

fn unsupported(kind: &str) -> InboundPayload {
    InboundPayload::Unsupported {
        kind: kind.to_string(),
    }
}

/// Normalizes a webhook body into inbound events, in delivery order.
///
/// Status callbacks (sent/delivered/read) carry no messages and yield
/// nothing. Messages without a usable timestamp are stamped with
/// `received_at`.
pub fn parse_webhook(
    body: &[u8],
    received_at: DateTime<Utc>,
) -> Result<Vec<InboundEvent>, serde_json::Error> {
    let envelope: Envelope = serde_json::from_slice(body)?;

    let mut events = Vec::new();
    for change in envelope.entry.into_iter().flat_map(|e| e.changes) {
        let ChangeValue { contacts, messages } = change.value;
        for message in messages {
            let profile_name = contacts
                .iter()
                .find(|c| c.wa_id == message.from)
                .and_then(|c| c.profile.as_ref())
                .map(|p| p.name.clone());
            let sent_at = message
                .timestamp
                .as_deref()
                .and_then(|t| t.parse::<i64>().ok())
                .and_then(|secs| DateTime::from_timestamp(secs, 0))
                .unwrap_or(received_at);

            events.push(InboundEvent {
                message_id: MessageId(message.id.clone()),
                phone: message.from.clone(),
                profile_name,
                received_at: sent_at,
                payload: message.payload(),
            });
        }
    }

    debug!(count = events.len(), "parsed webhook envelope");
    Ok(events)
}
