// SPDX-FileCopyrightText: 2026 Sadhya Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! WhatsApp Cloud API adapter for the Sadhya ordering bot.
//!
//! - [`WhatsAppDispatcher`] delivers outbound intents.
//! - [`MediaArchive`] archives payment screenshots.
//! - [`webhook`] verifies and parses inbound webhook bodies.

pub mod dispatcher;
pub mod media;
pub mod webhook;

pub use dispatcher::WhatsAppDispatcher;
pub use media::MediaArchive;
pub use webhook::{SIGNATURE_HEADER, parse_webhook, sign, verify_signature};
