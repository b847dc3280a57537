// SPDX-FileCopyrightText: 2026 Sadhya Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Outbound dispatcher trait for the messaging channel.

use async_trait::async_trait;

use crate::error::SadhyaError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{MessageId, OutboundIntent};

/// Delivers outbound intents (text, reply buttons, images) to a phone.
///
/// Inbound traffic arrives through the webhook, so this side of the channel
/// only sends.
#[async_trait]
pub trait ChannelAdapter: PluginAdapter {
    /// Sends one intent and returns the provider's message id.
    async fn send(&self, intent: &OutboundIntent) -> Result<MessageId, SadhyaError>;
}
