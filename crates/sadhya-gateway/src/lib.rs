// SPDX-FileCopyrightText: 2026 Sadhya Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP gateway for the Sadhya ordering bot.
//!
//! Receives the WhatsApp webhook, serves the admin verification links, the
//! health and order status endpoints, and the bearer-protected catalog
//! administration API. Webhook events are acknowledged immediately and fed
//! to the [`sadhya_flow::FlowEngine`] on background tasks.

pub mod admin;
pub mod auth;
pub mod handlers;
pub mod server;
pub mod verify;

pub use auth::AuthConfig;
pub use server::{
    CatalogReloader, GatewayState, HealthState, ServerConfig, WebhookConfig, router, start_server,
};
