// SPDX-FileCopyrightText: 2026 Sadhya Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! External order snapshot sink (the order spreadsheet).

use async_trait::async_trait;

use crate::error::SadhyaError;
use crate::traits::adapter::PluginAdapter;
use crate::types::Order;

#[async_trait]
pub trait OrderSink: PluginAdapter {
    /// Inserts or replaces the snapshot of `order`, keyed by its order id.
    async fn record_order(&self, order: &Order) -> Result<(), SadhyaError>;
}
