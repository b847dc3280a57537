// SPDX-FileCopyrightText: 2026 Sadhya Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Spreadsheet sync of order snapshots.
//!
//! [`SheetsSync`] upserts one row per order into a Google Sheets worksheet.
//! [`NoopSink`] stands in when `[sheets]` is disabled.

pub mod row;
pub mod sync;

use async_trait::async_trait;
use tracing::debug;

use sadhya_core::{AdapterType, HealthStatus, Order, OrderSink, PluginAdapter, SadhyaError};

pub use row::{HEADERS, order_row};
pub use sync::SheetsSync;

/// Order sink that only logs.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

#[async_trait]
impl PluginAdapter for NoopSink {
    fn name(&self) -> &str {
        "noop-sink"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::OrderSink
    }

    async fn health_check(&self) -> Result<HealthStatus, SadhyaError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), SadhyaError> {
        Ok(())
    }
}

#[async_trait]
impl OrderSink for NoopSink {
    async fn record_order(&self, order: &Order) -> Result<(), SadhyaError> {
        debug!(
            order_id = %order.order_id,
            status = %order.verification_status,
            "sheet sync disabled, skipping order snapshot"
        );
        Ok(())
    }
}
