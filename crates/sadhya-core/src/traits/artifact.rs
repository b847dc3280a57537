// SPDX-FileCopyrightText: 2026 Sadhya Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Durable storage for uploaded payment proofs.

use async_trait::async_trait;

use crate::error::SadhyaError;
use crate::traits::adapter::PluginAdapter;
use crate::types::OrderId;

#[async_trait]
pub trait ArtifactStore: PluginAdapter {
    /// Fetches the channel media `media_id` and stores it as the payment
    /// proof of `order_id`. Returns an opaque reference to the stored copy.
    ///
    /// Storing the same proof twice must be harmless.
    async fn store_payment_proof(
        &self,
        order_id: &OrderId,
        media_id: &str,
    ) -> Result<String, SadhyaError>;
}
