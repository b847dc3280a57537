// SPDX-FileCopyrightText: 2026 Sadhya Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Order id and verification token generation.

use chrono::NaiveDate;
use rand::Rng;
use rand::distributions::Alphanumeric;

use sadhya_core::OrderId;

/// Source of fresh identifiers. Swapped for a deterministic one in tests.
pub trait IdGenerator: Send + Sync + 'static {
    /// A new order id for an order placed on `date`.
    fn order_id(&self, date: NaiveDate) -> OrderId;

    /// A new unguessable verification token.
    fn token(&self) -> String;
}

/// `EO` + `YYMMDD` + 6 random uppercase alphanumerics, and UUID v4 tokens.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomIds;

impl IdGenerator for RandomIds {
    fn order_id(&self, date: NaiveDate) -> OrderId {
        let suffix: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .map(|b| char::from(b).to_ascii_uppercase())
            .take(6)
            .collect();
        OrderId(format!("EO{}{suffix}", date.format("%y%m%d")))
    }

    fn token(&self) -> String {
        uuid::Uuid::new_v4().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_id_shape() {
        let id = RandomIds.order_id(NaiveDate::from_ymd_opt(2026, 8, 20).unwrap());
        let id = id.as_str();
        assert_eq!(id.len(), 14);
        assert!(id.starts_with("EO260820"));
        assert!(
            id[8..]
                .chars()
                .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
        );
    }

    #[test]
    fn tokens_are_distinct_uuids() {
        let a = RandomIds.token();
        let b = RandomIds.token();
        assert_ne!(a, b);
        assert!(uuid::Uuid::parse_str(&a).is_ok());
    }
}
