// SPDX-FileCopyrightText: 2026 Sadhya Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Deterministic time and identifiers.

use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

use chrono::{DateTime, NaiveDate, TimeDelta, TimeZone, Utc};

use sadhya_core::{Clock, OrderId};
use sadhya_flow::IdGenerator;

/// A clock that only moves when told to.
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    /// 2026-08-20 10:00 in Kochi (04:30 UTC).
    pub fn default_start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 20, 4, 30, 0)
            .single()
            .unwrap_or_default()
    }

    pub fn set(&self, now: DateTime<Utc>) {
        if let Ok(mut guard) = self.now.lock() {
            *guard = now;
        }
    }

    pub fn advance(&self, delta: TimeDelta) {
        if let Ok(mut guard) = self.now.lock() {
            *guard += delta;
        }
    }
}

impl Default for FixedClock {
    fn default() -> Self {
        Self::new(Self::default_start())
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.now
            .lock()
            .map(|g| *g)
            .unwrap_or_else(|poisoned| *poisoned.into_inner())
    }
}

/// Predictable ids: `EO{YYMMDD}TEST{nn}` and `token-{n}`.
#[derive(Default)]
pub struct SequentialIds {
    orders: AtomicU32,
    tokens: AtomicU32,
}

impl SequentialIds {
    pub fn new() -> Self {
        Self::default()
    }
}

impl IdGenerator for SequentialIds {
    fn order_id(&self, date: NaiveDate) -> OrderId {
        let n = self.orders.fetch_add(1, Ordering::SeqCst) + 1;
        OrderId(format!("EO{}TEST{n:02}", date.format("%y%m%d")))
    }

    fn token(&self) -> String {
        let n = self.tokens.fetch_add(1, Ordering::SeqCst) + 1;
        format!("token-{n}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_clock_moves_only_on_request() {
        let clock = FixedClock::default();
        let start = clock.now();
        assert_eq!(clock.now(), start);
        clock.advance(TimeDelta::hours(2));
        assert_eq!(clock.now(), start + TimeDelta::hours(2));
    }

    #[test]
    fn sequential_ids_are_predictable() {
        let ids = SequentialIds::new();
        let date = NaiveDate::from_ymd_opt(2026, 8, 20).unwrap();
        assert_eq!(ids.order_id(date).as_str(), "EO260820TEST01");
        assert_eq!(ids.order_id(date).as_str(), "EO260820TEST02");
        assert_eq!(ids.token(), "token-1");
    }
}
