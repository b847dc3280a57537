// SPDX-FileCopyrightText: 2026 Sadhya Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Sadhya integration tests.
//!
//! Provides mock collaborators and test harness infrastructure for fast,
//! deterministic, CI-runnable tests without external services.
//!
//! # Components
//!
//! - [`MockDispatcher`] - Mock channel capturing outbound intents
//! - [`MockArtifactStore`] / [`MockOrderSink`] - Mock proof archive and spreadsheet
//! - [`FixedClock`] / [`SequentialIds`] - Deterministic time and identifiers
//! - [`TestHarness`] - The flow stack wired over temp storage

pub mod clock;
pub mod harness;
pub mod mock_channel;
pub mod mock_sinks;

pub use clock::{FixedClock, SequentialIds};
pub use harness::{ADMIN_PHONE, TestHarness};
pub use mock_channel::MockDispatcher;
pub use mock_sinks::{MockArtifactStore, MockOrderSink};
