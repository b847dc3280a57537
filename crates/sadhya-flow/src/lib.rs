// SPDX-FileCopyrightText: 2026 Sadhya Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation flow for the Sadhya ordering bot.
//!
//! - [`FlowEngine`] applies inbound chat events to sessions through the
//!   pure state machine in [`machine`].
//! - [`VerificationService`] resolves the admin verify/reject links.
//! - [`OutboxWorker`] delivers recorded side effects with retries.
//! - [`SessionReaper`] abandons idle sessions and prunes old state.

pub mod catalog;
pub mod engine;
pub mod ids;
pub mod locks;
pub mod machine;
pub mod order;
pub mod outbox;
pub mod parser;
pub mod prompts;
pub mod reaper;
pub mod settings;
pub mod shutdown;
pub mod verification;

pub use catalog::SnapshotCatalog;
pub use engine::{EventOutcome, FlowEngine};
pub use ids::{IdGenerator, RandomIds};
pub use locks::KeyedLocks;
pub use machine::{Step, StepInput, StepOutcome, step};
pub use outbox::{JobReport, OutboxSettings, OutboxWorker};
pub use parser::{ParsedInput, ValidationError};
pub use reaper::{ReapReport, ReaperSettings, SessionReaper};
pub use settings::FlowSettings;
pub use verification::{VerificationOutcome, VerificationService};
