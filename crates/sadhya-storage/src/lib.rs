// SPDX-FileCopyrightText: 2026 Sadhya Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persistence layer for the Sadhya ordering bot.
//!
//! Provides WAL-mode SQLite storage with embedded migrations and a
//! single-writer concurrency model via `tokio-rusqlite`, plus an in-memory
//! backend with identical commit semantics.
//!
//! All SQLite writes go through the one background thread owned by
//! [`Database`]. A transition commit or token consumption is a single
//! closure holding a single transaction. Do NOT create additional
//! connections for writes.

pub mod adapter;
pub mod database;
pub mod memory;
pub mod migrations;
pub mod queries;

pub use adapter::SqliteStorage;
pub use database::Database;
pub use memory::MemoryStorage;
