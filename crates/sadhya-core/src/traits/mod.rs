// SPDX-FileCopyrightText: 2026 Sadhya Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Collaborator trait definitions.
//!
//! All adapters extend the [`PluginAdapter`] base trait and use
//! `#[async_trait]` for dynamic dispatch compatibility.

pub mod adapter;
pub mod artifact;
pub mod channel;
pub mod sink;
pub mod storage;

pub use adapter::PluginAdapter;
pub use artifact::ArtifactStore;
pub use channel::ChannelAdapter;
pub use sink::OrderSink;
pub use storage::StorageAdapter;
