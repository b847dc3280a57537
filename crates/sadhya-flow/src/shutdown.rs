// SPDX-FileCopyrightText: 2026 Sadhya Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Graceful shutdown coordination with signal handling.
//!
//! Installs handlers for SIGTERM and SIGINT (Ctrl+C), triggering a
//! [`CancellationToken`] that the HTTP server, outbox worker and reaper
//! monitor. Background tasks are awaited with a deadline before exit.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Installs signal handlers for SIGTERM and SIGINT.
///
/// Returns a [`CancellationToken`] that is cancelled when either signal is received.
pub fn install_signal_handler() -> CancellationToken {
    let token = CancellationToken::new();
    let token_clone = token.clone();

    tokio::spawn(async move {
        wait_for_signal().await;
        token_clone.cancel();
        debug!("shutdown signal handler completed");
    });

    token
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(s) => s,
        Err(e) => {
            warn!(error = %e, "failed to install SIGTERM handler, using Ctrl+C only");
            let _ = tokio::signal::ctrl_c().await;
            info!("received SIGINT (Ctrl+C), initiating shutdown");
            return;
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("received SIGINT (Ctrl+C), initiating shutdown");
        }
        _ = sigterm.recv() => {
            info!("received SIGTERM, initiating shutdown");
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("received Ctrl+C, initiating shutdown");
}

/// Waits for background tasks, giving up after `timeout`.
pub async fn drain_tasks(tasks: Vec<(&'static str, JoinHandle<()>)>, timeout: Duration) {
    if tasks.is_empty() {
        info!("no background tasks to drain");
        return;
    }

    info!(count = tasks.len(), "waiting for background tasks to finish");
    let deadline = tokio::time::Instant::now() + timeout;
    for (name, handle) in tasks {
        match tokio::time::timeout_at(deadline, handle).await {
            Ok(Ok(())) => debug!(task = name, "task finished"),
            Ok(Err(e)) => warn!(task = name, error = %e, "task ended abnormally"),
            Err(_) => warn!(task = name, "timeout reached, task interrupted"),
        }
    }
}
