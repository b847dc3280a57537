// SPDX-FileCopyrightText: 2026 Sadhya Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `sadhya serve` command implementation.
//!
//! Opens storage, builds the WhatsApp, archive and sheet collaborators (or
//! their offline stand-ins), and runs the HTTP gateway alongside the outbox
//! worker and the session reaper until SIGINT or SIGTERM.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use sadhya_config::{ConfigError, SadhyaConfig};
use sadhya_core::{ArtifactStore, ChannelAdapter, OrderSink, SadhyaError, StorageAdapter};
use sadhya_flow::shutdown::{drain_tasks, install_signal_handler};
use sadhya_flow::{
    FlowEngine, FlowSettings, KeyedLocks, OutboxSettings, OutboxWorker, ReaperSettings,
    SessionReaper, SnapshotCatalog, VerificationService,
};
use sadhya_gateway::{
    AuthConfig, CatalogReloader, GatewayState, HealthState, WebhookConfig, start_server,
};
use sadhya_sheets::{NoopSink, SheetsSync};
use sadhya_storage::{MemoryStorage, SqliteStorage};
use sadhya_whatsapp::{MediaArchive, WhatsAppDispatcher};

use crate::offline::{LogDispatcher, MediaReference};

/// How long background tasks get to finish after shutdown is requested.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

type MetricsRender = Option<Arc<dyn Fn() -> String + Send + Sync>>;

/// Runs the `sadhya serve` command.
///
/// `config_path` is re-read by `POST /admin/catalog/reload`; without it the
/// XDG search path is used again.
pub async fn run_serve(
    config: SadhyaConfig,
    config_path: Option<PathBuf>,
    in_memory: bool,
) -> Result<(), SadhyaError> {
    init_tracing(&config.bot.log_level);

    info!("starting sadhya serve");

    let storage = open_storage(&config, in_memory).await?;
    let prometheus_render = init_metrics(&config);

    let channel = build_channel(&config)?;
    let artifacts = build_artifacts(&config)?;
    let sink = build_sink(&config)?;

    let catalog = Arc::new(SnapshotCatalog::from_config(&config.catalog));
    let settings = FlowSettings::from_config(&config);
    let locks = Arc::new(KeyedLocks::new());

    let engine = Arc::new(
        FlowEngine::new(storage.clone(), catalog.clone(), settings.clone())
            .with_locks(locks.clone()),
    );
    let verification = Arc::new(VerificationService::new(
        storage.clone(),
        locks.clone(),
        settings,
    ));
    let outbox = Arc::new(OutboxWorker::new(
        storage.clone(),
        channel,
        artifacts,
        sink,
        OutboxSettings::from_config(&config.outbox),
    ));
    let reaper = Arc::new(SessionReaper::new(
        storage.clone(),
        locks,
        ReaperSettings::from_config(&config.bot),
    ));

    if config.whatsapp.app_secret.is_none() {
        warn!("whatsapp.app_secret not set, webhook signatures are not verified");
    }
    if config.server.admin_token.is_none() {
        warn!("server.admin_token not set, admin routes will refuse every request");
    }

    let state = GatewayState::new(engine, verification, storage.clone(), catalog)
        .with_webhook(WebhookConfig {
            verify_token: config.whatsapp.verify_token.clone(),
            app_secret: config.whatsapp.app_secret.clone(),
        })
        .with_auth(AuthConfig::bearer(config.server.admin_token.clone()))
        .with_health(HealthState::new(prometheus_render))
        .with_catalog_reloader(catalog_reloader(config_path));
    let webhook_tasks = state.tasks.clone();

    // Install signal handler.
    let cancel = install_signal_handler();

    let mut background = Vec::new();
    {
        let outbox = outbox.clone();
        let cancel = cancel.clone();
        background.push((
            "outbox",
            tokio::spawn(async move { outbox.run(cancel).await }),
        ));
    }
    {
        let reaper = reaper.clone();
        let cancel = cancel.clone();
        background.push((
            "reaper",
            tokio::spawn(async move { reaper.run(cancel).await }),
        ));
    }
    {
        let cancel = cancel.clone();
        background.push((
            "memory-monitor",
            tokio::spawn(async move { memory_monitor(cancel).await }),
        ));
    }

    let server_config = sadhya_gateway::ServerConfig {
        host: config.server.host.clone(),
        port: config.server.port,
    };
    let served = start_server(&server_config, state, cancel.clone()).await;
    if let Err(e) = &served {
        error!(error = %e, "gateway stopped with an error");
    }
    // A failed server also stops the workers.
    cancel.cancel();

    webhook_tasks.close();
    if tokio::time::timeout(DRAIN_TIMEOUT, webhook_tasks.wait())
        .await
        .is_err()
    {
        warn!(
            remaining = webhook_tasks.len(),
            "timeout reached, webhook batches interrupted"
        );
    }
    drain_tasks(background, DRAIN_TIMEOUT).await;

    if let Err(e) = storage.close().await {
        warn!(error = %e, "storage close failed");
    }

    served?;
    info!("sadhya serve shutdown complete");
    Ok(())
}

async fn open_storage(
    config: &SadhyaConfig,
    in_memory: bool,
) -> Result<Arc<dyn StorageAdapter>, SadhyaError> {
    let storage: Arc<dyn StorageAdapter> = if in_memory {
        warn!("in-memory storage selected, sessions and orders are lost on restart");
        Arc::new(MemoryStorage::new())
    } else {
        info!(path = %config.storage.database_path, "opening sqlite storage");
        Arc::new(SqliteStorage::new(config.storage.clone()))
    };
    storage.initialize().await?;
    Ok(storage)
}

#[cfg(feature = "prometheus")]
fn init_metrics(config: &SadhyaConfig) -> MetricsRender {
    if !config.prometheus.enabled {
        debug!("prometheus metrics disabled by configuration");
        return None;
    }
    match sadhya_prometheus::PrometheusAdapter::new() {
        Ok(adapter) => {
            info!("prometheus metrics enabled");
            Some(Arc::new(move || adapter.render()) as Arc<dyn Fn() -> String + Send + Sync>)
        }
        Err(e) => {
            warn!(error = %e, "prometheus initialization failed, continuing without metrics");
            None
        }
    }
}

#[cfg(not(feature = "prometheus"))]
fn init_metrics(_config: &SadhyaConfig) -> MetricsRender {
    None
}

fn whatsapp_configured(config: &SadhyaConfig) -> bool {
    config.whatsapp.access_token.is_some() && config.whatsapp.phone_number_id.is_some()
}

/// The WhatsApp Cloud API dispatcher, or a log-only stand-in.
fn build_channel(config: &SadhyaConfig) -> Result<Arc<dyn ChannelAdapter>, SadhyaError> {
    if whatsapp_configured(config) {
        let dispatcher = WhatsAppDispatcher::new(&config.whatsapp)?;
        info!(api_version = %config.whatsapp.api_version, "whatsapp dispatcher ready");
        Ok(Arc::new(dispatcher))
    } else {
        warn!("whatsapp credentials missing, outbound messages will only be logged");
        Ok(Arc::new(LogDispatcher::new()))
    }
}

/// Local archive of payment screenshots, or the bare media id without a token.
fn build_artifacts(config: &SadhyaConfig) -> Result<Arc<dyn ArtifactStore>, SadhyaError> {
    if config.whatsapp.access_token.is_some() {
        let archive = MediaArchive::new(&config.whatsapp, &config.artifacts)?;
        info!(directory = %archive.directory().display(), "payment proof archive ready");
        Ok(Arc::new(archive))
    } else {
        Ok(Arc::new(MediaReference))
    }
}

fn build_sink(config: &SadhyaConfig) -> Result<Arc<dyn OrderSink>, SadhyaError> {
    if config.sheets.enabled {
        let sync = SheetsSync::new(&config.sheets, config.bot.utc_offset_minutes)?;
        info!(worksheet = %config.sheets.worksheet, "sheet sync enabled");
        Ok(Arc::new(sync))
    } else {
        debug!("sheet sync disabled by configuration");
        Ok(Arc::new(NoopSink))
    }
}

fn describe_errors(errors: &[ConfigError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Re-reads the configuration and returns its catalog. Any configuration
/// error rejects the reload.
fn catalog_reloader(config_path: Option<PathBuf>) -> CatalogReloader {
    Arc::new(move || {
        let loaded = match &config_path {
            Some(path) => sadhya_config::load_and_validate_path(path),
            None => sadhya_config::load_and_validate(),
        };
        let config = loaded.map_err(|errors| SadhyaError::Config(describe_errors(&errors)))?;
        info!("catalog reloaded from configuration");
        Ok(config.catalog.to_snapshot())
    })
}

/// Exports jemalloc heap statistics every 30 seconds.
#[cfg(not(target_env = "msvc"))]
async fn memory_monitor(cancel: CancellationToken) {
    let mut interval = tokio::time::interval(Duration::from_secs(30));

    loop {
        tokio::select! {
            _ = interval.tick() => {
                // Stats are cached until the epoch advances.
                let _ = tikv_jemalloc_ctl::epoch::advance();
                let allocated = tikv_jemalloc_ctl::stats::allocated::read().unwrap_or(0);
                let resident = tikv_jemalloc_ctl::stats::resident::read().unwrap_or(0);

                #[cfg(feature = "prometheus")]
                {
                    sadhya_prometheus::set_memory_heap(allocated as f64);
                    sadhya_prometheus::set_memory_resident(resident as f64);
                }
                debug!(
                    allocated_mb = allocated / (1024 * 1024),
                    resident_mb = resident / (1024 * 1024),
                    "memory usage"
                );
            }
            _ = cancel.cancelled() => {
                debug!("memory monitor shutting down");
                break;
            }
        }
    }
}

#[cfg(target_env = "msvc")]
async fn memory_monitor(cancel: CancellationToken) {
    cancel.cancelled().await;
}

/// Initializes the tracing subscriber with the given log level.
///
/// `RUST_LOG` takes precedence over `bot.log_level`.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("sadhya={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
