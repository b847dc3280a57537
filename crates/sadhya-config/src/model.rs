// SPDX-FileCopyrightText: 2026 Sadhya Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Sadhya ordering bot.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use sadhya_core::{CatalogSnapshot, JunctionKind, Location, MenuItem};
use serde::{Deserialize, Serialize};

/// Top-level Sadhya configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SadhyaConfig {
    /// Bot identity and ordering rules.
    #[serde(default)]
    pub bot: BotConfig,

    /// WhatsApp Cloud API settings.
    #[serde(default)]
    pub whatsapp: WhatsAppConfig,

    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// UPI payment details shown to customers.
    #[serde(default)]
    pub payment: PaymentConfig,

    /// Admin notification settings.
    #[serde(default)]
    pub admin: AdminConfig,

    /// Outbox delivery worker settings.
    #[serde(default)]
    pub outbox: OutboxConfig,

    /// Google Sheets order sync.
    #[serde(default)]
    pub sheets: SheetsConfig,

    /// Payment proof archive.
    #[serde(default)]
    pub artifacts: ArtifactsConfig,

    /// Prometheus metrics export.
    #[serde(default)]
    pub prometheus: PrometheusConfig,

    /// Menu and delivery locations.
    #[serde(default)]
    pub catalog: CatalogConfig,
}

/// Bot identity and ordering rules.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BotConfig {
    /// Display name used in greetings.
    #[serde(default = "default_bot_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Earliest delivery date, in days after today.
    #[serde(default = "default_min_lead_days")]
    pub min_lead_days: u32,

    /// How many days past the earliest date can still be booked.
    #[serde(default = "default_booking_window_days")]
    pub booking_window_days: u32,

    /// Upper bound for the quantity of a single menu line.
    #[serde(default = "default_max_quantity_per_item")]
    pub max_quantity_per_item: u32,

    /// Offset of the business's local time from UTC, used for "today".
    #[serde(default = "default_utc_offset_minutes")]
    pub utc_offset_minutes: i32,

    /// Sessions idle longer than this while collecting an order are abandoned.
    #[serde(default = "default_session_idle_timeout_secs")]
    pub session_idle_timeout_secs: u64,

    /// Terminal sessions are deleted after this long without activity.
    #[serde(default = "default_terminal_session_retention_secs")]
    pub terminal_session_retention_secs: u64,

    /// How often the idle-session reaper runs.
    #[serde(default = "default_reaper_interval_secs")]
    pub reaper_interval_secs: u64,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            name: default_bot_name(),
            log_level: default_log_level(),
            min_lead_days: default_min_lead_days(),
            booking_window_days: default_booking_window_days(),
            max_quantity_per_item: default_max_quantity_per_item(),
            utc_offset_minutes: default_utc_offset_minutes(),
            session_idle_timeout_secs: default_session_idle_timeout_secs(),
            terminal_session_retention_secs: default_terminal_session_retention_secs(),
            reaper_interval_secs: default_reaper_interval_secs(),
        }
    }
}

fn default_bot_name() -> String {
    "EeOnam Sadhya".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_min_lead_days() -> u32 {
    3
}

fn default_booking_window_days() -> u32 {
    30
}

fn default_max_quantity_per_item() -> u32 {
    50
}

fn default_utc_offset_minutes() -> i32 {
    330
}

fn default_session_idle_timeout_secs() -> u64 {
    24 * 60 * 60
}

fn default_terminal_session_retention_secs() -> u64 {
    7 * 24 * 60 * 60
}

fn default_reaper_interval_secs() -> u64 {
    300
}

/// WhatsApp Cloud API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct WhatsAppConfig {
    /// Graph API access token. `None` disables outbound sends.
    #[serde(default)]
    pub access_token: Option<String>,

    /// Sending phone number id.
    #[serde(default)]
    pub phone_number_id: Option<String>,

    /// Token expected in the `hub.verify_token` subscription handshake.
    #[serde(default)]
    pub verify_token: Option<String>,

    /// App secret for `X-Hub-Signature-256` verification. `None` skips the check.
    #[serde(default)]
    pub app_secret: Option<String>,

    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    #[serde(default = "default_api_version")]
    pub api_version: String,
}

impl Default for WhatsAppConfig {
    fn default() -> Self {
        Self {
            access_token: None,
            phone_number_id: None,
            verify_token: None,
            app_secret: None,
            api_base_url: default_api_base_url(),
            api_version: default_api_version(),
        }
    }
}

fn default_api_base_url() -> String {
    "https://graph.facebook.com".to_string()
}

fn default_api_version() -> String {
    "v18.0".to_string()
}

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Public base URL used to build verification links.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Bearer token for `/admin` routes. `None` disables them.
    #[serde(default)]
    pub admin_token: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            base_url: default_base_url(),
            admin_token: None,
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_base_url() -> String {
    "http://localhost:8000".to_string()
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("sadhya").join("sadhya.db"))
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "sadhya.db".to_string())
}

fn default_wal_mode() -> bool {
    true
}

/// UPI payment details.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PaymentConfig {
    /// UPI virtual payment address (e.g. `shop@okaxis`).
    #[serde(default)]
    pub upi_id: Option<String>,

    #[serde(default = "default_merchant_name")]
    pub merchant_name: String,

    /// Publicly reachable QR code image sent with the payment request.
    #[serde(default)]
    pub qr_image_url: Option<String>,
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            upi_id: None,
            merchant_name: default_merchant_name(),
            qr_image_url: None,
        }
    }
}

fn default_merchant_name() -> String {
    "EeOnam".to_string()
}

/// Admin notification configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AdminConfig {
    /// Phone numbers that receive new-order notifications with verification links.
    #[serde(default)]
    pub notify_phones: Vec<String>,
}

/// Outbox worker configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct OutboxConfig {
    /// Sleep between polls when the outbox is empty.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Attempts before a job is parked as failed.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// First retry delay; doubled on every further attempt.
    #[serde(default = "default_base_backoff_secs")]
    pub base_backoff_secs: u64,

    /// Upper bound for the retry delay.
    #[serde(default = "default_max_backoff_secs")]
    pub max_backoff_secs: u64,
}

impl Default for OutboxConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            max_attempts: default_max_attempts(),
            base_backoff_secs: default_base_backoff_secs(),
            max_backoff_secs: default_max_backoff_secs(),
        }
    }
}

fn default_poll_interval_ms() -> u64 {
    500
}

fn default_max_attempts() -> u32 {
    8
}

fn default_base_backoff_secs() -> u64 {
    2
}

fn default_max_backoff_secs() -> u64 {
    900
}

/// Google Sheets order sync configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SheetsConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub spreadsheet_id: Option<String>,

    #[serde(default = "default_worksheet")]
    pub worksheet: String,

    /// OAuth bearer token with spreadsheet scope.
    #[serde(default)]
    pub access_token: Option<String>,

    #[serde(default = "default_sheets_api_base_url")]
    pub api_base_url: String,
}

impl Default for SheetsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            spreadsheet_id: None,
            worksheet: default_worksheet(),
            access_token: None,
            api_base_url: default_sheets_api_base_url(),
        }
    }
}

fn default_worksheet() -> String {
    "Orders".to_string()
}

fn default_sheets_api_base_url() -> String {
    "https://sheets.googleapis.com".to_string()
}

/// Payment proof archive configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ArtifactsConfig {
    /// Directory that receives downloaded payment screenshots.
    #[serde(default = "default_artifacts_directory")]
    pub directory: String,
}

impl Default for ArtifactsConfig {
    fn default() -> Self {
        Self {
            directory: default_artifacts_directory(),
        }
    }
}

fn default_artifacts_directory() -> String {
    dirs::data_dir()
        .map(|p| p.join("sadhya").join("payment_proofs"))
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "payment_proofs".to_string())
}

/// Prometheus metrics configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PrometheusConfig {
    #[serde(default = "default_prometheus_enabled")]
    pub enabled: bool,
}

impl Default for PrometheusConfig {
    fn default() -> Self {
        Self {
            enabled: default_prometheus_enabled(),
        }
    }
}

fn default_prometheus_enabled() -> bool {
    true
}

/// Menu and delivery location catalog.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CatalogConfig {
    /// Fee for delivery locations that do not set their own.
    #[serde(default = "default_delivery_fee")]
    pub delivery_fee: u64,

    #[serde(default = "default_locations")]
    pub locations: Vec<LocationConfig>,

    #[serde(default = "default_menu")]
    pub menu: Vec<MenuItemConfig>,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            delivery_fee: default_delivery_fee(),
            locations: default_locations(),
            menu: default_menu(),
        }
    }
}

impl CatalogConfig {
    /// Builds the immutable catalog snapshot served to the ordering flow.
    pub fn to_snapshot(&self) -> CatalogSnapshot {
        let locations = self
            .locations
            .iter()
            .map(|l| Location {
                id: l.id.clone(),
                name: l.name.clone(),
                kind: l.kind,
                fee: match l.kind {
                    JunctionKind::Delivery => l.fee.unwrap_or(self.delivery_fee),
                    JunctionKind::Pickup => 0,
                },
                active: l.active,
            })
            .collect();
        let menu = self
            .menu
            .iter()
            .map(|m| MenuItem {
                number: m.number,
                name: m.name.clone(),
                price: m.price,
                description: m.description.clone(),
                active: m.active,
            })
            .collect();
        CatalogSnapshot::new(menu, locations)
    }
}

/// A `[[catalog.locations]]` entry.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LocationConfig {
    pub id: String,
    pub name: String,

    #[serde(default = "default_location_kind")]
    pub kind: JunctionKind,

    /// Overrides `catalog.delivery_fee` for this location.
    #[serde(default)]
    pub fee: Option<u64>,

    #[serde(default = "default_active")]
    pub active: bool,
}

/// A `[[catalog.menu]]` entry.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MenuItemConfig {
    pub number: u32,
    pub name: String,
    pub price: u64,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_delivery_fee() -> u64 {
    50
}

fn default_location_kind() -> JunctionKind {
    JunctionKind::Delivery
}

fn default_active() -> bool {
    true
}

fn default_locations() -> Vec<LocationConfig> {
    let mut locations: Vec<LocationConfig> = ["Vyttila", "Kakkanad", "Edappally", "Palarivattom"]
        .into_iter()
        .map(|name| LocationConfig {
            id: format!("{}_delivery", name.to_lowercase()),
            name: name.to_string(),
            kind: JunctionKind::Delivery,
            fee: None,
            active: true,
        })
        .collect();
    locations.push(LocationConfig {
        id: "pickup".to_string(),
        name: "Pickup".to_string(),
        kind: JunctionKind::Pickup,
        fee: Some(0),
        active: true,
    });
    locations
}

fn default_menu() -> Vec<MenuItemConfig> {
    [
        (1, "Veg Sadhya", 150, "Traditional vegetarian feast on banana leaf"),
        (2, "Non-Veg Sadhya", 200, "Sadhya with chicken and fish curry"),
        (3, "Palada Pradhaman", 40, "Rice flake payasam in sweetened milk"),
        (4, "Parippu/Gothambu Payasam", 40, "Lentil or broken wheat payasam"),
        (5, "Kaaya Varuthathu", 30, "Banana chips fried in coconut oil"),
        (6, "Sharkkaravaratti", 30, "Jaggery coated banana chips"),
    ]
    .into_iter()
    .map(|(number, name, price, description)| MenuItemConfig {
        number,
        name: name.to_string(),
        price,
        description: Some(description.to_string()),
        active: true,
    })
    .collect()
}
