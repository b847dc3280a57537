// SPDX-FileCopyrightText: 2026 Sadhya Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./sadhya.toml` > `~/.config/sadhya/sadhya.toml` > `/etc/sadhya/sadhya.toml`
//! with environment variable overrides via `SADHYA_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::SadhyaConfig;

/// Top-level sections that environment variables can target.
const SECTIONS: &[&str] = &[
    "bot",
    "whatsapp",
    "server",
    "storage",
    "payment",
    "admin",
    "outbox",
    "sheets",
    "artifacts",
    "prometheus",
    "catalog",
];

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/sadhya/sadhya.toml` (system-wide)
/// 3. `~/.config/sadhya/sadhya.toml` (user XDG config)
/// 4. `./sadhya.toml` (local directory)
/// 5. `SADHYA_*` environment variables
pub fn load_config() -> Result<SadhyaConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
///
/// Used for testing and explicit configuration.
pub fn load_config_from_str(toml_content: &str) -> Result<SadhyaConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(SadhyaConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<SadhyaConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(SadhyaConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used internally for config loading (exposed for diagnostic use).
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(SadhyaConfig::default()))
        .merge(Toml::file("/etc/sadhya/sadhya.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("sadhya/sadhya.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("sadhya.toml"))
        .merge(env_provider())
}

/// Maps a lowercased, prefix-stripped env var name to a dotted config key.
///
/// Only the first underscore after a known section name becomes a dot, so
/// `server_admin_token` maps to `server.admin_token` and
/// `whatsapp_api_base_url` to `whatsapp.api_base_url`.
pub fn map_env_key(key: &str) -> String {
    for section in SECTIONS {
        if let Some(rest) = key
            .strip_prefix(section)
            .and_then(|r| r.strip_prefix('_'))
        {
            return format!("{section}.{rest}");
        }
    }
    key.to_string()
}

/// Create the environment variable provider using explicit `map()` for section-to-dot mapping.
///
/// Uses `Env::map()` rather than `Env::split("_")` because key names contain
/// underscores.
fn env_provider() -> Env {
    Env::prefixed("SADHYA_").map(|key| map_env_key(key.as_str()).into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_keys_split_only_after_section() {
        assert_eq!(map_env_key("server_admin_token"), "server.admin_token");
        assert_eq!(map_env_key("whatsapp_app_secret"), "whatsapp.app_secret");
        assert_eq!(map_env_key("bot_min_lead_days"), "bot.min_lead_days");
        assert_eq!(map_env_key("storage_database_path"), "storage.database_path");
    }

    #[test]
    fn unknown_section_is_left_untouched() {
        assert_eq!(map_env_key("nothing_here"), "nothing_here");
    }
}
