// SPDX-FileCopyrightText: 2026 Sadhya Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde attributes,
//! such as a usable base URL, a consistent catalog and complete sync settings.

use std::collections::HashSet;

use sadhya_core::{JunctionKind, MAX_PRICE};

use crate::diagnostic::ConfigError;
use crate::model::SadhyaConfig;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &SadhyaConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let mut fail = |message: String| errors.push(ConfigError::Validation { message });

    if !LOG_LEVELS.contains(&config.bot.log_level.as_str()) {
        fail(format!(
            "bot.log_level `{}` must be one of {}",
            config.bot.log_level,
            LOG_LEVELS.join(", ")
        ));
    }

    if config.bot.max_quantity_per_item == 0 {
        fail("bot.max_quantity_per_item must be at least 1".to_string());
    }

    if !(-720..=840).contains(&config.bot.utc_offset_minutes) {
        fail(format!(
            "bot.utc_offset_minutes must be between -720 and 840, got {}",
            config.bot.utc_offset_minutes
        ));
    }

    if config.bot.reaper_interval_secs == 0 {
        fail("bot.reaper_interval_secs must be at least 1".to_string());
    }

    let host = config.server.host.trim();
    if host.is_empty() {
        fail("server.host must not be empty".to_string());
    } else {
        let is_valid_ip = host.parse::<std::net::IpAddr>().is_ok();
        let is_valid_hostname = host
            .chars()
            .all(|c| c.is_alphanumeric() || c == '.' || c == '-' || c == ':');
        if !is_valid_ip && !is_valid_hostname {
            fail(format!(
                "server.host `{host}` is not a valid IP address or hostname"
            ));
        }
    }

    let base_url = config.server.base_url.trim();
    if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
        fail(format!(
            "server.base_url `{base_url}` must start with http:// or https://"
        ));
    }

    if let Some(token) = &config.server.admin_token
        && token.trim().len() < 16
    {
        fail("server.admin_token must be at least 16 characters".to_string());
    }

    if config.storage.database_path.trim().is_empty() {
        fail("storage.database_path must not be empty".to_string());
    }

    if config.artifacts.directory.trim().is_empty() {
        fail("artifacts.directory must not be empty".to_string());
    }

    for (i, phone) in config.admin.notify_phones.iter().enumerate() {
        if phone.is_empty() || !phone.chars().all(|c| c.is_ascii_digit()) {
            fail(format!(
                "admin.notify_phones[{i}] `{phone}` must contain digits only (country code, no `+`)"
            ));
        }
    }

    if config.outbox.max_attempts == 0 {
        fail("outbox.max_attempts must be at least 1".to_string());
    }

    if config.outbox.max_backoff_secs < config.outbox.base_backoff_secs {
        fail("outbox.max_backoff_secs must not be smaller than outbox.base_backoff_secs".to_string());
    }

    if config.sheets.enabled {
        if config.sheets.spreadsheet_id.is_none() {
            fail("sheets.spreadsheet_id is required when sheets.enabled = true".to_string());
        }
        if config.sheets.access_token.is_none() {
            fail("sheets.access_token is required when sheets.enabled = true".to_string());
        }
    }

    validate_catalog(config, &mut fail);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_catalog(config: &SadhyaConfig, fail: &mut impl FnMut(String)) {
    let catalog = &config.catalog;

    if catalog.delivery_fee > MAX_PRICE {
        fail(format!("catalog.delivery_fee must be at most {MAX_PRICE}"));
    }

    let mut seen_ids = HashSet::new();
    for (i, location) in catalog.locations.iter().enumerate() {
        if location.fee.is_some_and(|fee| fee > MAX_PRICE) {
            fail(format!("catalog.locations[{i}].fee must be at most {MAX_PRICE}"));
        }
        if location.id.trim().is_empty() {
            fail(format!("catalog.locations[{i}].id must not be empty"));
        }
        if location.name.trim().is_empty() {
            fail(format!("catalog.locations[{i}].name must not be empty"));
        }
        if !seen_ids.insert(location.id.as_str()) {
            fail(format!(
                "duplicate location id `{}` in [[catalog.locations]]",
                location.id
            ));
        }
    }

    let pickups = catalog
        .locations
        .iter()
        .filter(|l| l.kind == JunctionKind::Pickup)
        .count();
    if pickups > 1 {
        fail(format!(
            "catalog.locations may contain at most one pickup location, found {pickups}"
        ));
    }

    if !catalog.locations.iter().any(|l| l.active) {
        fail("catalog.locations must contain at least one active location".to_string());
    }

    let mut seen_numbers = HashSet::new();
    for (i, item) in catalog.menu.iter().enumerate() {
        if item.number == 0 {
            fail(format!("catalog.menu[{i}].number must be at least 1"));
        }
        if item.price == 0 {
            fail(format!("catalog.menu[{i}].price must be positive"));
        } else if item.price > MAX_PRICE {
            fail(format!("catalog.menu[{i}].price must be at most {MAX_PRICE}"));
        }
        if item.name.trim().is_empty() {
            fail(format!("catalog.menu[{i}].name must not be empty"));
        }
        if !seen_numbers.insert(item.number) {
            fail(format!(
                "duplicate menu number {} in [[catalog.menu]]",
                item.number
            ));
        }
    }

    if !catalog.menu.iter().any(|m| m.active) {
        fail("catalog.menu must contain at least one active item".to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{LocationConfig, MenuItemConfig};

    fn has_message(errors: &[ConfigError], needle: &str) -> bool {
        errors
            .iter()
            .any(|e| matches!(e, ConfigError::Validation { message } if message.contains(needle)))
    }

    #[test]
    fn default_config_validates() {
        let config = SadhyaConfig::default();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn prices_and_fees_above_the_ceiling_fail_validation() {
        let mut config = SadhyaConfig::default();
        config.catalog.menu[0].price = MAX_PRICE + 1;
        config.catalog.locations[1].fee = Some(u64::MAX - 10);
        config.catalog.delivery_fee = u64::MAX;
        let errors = validate_config(&config).unwrap_err();
        assert!(has_message(&errors, "catalog.menu[0].price must be at most"));
        assert!(has_message(&errors, "catalog.locations[1].fee must be at most"));
        assert!(has_message(&errors, "catalog.delivery_fee must be at most"));
    }

    #[test]
    fn empty_database_path_fails_validation() {
        let mut config = SadhyaConfig::default();
        config.storage.database_path = "".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert!(has_message(&errors, "database_path"));
    }

    #[test]
    fn relative_base_url_fails_validation() {
        let mut config = SadhyaConfig::default();
        config.server.base_url = "orders.example.com".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert!(has_message(&errors, "server.base_url"));
    }

    #[test]
    fn enabled_sheets_require_credentials() {
        let mut config = SadhyaConfig::default();
        config.sheets.enabled = true;
        let errors = validate_config(&config).unwrap_err();
        assert!(has_message(&errors, "sheets.spreadsheet_id"));
        assert!(has_message(&errors, "sheets.access_token"));
    }

    #[test]
    fn duplicate_menu_numbers_fail_validation() {
        let mut config = SadhyaConfig::default();
        config.catalog.menu.push(MenuItemConfig {
            number: 1,
            name: "Another".to_string(),
            price: 10,
            description: None,
            active: true,
        });
        let errors = validate_config(&config).unwrap_err();
        assert!(has_message(&errors, "duplicate menu number 1"));
    }

    #[test]
    fn duplicate_location_ids_fail_validation() {
        let mut config = SadhyaConfig::default();
        config.catalog.locations.push(LocationConfig {
            id: "vyttila_delivery".to_string(),
            name: "Vyttila again".to_string(),
            kind: JunctionKind::Delivery,
            fee: None,
            active: true,
        });
        let errors = validate_config(&config).unwrap_err();
        assert!(has_message(&errors, "duplicate location id"));
    }

    #[test]
    fn non_digit_admin_phone_fails_validation() {
        let mut config = SadhyaConfig::default();
        config.admin.notify_phones = vec!["+91 98765".to_string()];
        let errors = validate_config(&config).unwrap_err();
        assert!(has_message(&errors, "admin.notify_phones[0]"));
    }

    #[test]
    fn all_errors_are_collected() {
        let mut config = SadhyaConfig::default();
        config.bot.log_level = "loud".to_string();
        config.bot.max_quantity_per_item = 0;
        config.outbox.max_attempts = 0;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
    }
}
