// SPDX-FileCopyrightText: 2026 Sadhya Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `sadhya check-config` command implementation.
//!
//! Runs after the configuration has loaded and validated, and reports what
//! the server would run with: which collaborators are live, which fall back
//! to offline stand-ins, and whether the database is reachable.

use std::io::IsTerminal;
use std::path::Path;
use std::time::{Duration, Instant};

use sadhya_config::SadhyaConfig;
use sadhya_core::{OutboxStatus, SadhyaError};
use sadhya_storage::Database;
use sadhya_storage::queries::outbox;

/// Status of a single check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckStatus {
    Pass,
    Warn,
    Fail,
}

/// Result of a single check.
#[derive(Debug, Clone)]
pub struct CheckResult {
    pub name: String,
    pub status: CheckStatus,
    pub message: String,
    pub duration: Duration,
}

impl CheckResult {
    fn new(name: &str, status: CheckStatus, message: impl Into<String>, start: Instant) -> Self {
        Self {
            name: name.to_string(),
            status,
            message: message.into(),
            duration: start.elapsed(),
        }
    }
}

/// Run the `sadhya check-config` command.
///
/// Fails when any check fails; warnings are reported but do not fail.
pub async fn run_check(config: &SadhyaConfig, plain: bool) -> Result<(), SadhyaError> {
    let use_color = !plain && std::io::stdout().is_terminal();
    let results = run_checks(config).await;

    println!();
    println!("  sadhya check-config");
    println!("  {}", "-".repeat(50));
    for result in &results {
        println!("{}", format_line(result, use_color));
    }
    println!();

    let fail_count = results.iter().filter(|r| r.status == CheckStatus::Fail).count();
    let warn_count = results.iter().filter(|r| r.status == CheckStatus::Warn).count();
    if fail_count + warn_count > 0 {
        let issues = fail_count + warn_count;
        let issue_word = if issues == 1 { "issue" } else { "issues" };
        println!("  {issues} {issue_word} found.");
    } else {
        println!("  All checks passed.");
    }
    println!();

    if fail_count > 0 {
        return Err(SadhyaError::Config(format!("{fail_count} check(s) failed")));
    }
    Ok(())
}

/// All checks, in display order.
pub async fn run_checks(config: &SadhyaConfig) -> Vec<CheckResult> {
    vec![
        CheckResult::new("Configuration", CheckStatus::Pass, "valid", Instant::now()),
        check_catalog(config),
        check_whatsapp(config),
        check_webhook(config),
        check_links(config),
        check_admin(config),
        check_payment(config),
        check_sheets(config),
        check_artifacts(config),
        check_database(&config.storage.database_path, config.storage.wal_mode).await,
    ]
}

fn format_line(result: &CheckResult, use_color: bool) -> String {
    use colored::Colorize;

    let duration_ms = result.duration.as_millis();
    match (result.status, use_color) {
        (CheckStatus::Pass, true) => format!(
            "    {} {:<16} {} ({duration_ms}ms)",
            "✓".green(),
            result.name,
            result.message
        ),
        (CheckStatus::Warn, true) => format!(
            "    {} {:<16} {} ({duration_ms}ms)",
            "!".yellow(),
            result.name,
            result.message.yellow()
        ),
        (CheckStatus::Fail, true) => format!(
            "    {} {:<16} {} ({duration_ms}ms)",
            "✗".red(),
            result.name,
            result.message.red()
        ),
        (CheckStatus::Pass, false) => format!(
            "    [OK]   {:<16} {} ({duration_ms}ms)",
            result.name, result.message
        ),
        (CheckStatus::Warn, false) => format!(
            "    [WARN] {:<16} {} ({duration_ms}ms)",
            result.name, result.message
        ),
        (CheckStatus::Fail, false) => format!(
            "    [FAIL] {:<16} {} ({duration_ms}ms)",
            result.name, result.message
        ),
    }
}

fn check_catalog(config: &SadhyaConfig) -> CheckResult {
    let start = Instant::now();
    let snapshot = config.catalog.to_snapshot();
    let locations = snapshot.active_locations().len();
    let items = snapshot.active_menu().len();
    let message = format!("{locations} active location(s), {items} active menu item(s)");
    let status = if locations == 0 || items == 0 {
        CheckStatus::Fail
    } else {
        CheckStatus::Pass
    };
    CheckResult::new("Catalog", status, message, start)
}

fn check_whatsapp(config: &SadhyaConfig) -> CheckResult {
    let start = Instant::now();
    let wa = &config.whatsapp;
    if wa.access_token.is_some() && wa.phone_number_id.is_some() {
        CheckResult::new(
            "WhatsApp",
            CheckStatus::Pass,
            format!("sending via {}/{}", wa.api_base_url, wa.api_version),
            start,
        )
    } else {
        CheckResult::new(
            "WhatsApp",
            CheckStatus::Warn,
            "access_token or phone_number_id missing; messages will only be logged",
            start,
        )
    }
}

fn check_webhook(config: &SadhyaConfig) -> CheckResult {
    let start = Instant::now();
    let wa = &config.whatsapp;
    match (wa.verify_token.is_some(), wa.app_secret.is_some()) {
        (true, true) => CheckResult::new("Webhook", CheckStatus::Pass, "handshake and signatures on", start),
        (false, _) => CheckResult::new(
            "Webhook",
            CheckStatus::Warn,
            "verify_token missing; subscription handshake will be refused",
            start,
        ),
        (true, false) => CheckResult::new(
            "Webhook",
            CheckStatus::Warn,
            "app_secret missing; webhook signatures are not checked",
            start,
        ),
    }
}

fn check_links(config: &SadhyaConfig) -> CheckResult {
    let start = Instant::now();
    let base = config.server.base_url.trim_end_matches('/');
    if base.starts_with("https://") {
        CheckResult::new("Links", CheckStatus::Pass, format!("{base}/verify/..."), start)
    } else {
        CheckResult::new(
            "Links",
            CheckStatus::Warn,
            format!("verification links use {base}; admins outside this host cannot open them"),
            start,
        )
    }
}

fn check_admin(config: &SadhyaConfig) -> CheckResult {
    let start = Instant::now();
    let phones = config.admin.notify_phones.len();
    if phones == 0 {
        return CheckResult::new(
            "Admin",
            CheckStatus::Warn,
            "no admin.notify_phones; payments will not be announced",
            start,
        );
    }
    if config.server.admin_token.is_none() {
        return CheckResult::new(
            "Admin",
            CheckStatus::Warn,
            format!("{phones} admin phone(s); admin_token missing, /admin routes are locked"),
            start,
        );
    }
    CheckResult::new(
        "Admin",
        CheckStatus::Pass,
        format!("{phones} admin phone(s), catalog API enabled"),
        start,
    )
}

fn check_payment(config: &SadhyaConfig) -> CheckResult {
    let start = Instant::now();
    match &config.payment.upi_id {
        Some(upi) => CheckResult::new(
            "Payment",
            CheckStatus::Pass,
            format!("UPI {upi} ({})", config.payment.merchant_name),
            start,
        ),
        None => CheckResult::new(
            "Payment",
            CheckStatus::Warn,
            "payment.upi_id missing; payment messages carry no UPI link",
            start,
        ),
    }
}

fn check_sheets(config: &SadhyaConfig) -> CheckResult {
    let start = Instant::now();
    if !config.sheets.enabled {
        return CheckResult::new("Sheets", CheckStatus::Pass, "disabled", start);
    }
    match sadhya_sheets::SheetsSync::new(&config.sheets, config.bot.utc_offset_minutes) {
        Ok(_) => CheckResult::new(
            "Sheets",
            CheckStatus::Pass,
            format!("syncing to worksheet '{}'", config.sheets.worksheet),
            start,
        ),
        Err(e) => CheckResult::new("Sheets", CheckStatus::Fail, e.to_string(), start),
    }
}

fn check_artifacts(config: &SadhyaConfig) -> CheckResult {
    let start = Instant::now();
    let dir = &config.artifacts.directory;
    if Path::new(dir).is_dir() {
        CheckResult::new("Artifacts", CheckStatus::Pass, dir.clone(), start)
    } else {
        CheckResult::new(
            "Artifacts",
            CheckStatus::Warn,
            format!("{dir} not found (will be created on first proof)"),
            start,
        )
    }
}

/// Opens the database and reports the outbox backlog.
async fn check_database(db_path: &str, wal_mode: bool) -> CheckResult {
    let start = Instant::now();
    if !Path::new(db_path).exists() {
        return CheckResult::new(
            "Database",
            CheckStatus::Warn,
            format!("not found: {db_path} (will be created on first run)"),
            start,
        );
    }

    let db = match Database::open_with(db_path, wal_mode).await {
        Ok(db) => db,
        Err(e) => return CheckResult::new("Database", CheckStatus::Fail, format!("open failed: {e}"), start),
    };
    let counts = outbox::count_by_status(&db).await;
    if let Err(e) = db.close().await {
        tracing::debug!(error = %e, "database close after check failed");
    }

    match counts {
        Ok(counts) => {
            let count = |status: OutboxStatus| {
                counts
                    .iter()
                    .find(|(s, _)| *s == status)
                    .map_or(0, |(_, n)| *n)
            };
            let parked = count(OutboxStatus::Failed);
            let message = format!(
                "connected; outbox {} pending, {} parked",
                count(OutboxStatus::Pending) + count(OutboxStatus::Processing),
                parked
            );
            let status = if parked > 0 { CheckStatus::Warn } else { CheckStatus::Pass };
            CheckResult::new("Database", status, message, start)
        }
        Err(e) => CheckResult::new("Database", CheckStatus::Fail, format!("query failed: {e}"), start),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn find<'a>(results: &'a [CheckResult], name: &str) -> &'a CheckResult {
        results.iter().find(|r| r.name == name).unwrap()
    }

    #[tokio::test]
    async fn defaults_warn_about_missing_credentials() {
        let mut config = SadhyaConfig::default();
        config.storage.database_path = "/tmp/nonexistent-sadhya-check-xyz.db".into();
        let results = run_checks(&config).await;

        assert_eq!(find(&results, "Configuration").status, CheckStatus::Pass);
        assert_eq!(find(&results, "Catalog").status, CheckStatus::Pass);
        assert_eq!(find(&results, "WhatsApp").status, CheckStatus::Warn);
        assert_eq!(find(&results, "Sheets").message, "disabled");
        let db = find(&results, "Database");
        assert_eq!(db.status, CheckStatus::Warn);
        assert!(db.message.contains("not found"));
    }

    #[test]
    fn empty_catalog_fails() {
        let mut config = SadhyaConfig::default();
        for item in &mut config.catalog.menu {
            item.active = false;
        }
        assert_eq!(check_catalog(&config).status, CheckStatus::Fail);
    }

    #[test]
    fn enabled_sheets_without_credentials_fail() {
        let mut config = SadhyaConfig::default();
        config.sheets.enabled = true;
        assert_eq!(check_sheets(&config).status, CheckStatus::Fail);
    }

    #[test]
    fn admin_needs_phones_and_token() {
        let mut config = SadhyaConfig::default();
        assert_eq!(check_admin(&config).status, CheckStatus::Warn);
        config.admin.notify_phones = vec!["919900000001".into()];
        assert_eq!(check_admin(&config).status, CheckStatus::Warn);
        config.server.admin_token = Some("secret".into());
        assert_eq!(check_admin(&config).status, CheckStatus::Pass);
    }

    #[tokio::test]
    async fn existing_database_reports_outbox_backlog() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("check.db");
        let path = path.to_str().unwrap();
        Database::open(path).await.unwrap().close().await.unwrap();

        let result = check_database(path, true).await;
        assert_eq!(result.status, CheckStatus::Pass);
        assert!(result.message.contains("0 pending, 0 parked"));
    }

    #[test]
    fn plain_lines_carry_status_tags() {
        let result = CheckResult {
            name: "Sheets".into(),
            status: CheckStatus::Warn,
            message: "x".into(),
            duration: Duration::from_millis(3),
        };
        assert!(format_line(&result, false).starts_with("    [WARN] Sheets"));
    }
}
