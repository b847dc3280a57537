// SPDX-FileCopyrightText: 2026 Sadhya Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `sadhya status` command implementation.
//!
//! Queries the health endpoint of a running server and reports uptime and
//! storage health. Falls back gracefully when the server is not running.

use std::io::IsTerminal;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use sadhya_config::SadhyaConfig;
use sadhya_core::SadhyaError;

/// Health endpoint response from the gateway.
#[derive(Debug, Deserialize)]
struct HealthResponse {
    status: String,
    version: String,
    uptime_secs: u64,
    storage: String,
}

/// Structured status output for `--json` mode.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub running: bool,
    pub status: String,
    pub version: Option<String>,
    pub storage: Option<String>,
    pub uptime_secs: Option<u64>,
    pub uptime_human: Option<String>,
    pub endpoint: String,
}

/// Format seconds into a human-readable duration string.
fn format_uptime(secs: u64) -> String {
    let days = secs / 86400;
    let hours = (secs % 86400) / 3600;
    let minutes = (secs % 3600) / 60;

    if days > 0 {
        format!("{days}d {hours}h {minutes}m")
    } else if hours > 0 {
        format!("{hours}h {minutes}m")
    } else {
        format!("{minutes}m")
    }
}

/// The health URL of the local server. A wildcard bind is reached on loopback.
fn health_url(config: &SadhyaConfig) -> String {
    let host = match config.server.host.as_str() {
        "0.0.0.0" | "::" | "[::]" => "127.0.0.1",
        other => other,
    };
    format!("http://{host}:{}/health/", config.server.port)
}

/// Run the `sadhya status` command.
pub async fn run_status(config: &SadhyaConfig, json: bool, plain: bool) -> Result<(), SadhyaError> {
    let url = health_url(config);

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(3))
        .build()
        .map_err(|e| SadhyaError::Internal(format!("failed to create HTTP client: {e}")))?;

    // A 503 still carries a health body worth showing.
    let health = match client.get(&url).send().await {
        Ok(resp) => resp.json::<HealthResponse>().await.ok(),
        Err(_) => None,
    };

    let response = match health {
        Some(h) => StatusResponse {
            running: true,
            uptime_human: Some(format_uptime(h.uptime_secs)),
            status: h.status,
            version: Some(h.version),
            storage: Some(h.storage),
            uptime_secs: Some(h.uptime_secs),
            endpoint: url,
        },
        None => StatusResponse {
            running: false,
            status: "not running".to_string(),
            version: None,
            storage: None,
            uptime_secs: None,
            uptime_human: None,
            endpoint: url,
        },
    };

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&response).unwrap_or_else(|_| "{}".to_string())
        );
    } else {
        let use_color = !plain && std::io::stdout().is_terminal();
        print_status(&response, use_color);
    }
    Ok(())
}

fn print_status(response: &StatusResponse, use_color: bool) {
    use colored::Colorize;

    println!();
    println!("  sadhya status");
    println!("  {}", "-".repeat(35));

    if response.running {
        let uptime = response.uptime_human.as_deref().unwrap_or("?");
        let healthy = response.status == "ok";
        match (use_color, healthy) {
            (true, true) => println!(
                "    State:    {} {} (uptime: {uptime})",
                "✓".green(),
                response.status.green()
            ),
            (true, false) => println!(
                "    State:    {} {} (uptime: {uptime})",
                "✗".red(),
                response.status.red()
            ),
            (false, true) => println!("    State:    [OK] {} (uptime: {uptime})", response.status),
            (false, false) => {
                println!("    State:    [FAIL] {} (uptime: {uptime})", response.status)
            }
        }
        if let Some(storage) = &response.storage {
            println!("    Storage:  {storage}");
        }
        if let Some(version) = &response.version {
            println!("    Version:  {version}");
        }
    } else {
        if use_color {
            println!("    State:    {} {}", "✗".red(), "not running".red());
        } else {
            println!("    State:    [FAIL] not running");
        }
        println!("    Endpoint: {}", response.endpoint);
        println!();
        println!("  Start with: sadhya serve");
    }
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_uptime_minutes() {
        assert_eq!(format_uptime(120), "2m");
    }

    #[test]
    fn format_uptime_hours() {
        assert_eq!(format_uptime(3720), "1h 2m");
    }

    #[test]
    fn format_uptime_days() {
        assert_eq!(format_uptime(90060), "1d 1h 1m");
    }

    #[test]
    fn wildcard_bind_is_queried_on_loopback() {
        let mut config = SadhyaConfig::default();
        config.server.host = "0.0.0.0".into();
        config.server.port = 8000;
        assert_eq!(health_url(&config), "http://127.0.0.1:8000/health/");
    }

    #[test]
    fn status_response_offline_serializes() {
        let resp = StatusResponse {
            running: false,
            status: "not running".to_string(),
            version: None,
            storage: None,
            uptime_secs: None,
            uptime_human: None,
            endpoint: "http://127.0.0.1:8000/health/".to_string(),
        };
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("\"running\":false"));
        assert!(json.contains("\"uptime_secs\":null"));
    }
}
