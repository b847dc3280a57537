// SPDX-FileCopyrightText: 2026 Sadhya Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Order upserts through the Google Sheets values API.
//!
//! A write looks up column A for the order id, then either overwrites that
//! row or appends a new one. Writes are serialized so two syncs of the same
//! order cannot both append.

use std::time::Duration;

use async_trait::async_trait;
use chrono::FixedOffset;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::Mutex;
use tracing::{debug, info};

use sadhya_config::model::SheetsConfig;
use sadhya_core::{AdapterType, HealthStatus, Order, OrderSink, PluginAdapter, SadhyaError};

use crate::row::{HEADERS, LAST_COLUMN, order_row};

/// [`OrderSink`] writing one row per order to a worksheet.
pub struct SheetsSync {
    client: reqwest::Client,
    values_url: String,
    worksheet: String,
    offset: FixedOffset,
    write_lock: Mutex<()>,
}

#[derive(Debug, Default, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<String>>,
}

impl SheetsSync {
    /// Builds the sink from `[sheets]`. Timestamps in rows are rendered at
    /// `utc_offset_minutes`.
    pub fn new(config: &SheetsConfig, utc_offset_minutes: i32) -> Result<Self, SadhyaError> {
        let spreadsheet_id = config
            .spreadsheet_id
            .as_deref()
            .ok_or_else(|| SadhyaError::Config("sheets.spreadsheet_id is not set".into()))?;
        let token = config
            .access_token
            .as_deref()
            .ok_or_else(|| SadhyaError::Config("sheets.access_token is not set".into()))?;
        let offset = FixedOffset::east_opt(utc_offset_minutes * 60).ok_or_else(|| {
            SadhyaError::Config(format!("invalid UTC offset: {utc_offset_minutes} minutes"))
        })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .default_headers({
                let mut headers = reqwest::header::HeaderMap::new();
                headers.insert(
                    reqwest::header::AUTHORIZATION,
                    reqwest::header::HeaderValue::from_str(&format!("Bearer {token}")).map_err(
                        |e| SadhyaError::Config(format!("invalid sheets token header value: {e}")),
                    )?,
                );
                headers
            })
            .build()
            .map_err(|e| SadhyaError::Sync {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            client,
            values_url: format!(
                "{}/v4/spreadsheets/{}/values",
                config.api_base_url.trim_end_matches('/'),
                spreadsheet_id
            ),
            worksheet: config.worksheet.clone(),
            offset,
            write_lock: Mutex::new(()),
        })
    }

    fn range_url(&self, range: &str) -> String {
        format!(
            "{}/{}!{range}",
            self.values_url,
            urlencoding::encode(&self.worksheet)
        )
    }

    /// Column A of the worksheet, header included.
    async fn key_column(&self) -> Result<Vec<String>, SadhyaError> {
        let response = self
            .client
            .get(self.range_url("A:A"))
            .send()
            .await
            .map_err(transport_error)?;
        let range: ValueRange = read_json(response).await?;
        Ok(range
            .values
            .into_iter()
            .map(|row| row.into_iter().next().unwrap_or_default())
            .collect())
    }

    async fn update_row(&self, row_number: usize, row: Vec<String>) -> Result<(), SadhyaError> {
        let url = format!(
            "{}?valueInputOption=RAW",
            self.range_url(&format!("A{row_number}:{LAST_COLUMN}{row_number}"))
        );
        let response = self
            .client
            .put(url)
            .json(&json!({ "values": [row] }))
            .send()
            .await
            .map_err(transport_error)?;
        read_json::<serde_json::Value>(response).await?;
        Ok(())
    }

    async fn append_rows(&self, rows: Vec<Vec<String>>) -> Result<(), SadhyaError> {
        let url = format!(
            "{}:append?valueInputOption=RAW&insertDataOption=INSERT_ROWS",
            self.range_url("A1")
        );
        let response = self
            .client
            .post(url)
            .json(&json!({ "values": rows }))
            .send()
            .await
            .map_err(transport_error)?;
        read_json::<serde_json::Value>(response).await?;
        Ok(())
    }
}

async fn read_json<T: serde::de::DeserializeOwned + Default>(
    response: reqwest::Response,
) -> Result<T, SadhyaError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(status_error(status, &body));
    }
    let body = response.text().await.map_err(transport_error)?;
    if body.trim().is_empty() {
        return Ok(T::default());
    }
    serde_json::from_str(&body).map_err(|e| SadhyaError::Sync {
        message: format!("failed to parse Sheets response: {e}"),
        source: Some(Box::new(e)),
    })
}

fn status_error(status: StatusCode, body: &str) -> SadhyaError {
    let message = format!("Sheets API returned {status}: {body}");
    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        SadhyaError::Sync {
            message,
            source: None,
        }
    } else if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        SadhyaError::Config(message)
    } else {
        SadhyaError::Internal(message)
    }
}

fn transport_error(e: reqwest::Error) -> SadhyaError {
    SadhyaError::Sync {
        message: format!("HTTP request failed: {e}"),
        source: Some(Box::new(e)),
    }
}

#[async_trait]
impl PluginAdapter for SheetsSync {
    fn name(&self) -> &str {
        "google-sheets"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::OrderSink
    }

    async fn health_check(&self) -> Result<HealthStatus, SadhyaError> {
        match self.key_column().await {
            Ok(_) => Ok(HealthStatus::Healthy),
            Err(e) => Ok(HealthStatus::Degraded(e.to_string())),
        }
    }

    async fn shutdown(&self) -> Result<(), SadhyaError> {
        Ok(())
    }
}

#[async_trait]
impl OrderSink for SheetsSync {
    async fn record_order(&self, order: &Order) -> Result<(), SadhyaError> {
        let _guard = self.write_lock.lock().await;
        let row = order_row(order, self.offset);
        let keys = self.key_column().await?;

        match keys.iter().position(|k| k == order.order_id.as_str()) {
            Some(index) => {
                let row_number = index + 1;
                self.update_row(row_number, row).await?;
                debug!(order_id = %order.order_id, row_number, "updated order row");
            }
            None if keys.is_empty() => {
                let headers = HEADERS.iter().map(|h| h.to_string()).collect();
                self.append_rows(vec![headers, row]).await?;
                info!(order_id = %order.order_id, "wrote header and first order row");
            }
            None => {
                self.append_rows(vec![row]).await?;
                debug!(order_id = %order.order_id, "appended order row");
            }
        }
        Ok(())
    }
}
