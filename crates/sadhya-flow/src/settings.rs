// SPDX-FileCopyrightText: 2026 Sadhya Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The slice of configuration the conversation flow reads.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use sadhya_config::model::SadhyaConfig;

#[derive(Debug, Clone)]
pub struct FlowSettings {
    pub bot_name: String,
    pub min_lead_days: u32,
    pub booking_window_days: u32,
    pub max_quantity_per_item: u32,
    pub utc_offset_minutes: i32,
    /// Public base URL, used to build verification links.
    pub base_url: String,
    pub upi_id: Option<String>,
    pub merchant_name: String,
    pub qr_image_url: Option<String>,
    pub admin_phones: Vec<String>,
}

impl FlowSettings {
    pub fn from_config(config: &SadhyaConfig) -> Self {
        Self {
            bot_name: config.bot.name.clone(),
            min_lead_days: config.bot.min_lead_days,
            booking_window_days: config.bot.booking_window_days,
            max_quantity_per_item: config.bot.max_quantity_per_item,
            utc_offset_minutes: config.bot.utc_offset_minutes,
            base_url: config.server.base_url.trim_end_matches('/').to_string(),
            upi_id: config.payment.upi_id.clone(),
            merchant_name: config.payment.merchant_name.clone(),
            qr_image_url: config.payment.qr_image_url.clone(),
            admin_phones: config.admin.notify_phones.clone(),
        }
    }

    /// Calendar date at the business location for the instant `now`.
    pub fn local_date(&self, now: DateTime<Utc>) -> NaiveDate {
        (now + Duration::minutes(i64::from(self.utc_offset_minutes))).date_naive()
    }
}

impl Default for FlowSettings {
    fn default() -> Self {
        Self::from_config(&SadhyaConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn local_date_applies_offset() {
        let settings = FlowSettings::default();
        // 20:00 UTC is already the next day in Kochi (+05:30).
        let now = Utc.with_ymd_and_hms(2026, 8, 20, 20, 0, 0).unwrap();
        assert_eq!(settings.local_date(now), NaiveDate::from_ymd_opt(2026, 8, 21).unwrap());
    }

    #[test]
    fn base_url_loses_trailing_slash() {
        let mut config = SadhyaConfig::default();
        config.server.base_url = "https://sadhya.example/".into();
        assert_eq!(FlowSettings::from_config(&config).base_url, "https://sadhya.example");
    }
}
