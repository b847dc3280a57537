// SPDX-FileCopyrightText: 2026 Sadhya Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Outbound message delivery through the WhatsApp Cloud API.
//!
//! Provides [`WhatsAppDispatcher`], the production [`ChannelAdapter`]. Each
//! [`OutboundIntent`] becomes one `POST /{version}/{phone_number_id}/messages`
//! call. Retries are the outbox worker's business, so a failed send is
//! reported once with an error classified as transient or permanent.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, warn};

use sadhya_config::model::WhatsAppConfig;
use sadhya_core::{
    AdapterType, ChannelAdapter, HealthStatus, MessageId, OutboundIntent, PluginAdapter,
    SadhyaError, redact_phone,
};

/// Sends [`OutboundIntent`]s as WhatsApp messages.
#[derive(Debug, Clone)]
pub struct WhatsAppDispatcher {
    client: reqwest::Client,
    messages_url: String,
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    #[serde(default)]
    messages: Vec<SentMessage>,
}

#[derive(Debug, Deserialize)]
struct SentMessage {
    id: String,
}

#[derive(Debug, Deserialize)]
struct GraphErrorResponse {
    error: GraphError,
}

#[derive(Debug, Deserialize)]
struct GraphError {
    message: String,
    #[serde(default)]
    code: Option<i64>,
}

impl WhatsAppDispatcher {
    /// Builds a dispatcher from the `[whatsapp]` section.
    ///
    /// Fails with a configuration error when the access token or the sending
    /// phone number id is missing.
    pub fn new(config: &WhatsAppConfig) -> Result<Self, SadhyaError> {
        let token = config
            .access_token
            .as_deref()
            .ok_or_else(|| SadhyaError::Config("whatsapp.access_token is not set".into()))?;
        let phone_number_id = config
            .phone_number_id
            .as_deref()
            .ok_or_else(|| SadhyaError::Config("whatsapp.phone_number_id is not set".into()))?;

        let client = graph_client(token)?;
        let messages_url = format!(
            "{}/{}/{}/messages",
            config.api_base_url.trim_end_matches('/'),
            config.api_version,
            phone_number_id
        );
        Ok(Self {
            client,
            messages_url,
        })
    }
}

/// Builds a reqwest client carrying the Graph API bearer token.
pub(crate) fn graph_client(token: &str) -> Result<reqwest::Client, SadhyaError> {
    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {token}")).map_err(|e| {
            SadhyaError::Config(format!("invalid WhatsApp access token header value: {e}"))
        })?,
    );
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

    reqwest::Client::builder()
        .default_headers(headers)
        .timeout(Duration::from_secs(30))
        .build()
        .map_err(|e| SadhyaError::Channel {
            message: format!("failed to build HTTP client: {e}"),
            source: Some(Box::new(e)),
        })
}

/// Graph API request body for one intent.
pub fn message_payload(intent: &OutboundIntent) -> Value {
    match intent {
        OutboundIntent::Text { to, body } => json!({
            "messaging_product": "whatsapp",
            "to": to,
            "type": "text",
            "text": { "body": body },
        }),
        OutboundIntent::Buttons { to, body, buttons } => {
            let buttons: Vec<Value> = buttons
                .iter()
                .map(|b| json!({ "type": "reply", "reply": { "id": b.id, "title": b.title } }))
                .collect();
            json!({
                "messaging_product": "whatsapp",
                "to": to,
                "type": "interactive",
                "interactive": {
                    "type": "button",
                    "body": { "text": body },
                    "action": { "buttons": buttons },
                },
            })
        }
        OutboundIntent::Image { to, link, caption } => json!({
            "messaging_product": "whatsapp",
            "to": to,
            "type": "image",
            "image": { "link": link, "caption": caption },
        }),
    }
}

/// Maps a non-success Graph API response to an error.
///
/// Rate limiting and server errors are transient; anything else means the
/// request itself is wrong and repeating it cannot help.
pub(crate) fn status_error(status: StatusCode, body: &str) -> SadhyaError {
    let detail = match serde_json::from_str::<GraphErrorResponse>(body) {
        Ok(parsed) => match parsed.error.code {
            Some(code) => format!("{} (code {code})", parsed.error.message),
            None => parsed.error.message,
        },
        Err(_) => body.to_string(),
    };
    let message = format!("WhatsApp API returned {status}: {detail}");

    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        SadhyaError::Channel {
            message,
            source: None,
        }
    } else if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        SadhyaError::Config(message)
    } else {
        SadhyaError::Internal(message)
    }
}

pub(crate) fn transport_error(e: reqwest::Error) -> SadhyaError {
    if e.is_timeout() {
        return SadhyaError::Timeout {
            duration: Duration::from_secs(30),
        };
    }
    SadhyaError::Channel {
        message: format!("HTTP request failed: {e}"),
        source: Some(Box::new(e)),
    }
}

#[async_trait]
impl PluginAdapter for WhatsAppDispatcher {
    fn name(&self) -> &str {
        "whatsapp"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Channel
    }

    async fn health_check(&self) -> Result<HealthStatus, SadhyaError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), SadhyaError> {
        Ok(())
    }
}

#[async_trait]
impl ChannelAdapter for WhatsAppDispatcher {
    async fn send(&self, intent: &OutboundIntent) -> Result<MessageId, SadhyaError> {
        let response = self
            .client
            .post(&self.messages_url)
            .json(&message_payload(intent))
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(
                status = %status,
                to = %redact_phone(intent.recipient()),
                "WhatsApp send failed"
            );
            return Err(status_error(status, &body));
        }

        let parsed: SendResponse = response.json().await.map_err(|e| SadhyaError::Channel {
            message: format!("failed to parse send response: {e}"),
            source: Some(Box::new(e)),
        })?;
        let id = parsed
            .messages
            .into_iter()
            .next()
            .map(|m| m.id)
            .ok_or_else(|| SadhyaError::Channel {
                message: "send response carried no message id".into(),
                source: None,
            })?;

        debug!(to = %redact_phone(intent.recipient()), message_id = %id, "WhatsApp message sent");
        Ok(MessageId(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sadhya_core::ReplyButton;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(base_url: &str) -> WhatsAppConfig {
        WhatsAppConfig {
            access_token: Some("test-token".into()),
            phone_number_id: Some("1234567890".into()),
            api_base_url: base_url.to_string(),
            ..WhatsAppConfig::default()
        }
    }

    fn sent_body(id: &str) -> Value {
        json!({
            "messaging_product": "whatsapp",
            "contacts": [{ "input": "919800000001", "wa_id": "919800000001" }],
            "messages": [{ "id": id }],
        })
    }

    #[test]
    fn missing_credentials_are_a_config_error() {
        let config = WhatsAppConfig::default();
        let err = WhatsAppDispatcher::new(&config).unwrap_err();
        assert!(matches!(err, SadhyaError::Config(_)));
        assert!(err.to_string().contains("access_token"));
    }

    #[test]
    fn button_payload_uses_reply_buttons() {
        let intent = OutboundIntent::Buttons {
            to: "919800000001".into(),
            body: "Pick a date".into(),
            buttons: vec![ReplyButton {
                id: "date_2026-08-24".into(),
                title: "Mon 24 Aug".into(),
            }],
        };
        let payload = message_payload(&intent);
        assert_eq!(payload["type"], "interactive");
        assert_eq!(payload["interactive"]["type"], "button");
        assert_eq!(payload["interactive"]["body"]["text"], "Pick a date");
        let button = &payload["interactive"]["action"]["buttons"][0];
        assert_eq!(button["type"], "reply");
        assert_eq!(button["reply"]["id"], "date_2026-08-24");
    }

    #[test]
    fn image_payload_carries_link_and_caption() {
        let intent = OutboundIntent::Image {
            to: "919800000001".into(),
            link: "https://sadhya.test/qr.png".into(),
            caption: "Scan to pay".into(),
        };
        let payload = message_payload(&intent);
        assert_eq!(payload["image"]["link"], "https://sadhya.test/qr.png");
        assert_eq!(payload["image"]["caption"], "Scan to pay");
    }

    #[tokio::test]
    async fn send_text_returns_provider_message_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v18.0/1234567890/messages"))
            .and(header("authorization", "Bearer test-token"))
            .and(body_partial_json(json!({
                "type": "text",
                "to": "919800000001",
                "text": { "body": "hello" },
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(sent_body("wamid.ABC")))
            .expect(1)
            .mount(&server)
            .await;

        let dispatcher = WhatsAppDispatcher::new(&test_config(&server.uri())).unwrap();
        let id = dispatcher
            .send(&OutboundIntent::text("919800000001", "hello"))
            .await
            .unwrap();
        assert_eq!(id, MessageId("wamid.ABC".into()));
    }

    #[tokio::test]
    async fn rate_limit_is_transient() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_json(json!({
                "error": { "message": "Too many messages", "code": 130429 }
            })))
            .mount(&server)
            .await;

        let dispatcher = WhatsAppDispatcher::new(&test_config(&server.uri())).unwrap();
        let err = dispatcher
            .send(&OutboundIntent::text("919800000001", "hello"))
            .await
            .unwrap_err();
        assert!(err.is_transient());
        assert!(err.to_string().contains("429"));
    }

    #[tokio::test]
    async fn bad_request_is_permanent() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": { "message": "Invalid parameter", "code": 100 }
            })))
            .mount(&server)
            .await;

        let dispatcher = WhatsAppDispatcher::new(&test_config(&server.uri())).unwrap();
        let err = dispatcher
            .send(&OutboundIntent::text("919800000001", "hello"))
            .await
            .unwrap_err();
        assert!(!err.is_transient());
        assert!(err.to_string().contains("Invalid parameter (code 100)"));
    }

    #[tokio::test]
    async fn response_without_message_id_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "messages": [] })))
            .mount(&server)
            .await;

        let dispatcher = WhatsAppDispatcher::new(&test_config(&server.uri())).unwrap();
        let err = dispatcher
            .send(&OutboundIntent::text("919800000001", "hello"))
            .await
            .unwrap_err();
        assert!(matches!(err, SadhyaError::Channel { .. }));
    }
}
