// SPDX-FileCopyrightText: 2026 Sadhya Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers for the webhook and the public JSON endpoints.

use axum::{
    Json,
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use sadhya_core::{HealthStatus, Order, OrderId, VerificationStatus};
use sadhya_whatsapp::{SIGNATURE_HEADER, parse_webhook, verify_signature};

use crate::server::GatewayState;

/// Query of the `GET /webhook/` subscription handshake.
#[derive(Debug, Deserialize)]
pub struct HandshakeParams {
    #[serde(rename = "hub.mode")]
    pub mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    pub verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    pub challenge: Option<String>,
}

/// Response body for GET /health/.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub storage: String,
}

/// One line of an order status response.
#[derive(Debug, Serialize)]
pub struct OrderLine {
    pub item: String,
    pub quantity: u32,
    pub amount: u64,
}

/// Response body for GET /order/{order_id}/.
///
/// The customer's phone number is deliberately absent.
#[derive(Debug, Serialize)]
pub struct OrderStatusResponse {
    pub order_id: String,
    pub verification_status: VerificationStatus,
    pub delivery_date: NaiveDate,
    pub junction: String,
    pub fulfilment: String,
    pub items: Vec<OrderLine>,
    pub delivery_fee: u64,
    pub total: u64,
    pub payment_proof_received: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Order> for OrderStatusResponse {
    fn from(order: Order) -> Self {
        Self {
            items: order
                .line_items
                .iter()
                .map(|l| OrderLine {
                    item: l.name.clone(),
                    quantity: l.quantity,
                    amount: l.amount(),
                })
                .collect(),
            order_id: order.order_id.0,
            verification_status: order.verification_status,
            delivery_date: order.delivery_date,
            junction: order.junction.name,
            fulfilment: order.junction.kind.to_string(),
            delivery_fee: order.delivery_fee,
            total: order.total,
            payment_proof_received: order.payment_proof_ref.is_some(),
            created_at: order.created_at,
            updated_at: order.updated_at,
        }
    }
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_response(status: StatusCode, error: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
        }),
    )
        .into_response()
}

/// GET /webhook/
///
/// Echoes `hub.challenge` when the subscription token matches.
pub async fn webhook_handshake(
    State(state): State<GatewayState>,
    Query(params): Query<HandshakeParams>,
) -> Response {
    let Some(expected) = state.webhook.verify_token.as_deref() else {
        warn!("webhook handshake attempted but whatsapp.verify_token is not set");
        return StatusCode::FORBIDDEN.into_response();
    };
    match (params.mode.as_deref(), params.verify_token.as_deref(), params.challenge) {
        (Some("subscribe"), Some(token), Some(challenge)) if token == expected => {
            tracing::info!("webhook subscription verified");
            (StatusCode::OK, challenge).into_response()
        }
        _ => {
            warn!("webhook handshake rejected");
            StatusCode::FORBIDDEN.into_response()
        }
    }
}

/// POST /webhook/
///
/// Verifies the signature, parses the envelope and acknowledges at once.
/// The events are applied on a background task in delivery order.
pub async fn webhook_receive(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Some(secret) = state.webhook.app_secret.as_deref() {
        let signature = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok());
        if !verify_signature(secret, &body, signature) {
            warn!("webhook signature mismatch");
            return StatusCode::UNAUTHORIZED.into_response();
        }
    }

    let events = match parse_webhook(&body, state.clock.now()) {
        Ok(events) => events,
        Err(e) => {
            warn!(error = %e, "malformed webhook body");
            return error_response(StatusCode::BAD_REQUEST, "malformed webhook body");
        }
    };

    if !events.is_empty() {
        debug!(count = events.len(), "webhook events accepted");
        let engine = state.engine.clone();
        state.tasks.spawn(async move { engine.handle_batch(events).await });
    }
    (StatusCode::OK, "EVENT_RECEIVED").into_response()
}

/// GET /health/
///
/// Liveness plus storage health. Answers 503 when storage is down.
pub async fn get_health(State(state): State<GatewayState>) -> Response {
    let (status, storage) = match state.storage.health_check().await {
        Ok(HealthStatus::Healthy) => (StatusCode::OK, "healthy".to_string()),
        Ok(HealthStatus::Degraded(reason)) => (StatusCode::OK, format!("degraded: {reason}")),
        Ok(HealthStatus::Unhealthy(reason)) => {
            (StatusCode::SERVICE_UNAVAILABLE, format!("unhealthy: {reason}"))
        }
        Err(e) => (StatusCode::SERVICE_UNAVAILABLE, format!("unhealthy: {e}")),
    };

    let body = HealthResponse {
        status: if status == StatusCode::OK { "ok" } else { "error" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.health.start_time.elapsed().as_secs(),
        storage,
    };
    (status, Json(body)).into_response()
}

/// GET /order/{order_id}/
pub async fn get_order_status(
    State(state): State<GatewayState>,
    Path(order_id): Path<String>,
) -> Response {
    match state.storage.get_order(&OrderId(order_id.clone())).await {
        Ok(Some(order)) => Json(OrderStatusResponse::from(order)).into_response(),
        Ok(None) => error_response(StatusCode::NOT_FOUND, format!("order {order_id} not found")),
        Err(e) => {
            tracing::error!(order_id = %order_id, error = %e, "order lookup failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "order lookup failed")
        }
    }
}

/// GET /metrics
///
/// Prometheus text format; 404 when metrics are disabled.
pub async fn get_metrics(State(state): State<GatewayState>) -> Response {
    match &state.health.prometheus_render {
        Some(render) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4")],
            render(),
        )
            .into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handshake_params_use_hub_names() {
        let params: HandshakeParams = serde_json::from_str(
            r#"{"hub.mode":"subscribe","hub.verify_token":"t","hub.challenge":"42"}"#,
        )
        .unwrap();
        assert_eq!(params.mode.as_deref(), Some("subscribe"));
        assert_eq!(params.challenge.as_deref(), Some("42"));
    }

    #[test]
    fn health_response_serializes() {
        let resp = HealthResponse {
            status: "ok".to_string(),
            version: "0.1.0".to_string(),
            uptime_secs: 42,
            storage: "healthy".to_string(),
        };
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("\"status\":\"ok\""));
        assert!(json.contains("\"uptime_secs\":42"));
        assert!(json.contains("\"storage\":\"healthy\""));
    }

    #[test]
    fn error_response_serializes() {
        let resp = ErrorResponse {
            error: "something went wrong".to_string(),
        };
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("something went wrong"));
    }
}
