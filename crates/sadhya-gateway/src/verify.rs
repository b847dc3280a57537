// SPDX-FileCopyrightText: 2026 Sadhya Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Admin verification links.
//!
//! Each link resolves its token once and answers with a small terminal HTML
//! page. Only the first decision on an order takes effect.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};

use sadhya_core::{Order, TokenAction, VerificationStatus};
use sadhya_flow::VerificationOutcome;

use crate::server::GatewayState;

/// GET /verify/{token}/
pub async fn verify_payment(state: State<GatewayState>, token: Path<String>) -> Response {
    resolve(state, token, TokenAction::Verify).await
}

/// GET /reject/{token}/
pub async fn reject_payment(state: State<GatewayState>, token: Path<String>) -> Response {
    resolve(state, token, TokenAction::Reject).await
}

async fn resolve(
    State(state): State<GatewayState>,
    Path(token): Path<String>,
    action: TokenAction,
) -> Response {
    match state.verification.resolve(&token, action).await {
        Ok(outcome) => render(&outcome),
        Err(e) => {
            tracing::error!(action = %action, error = %e, "verification failed");
            page(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Something went wrong",
                "The decision could not be recorded. Please open the link again in a moment.",
            )
        }
    }
}

/// Terminal page for an outcome.
pub fn render(outcome: &VerificationOutcome) -> Response {
    match outcome {
        VerificationOutcome::Verified(order) => page(
            StatusCode::OK,
            "Payment verified",
            &format!(
                "{} The customer has been notified that the order is confirmed.",
                order_line(order)
            ),
        ),
        VerificationOutcome::Rejected(order) => page(
            StatusCode::OK,
            "Payment rejected",
            &format!(
                "{} The customer has been asked to contact support.",
                order_line(order)
            ),
        ),
        VerificationOutcome::AlreadyHandled { order_id, status } => {
            let decided = match status {
                Some(VerificationStatus::Verified) => "verified",
                Some(VerificationStatus::Rejected) => "rejected",
                _ => "decided",
            };
            page(
                StatusCode::CONFLICT,
                "Already handled",
                &format!("Order {order_id} was already {decided}. Nothing was changed."),
            )
        }
        VerificationOutcome::Invalid => page(
            StatusCode::NOT_FOUND,
            "Invalid link",
            "This verification link is not valid.",
        ),
    }
}

fn order_line(order: &Order) -> String {
    format!(
        "Order {} for {} ({}), total ₹{}.",
        order.order_id,
        order.delivery_date.format("%d %b %Y"),
        order.junction.name,
        order.total
    )
}

fn page(status: StatusCode, title: &str, message: &str) -> Response {
    let html = format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n\
         <title>{title}</title>\n</head>\n<body>\n<h1>{title}</h1>\n<p>{}</p>\n</body>\n</html>\n",
        escape(message)
    );
    (status, Html(html)).into_response()
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}
