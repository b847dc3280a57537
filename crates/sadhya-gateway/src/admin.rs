// SPDX-FileCopyrightText: 2026 Sadhya Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Catalog administration routes (bearer auth).

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;

use sadhya_core::{Catalog, SadhyaError};

use crate::server::GatewayState;

/// Body of `POST /admin/locations/{id}/fee`.
#[derive(Debug, Deserialize)]
pub struct FeeUpdate {
    pub fee: u64,
}

fn failure(e: SadhyaError) -> Response {
    let status = match &e {
        SadhyaError::NotFound { .. } => StatusCode::NOT_FOUND,
        SadhyaError::Config(_) => StatusCode::UNPROCESSABLE_ENTITY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(serde_json::json!({ "error": e.to_string() }))).into_response()
}

fn current(state: &GatewayState) -> Response {
    Json(state.catalog.snapshot().as_ref().clone()).into_response()
}

/// GET /admin/catalog
pub async fn get_catalog(State(state): State<GatewayState>) -> Response {
    current(&state)
}

/// POST /admin/catalog/reload
///
/// Replaces the live catalog with a fresh read of its source. A source that
/// fails validation leaves the live catalog untouched.
pub async fn reload_catalog(State(state): State<GatewayState>) -> Response {
    let Some(reloader) = state.catalog_reloader.clone() else {
        return (
            StatusCode::NOT_IMPLEMENTED,
            Json(serde_json::json!({ "error": "catalog reload is not available" })),
        )
            .into_response();
    };
    match reloader() {
        Ok(snapshot) => {
            state.catalog.replace(snapshot);
            current(&state)
        }
        Err(e) => {
            tracing::warn!(error = %e, "catalog reload rejected");
            failure(e)
        }
    }
}

/// POST /admin/locations/{id}/activate
pub async fn activate_location(state: State<GatewayState>, id: Path<String>) -> Response {
    set_active(state, id, true)
}

/// POST /admin/locations/{id}/deactivate
pub async fn deactivate_location(state: State<GatewayState>, id: Path<String>) -> Response {
    set_active(state, id, false)
}

fn set_active(State(state): State<GatewayState>, Path(id): Path<String>, active: bool) -> Response {
    match state.catalog.set_location_active(&id, active) {
        Ok(()) => current(&state),
        Err(e) => failure(e),
    }
}

/// POST /admin/locations/{id}/fee
pub async fn set_location_fee(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
    Json(update): Json<FeeUpdate>,
) -> Response {
    match state.catalog.set_location_fee(&id, update.fee) {
        Ok(()) => current(&state),
        Err(e) => failure(e),
    }
}
