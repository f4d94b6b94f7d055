//! HTTP Handlers

use axum::{
    extract::{FromRequest, Path, Query, Request, State},
    http::{header::CONTENT_TYPE, StatusCode},
    response::IntoResponse,
    Form, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use paybot_payments::CallbackPayload;

use crate::state::AppState;

// ============================================================================
// Response Types
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SubscriptionStatusResponse {
    pub user_id: i64,
    pub active: bool,
    pub subscription_end: Option<DateTime<Utc>>,
}

/// Query string ToyyibPay appends to `billReturnUrl`
#[derive(Debug, Default, Deserialize)]
pub struct ReturnParams {
    #[serde(default)]
    pub status_id: Option<String>,
    #[serde(default)]
    pub billcode: Option<String>,
    #[serde(default)]
    pub order_id: Option<String>,
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// ToyyibPay payment callback
///
/// Accepts JSON or form bodies. Anything that decodes is acknowledged with
/// 200; processing failures are logged by the callback handler.
pub async fn payment_callback(
    State(state): State<AppState>,
    req: Request,
) -> Result<&'static str, (StatusCode, Json<ErrorResponse>)> {
    let is_json = req
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/json"));

    let payload = if is_json {
        Json::<CallbackPayload>::from_request(req, &state)
            .await
            .map(|Json(p)| p)
            .map_err(|e| e.body_text())
    } else {
        Form::<CallbackPayload>::from_request(req, &state)
            .await
            .map(|Form(p)| p)
            .map_err(|e| e.body_text())
    };

    let payload = payload.map_err(|error| {
        tracing::warn!(error = %error, "Undecodable payment callback");
        (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error,
                code: "INVALID_CALLBACK".into(),
            }),
        )
    })?;

    state.callbacks.handle_callback(&payload).await;

    Ok("OK")
}

/// Browser landing page after payment
pub async fn payment_return(Query(params): Query<ReturnParams>) -> impl IntoResponse {
    tracing::info!(
        status_id = ?params.status_id,
        billcode = ?params.billcode,
        order_id = ?params.order_id,
        "Payer returned from ToyyibPay"
    );

    match params.status_id.as_deref() {
        Some("1") => "Payment received. You can return to Telegram now.",
        Some("2") => "Payment is pending. You will be notified in Telegram once it clears.",
        _ => "Payment was not completed. You can try again from Telegram.",
    }
}

/// Subscription status for one user
pub async fn subscription_status(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> Json<SubscriptionStatusResponse> {
    let record = state.store.get(user_id).await;

    Json(SubscriptionStatusResponse {
        user_id,
        active: record.as_ref().is_some_and(|r| r.is_active(Utc::now())),
        subscription_end: record.map(|r| r.subscription_end),
    })
}
