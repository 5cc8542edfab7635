use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::HeaderMap,
    routing::post,
};

use crate::{
    error::AppResult,
    response::{ApiResponse, Meta},
    services::payment_service::{self, WebhookOutcome},
    state::AppState,
};

pub const SIGNATURE_HEADER: &str = "stripe-signature";

pub fn router() -> Router<AppState> {
    Router::new().route("/payments", post(payment_webhook))
}

/// The body is taken raw: the signature covers the exact bytes received.
#[utoipa::path(
    post,
    path = "/api/webhooks/payments",
    request_body(content = String, content_type = "application/json", description = "Gateway event, verified against the Stripe-Signature header"),
    params(("Stripe-Signature" = String, Header, description = "t=<unix>,v1=<hex hmac>")),
    responses(
        (status = 200, description = "Outcome of the event; late or duplicate payments are flagged as refund_due", body = ApiResponse<WebhookOutcome>),
        (status = 400, description = "Missing or invalid signature, malformed payload"),
    ),
    tag = "Webhooks"
)]
pub async fn payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<Json<ApiResponse<WebhookOutcome>>> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());
    let outcome = payment_service::handle_webhook(&state, &body, signature).await?;
    Ok(Json(ApiResponse::success(
        "Webhook processed",
        outcome,
        Some(Meta::empty()),
    )))
}
