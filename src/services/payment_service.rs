//! Payment reconciliation: build checkout requests for the gateway and apply
//! its signed webhook callbacks exactly once.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use sea_orm::{DatabaseTransaction, TransactionTrait};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    audit,
    config::{AppConfig, SettlementConfig},
    entity::{orders::Model as OrderModel, products::Model as ProductModel},
    error::{AppError, AppResult},
    models::OrderStatus,
    services::{
        catalog_service,
        gateway::{self, CheckoutSessionObject, CheckoutSessionRequest, LineItem, WebhookEvent},
        notification::{NotificationJob, OrderNotice},
        order_store::{self, OrderPatch},
    },
    state::AppState,
};

pub const GIFT_PAYMENT_REFERENCE: &str = "FREE_GIFT";
pub const EVENT_CHECKOUT_COMPLETED: &str = "checkout.session.completed";
pub const EVENT_CHECKOUT_EXPIRED: &str = "checkout.session.expired";

pub fn success_url(config: &AppConfig, order_id: Uuid) -> String {
    format!("{}/orders/{order_id}/success", config.frontend_url)
}

pub fn cancel_url(config: &AppConfig, order_id: Uuid) -> String {
    format!("{}/orders/{order_id}/cancel", config.frontend_url)
}

pub fn build_checkout_request(
    order: &OrderModel,
    listing: &ProductModel,
    config: &AppConfig,
    now: DateTime<Utc>,
) -> CheckoutSessionRequest {
    let mut line_items = vec![LineItem {
        name: listing.title.clone(),
        description: listing.description.clone().filter(|d| !d.is_empty()),
        unit_amount: order.unit_price,
        quantity: i64::from(order.quantity),
    }];
    if order.shipping_cost > 0 {
        line_items.push(LineItem {
            name: "Shipping".to_string(),
            description: None,
            unit_amount: order.shipping_cost,
            quantity: 1,
        });
    }

    let metadata = BTreeMap::from([
        ("order_id".to_string(), order.id.to_string()),
        ("buyer_id".to_string(), order.buyer_id.to_string()),
        ("seller_id".to_string(), order.seller_id.to_string()),
        ("product_id".to_string(), order.product_id.to_string()),
    ]);

    CheckoutSessionRequest {
        order_id: order.id,
        currency: config.settlement.currency.clone(),
        line_items,
        success_url: format!(
            "{}?session_id={{CHECKOUT_SESSION_ID}}",
            success_url(config, order.id)
        ),
        cancel_url: cancel_url(config, order.id),
        expires_at: now + config.settlement.checkout_ttl(),
        metadata,
    }
}

/// PENDING -> PAID with the stock decrement, inside the caller's transaction.
pub async fn mark_paid(
    txn: &DatabaseTransaction,
    cfg: &SettlementConfig,
    order: OrderModel,
    payment_reference: String,
    now: DateTime<Utc>,
) -> AppResult<(OrderModel, ProductModel)> {
    let listing =
        catalog_service::decrement_available(txn, order.product_id, order.quantity, now).await?;
    let patch = OrderPatch {
        paid_at: Some(now),
        payment_intent_id: Some(payment_reference),
        ..OrderPatch::default()
    };
    let order =
        order_store::enter_status(txn, cfg, order, OrderStatus::Paid, patch, None, now).await?;
    Ok((order, listing))
}

pub fn order_notice(order: &OrderModel, listing: &ProductModel) -> OrderNotice {
    OrderNotice {
        order_id: order.id,
        buyer_id: order.buyer_id,
        seller_id: order.seller_id,
        product_title: listing.title.clone(),
        quantity: order.quantity,
        total_amount: order.total_amount,
        delivery_type: order.delivery_type,
    }
}

/// Ask the gateway for a checkout page and remember its session id. The order
/// is already committed; on failure it stays PENDING and the caller gets the
/// id back to retry.
pub async fn start_checkout(
    state: &AppState,
    order: OrderModel,
    listing: &ProductModel,
) -> AppResult<(OrderModel, String)> {
    let request = build_checkout_request(&order, listing, &state.config, Utc::now());
    let session = match state.gateway.create_checkout_session(&request).await {
        Ok(session) => session,
        Err(err) => {
            tracing::warn!(order_id = %order.id, error = %err, "checkout session creation failed");
            return Err(AppError::GatewayUnavailable { order_id: order.id });
        }
    };

    let txn = state.orm.begin().await?;
    let current = order_store::lock_order(&txn, order.id).await?;
    let order = if current.status == OrderStatus::Pending {
        let patch = OrderPatch {
            checkout_session_id: Some(session.id.clone()),
            ..OrderPatch::default()
        };
        order_store::apply_patch(&txn, current, patch, Utc::now()).await?
    } else {
        current
    };
    txn.commit().await?;

    tracing::info!(order_id = %order.id, session_id = %session.id, "checkout session created");
    Ok((order, session.url))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum WebhookOutcome {
    Settled { order_id: Uuid },
    Cancelled { order_id: Uuid },
    AlreadyProcessed { order_id: Uuid },
    /// Payment captured for an order that can no longer take it.
    RefundDue { order_id: Uuid },
    /// Event for a checkout session the order has since replaced.
    Superseded { order_id: Uuid },
    Ignored { event_type: String },
}

pub async fn handle_webhook(
    state: &AppState,
    payload: &[u8],
    signature: Option<&str>,
) -> AppResult<WebhookOutcome> {
    let signature = signature.ok_or(AppError::InvalidSignature)?;
    if let Err(reason) = gateway::verify_signature(
        payload,
        signature,
        &state.config.stripe_webhook_secret,
        Utc::now(),
    ) {
        tracing::warn!(reason, "webhook signature rejected");
        return Err(AppError::InvalidSignature);
    }

    let event: WebhookEvent = serde_json::from_slice(payload)
        .map_err(|err| AppError::BadRequest(format!("Malformed webhook payload: {err}")))?;
    tracing::info!(event_id = %event.id, event_type = %event.event_type, "webhook received");

    match event.event_type.as_str() {
        EVENT_CHECKOUT_COMPLETED | EVENT_CHECKOUT_EXPIRED => {
            let session: CheckoutSessionObject = serde_json::from_value(event.data.object)
                .map_err(|err| AppError::BadRequest(format!("Malformed checkout session: {err}")))?;
            if event.event_type == EVENT_CHECKOUT_COMPLETED {
                settle_checkout(state, &session).await
            } else {
                expire_checkout(state, &session).await
            }
        }
        other => {
            tracing::debug!(event_type = other, "webhook event ignored");
            Ok(WebhookOutcome::Ignored {
                event_type: other.to_string(),
            })
        }
    }
}

async fn lock_session_order(
    txn: &DatabaseTransaction,
    session: &CheckoutSessionObject,
) -> AppResult<Option<OrderModel>> {
    match session.order_id() {
        Some(order_id) => match order_store::lock_order(txn, order_id).await {
            Ok(order) => Ok(Some(order)),
            Err(AppError::NotFound) => Ok(None),
            Err(err) => Err(err),
        },
        None => order_store::lock_order_by_checkout_session(txn, &session.id).await,
    }
}

async fn settle_checkout(
    state: &AppState,
    session: &CheckoutSessionObject,
) -> AppResult<WebhookOutcome> {
    let now = Utc::now();
    let txn = state.orm.begin().await?;
    let Some(order) = lock_session_order(&txn, session).await? else {
        tracing::warn!(session_id = %session.id, "completed checkout for unknown order");
        return Ok(WebhookOutcome::Ignored {
            event_type: EVENT_CHECKOUT_COMPLETED.to_string(),
        });
    };

    let reference = session
        .payment_intent
        .clone()
        .unwrap_or_else(|| session.id.clone());

    if order.status != OrderStatus::Pending {
        if order.payment_intent_id.as_deref() == Some(reference.as_str()) {
            tracing::info!(
                order_id = %order.id,
                status = %order.status,
                "duplicate payment confirmation ignored"
            );
            return Ok(WebhookOutcome::AlreadyProcessed { order_id: order.id });
        }
        drop(txn);
        return Ok(refund_due(state, &order, session, &reference).await);
    }

    let (order, listing) =
        mark_paid(&txn, &state.config.settlement, order, reference, now).await?;
    txn.commit().await?;

    state
        .notifications
        .submit(NotificationJob::OrderConfirmed(order_notice(&order, &listing)));
    audit::record(
        &state.pool,
        Some(order.buyer_id),
        "order_paid",
        "orders",
        serde_json::json!({ "order_id": order.id, "session_id": session.id }),
    )
    .await;

    Ok(WebhookOutcome::Settled { order_id: order.id })
}

/// A second or late payment landed on an order that is no longer waiting for
/// one. The money has been captured, so leave a trail for a manual refund.
async fn refund_due(
    state: &AppState,
    order: &OrderModel,
    session: &CheckoutSessionObject,
    reference: &str,
) -> WebhookOutcome {
    tracing::warn!(
        order_id = %order.id,
        status = %order.status,
        session_id = %session.id,
        payment_reference = reference,
        "payment captured for an order that cannot accept it, refund due"
    );
    audit::record(
        &state.pool,
        Some(order.buyer_id),
        "refund_due",
        "orders",
        serde_json::json!({
            "order_id": order.id,
            "status": order.status,
            "session_id": session.id,
            "payment_reference": reference,
        }),
    )
    .await;
    WebhookOutcome::RefundDue { order_id: order.id }
}

async fn expire_checkout(
    state: &AppState,
    session: &CheckoutSessionObject,
) -> AppResult<WebhookOutcome> {
    let now = Utc::now();
    let txn = state.orm.begin().await?;
    let Some(order) = lock_session_order(&txn, session).await? else {
        tracing::warn!(session_id = %session.id, "expired checkout for unknown order");
        return Ok(WebhookOutcome::Ignored {
            event_type: EVENT_CHECKOUT_EXPIRED.to_string(),
        });
    };

    if order.status != OrderStatus::Pending {
        return Ok(WebhookOutcome::AlreadyProcessed { order_id: order.id });
    }
    if order
        .checkout_session_id
        .as_deref()
        .is_some_and(|current| current != session.id)
    {
        tracing::info!(
            order_id = %order.id,
            session_id = %session.id,
            "expiry of a replaced checkout session ignored"
        );
        return Ok(WebhookOutcome::Superseded { order_id: order.id });
    }

    let patch = OrderPatch {
        cancellation_reason: Some("Checkout session expired".to_string()),
        ..OrderPatch::default()
    };
    let order = order_store::enter_status(
        &txn,
        &state.config.settlement,
        order,
        OrderStatus::Cancelled,
        patch,
        None,
        now,
    )
    .await?;
    txn.commit().await?;

    audit::record(
        &state.pool,
        None,
        "order_checkout_expired",
        "orders",
        serde_json::json!({ "order_id": order.id, "session_id": session.id }),
    )
    .await;

    Ok(WebhookOutcome::Cancelled { order_id: order.id })
}
