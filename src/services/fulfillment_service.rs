//! Pickup codes and shipment tracking.

use chrono::{DateTime, Utc};
use rand::{RngCore, rngs::OsRng};
use sea_orm::TransactionTrait;
use uuid::Uuid;

use crate::{
    config::SettlementConfig,
    dto::orders::{PickupCodeView, TrackingRequest},
    entity::orders::Model as OrderModel,
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{DeliveryType, OrderStatus},
    services::{
        order_store::{self, OrderPatch},
        policy::{self, OrderAction},
    },
    state::AppState,
};

const PICKUP_CODE_BYTES: usize = 32;

#[derive(Debug, Clone)]
pub struct PickupTicket {
    pub code: String,
    pub expires_at: DateTime<Utc>,
    pub deadline: DateTime<Utc>,
}

/// 32 bytes from the OS RNG, hex encoded.
pub fn generate_pickup_code() -> String {
    let mut bytes = [0u8; PICKUP_CODE_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

pub fn issue_pickup_ticket(cfg: &SettlementConfig, now: DateTime<Utc>) -> PickupTicket {
    PickupTicket {
        code: generate_pickup_code(),
        expires_at: now + cfg.pickup_code_ttl(),
        deadline: now + cfg.pickup_deadline(),
    }
}

/// A code confirms only while the order waits for collection and before expiry.
pub fn check_pickup_code(order: &OrderModel, now: DateTime<Utc>) -> AppResult<()> {
    if !order.status.is_pickup_confirmable() {
        return Err(AppError::InvalidOrExpiredCode);
    }
    match order.pickup_code_expires_at {
        Some(expiry) if now < expiry.with_timezone(&Utc) => Ok(()),
        _ => Err(AppError::InvalidOrExpiredCode),
    }
}

pub async fn confirm_pickup(
    state: &AppState,
    actor: &AuthUser,
    code: &str,
) -> AppResult<OrderModel> {
    let code = code.trim();
    if code.is_empty() {
        return Err(AppError::BadRequest("pickup_code is required".into()));
    }

    let now = Utc::now();
    let txn = state.orm.begin().await?;
    let order = order_store::lock_order_by_pickup_code(&txn, code)
        .await?
        .ok_or(AppError::InvalidOrExpiredCode)?;

    if !policy::allows(actor, &order, OrderAction::ConfirmPickup) {
        return Err(AppError::Forbidden);
    }
    check_pickup_code(&order, now)?;

    let patch = OrderPatch {
        pickup_scanned_at: Some(now),
        ..OrderPatch::default()
    };
    let order = order_store::enter_status(
        &txn,
        &state.config.settlement,
        order,
        OrderStatus::Delivered,
        patch,
        Some(actor.user_id),
        now,
    )
    .await?;
    txn.commit().await?;

    tracing::info!(order_id = %order.id, "pickup confirmed");
    Ok(order)
}

pub fn pickup_code_view(actor: &AuthUser, order: &OrderModel) -> AppResult<PickupCodeView> {
    policy::ensure(actor, order, OrderAction::ViewPickupCode)?;
    if order.delivery_type != DeliveryType::Pickup {
        return Err(AppError::BadRequest("Order is not a pickup order".into()));
    }
    if !order.status.is_pickup_confirmable() {
        return Err(AppError::BadRequest(format!(
            "Pickup code is not available while the order is {}",
            order.status
        )));
    }
    let code = order.pickup_code.clone().ok_or(AppError::NotFound)?;

    Ok(PickupCodeView {
        order_id: order.id,
        pickup_code: code,
        expires_at: order.pickup_code_expires_at.map(|dt| dt.with_timezone(&Utc)),
        pickup_deadline: order.pickup_deadline.map(|dt| dt.with_timezone(&Utc)),
        pickup_address: order.pickup_address.clone(),
        pickup_instructions: order.pickup_instructions.clone(),
    })
}

pub async fn update_tracking(
    state: &AppState,
    actor: &AuthUser,
    order_id: Uuid,
    payload: TrackingRequest,
) -> AppResult<OrderModel> {
    let tracking_number = payload.tracking_number.trim().to_string();
    if tracking_number.is_empty() {
        return Err(AppError::BadRequest("tracking_number is required".into()));
    }

    let now = Utc::now();
    let txn = state.orm.begin().await?;
    let order = order_store::lock_order(&txn, order_id).await?;
    policy::ensure(actor, &order, OrderAction::UpdateTracking)?;

    if order.delivery_type == DeliveryType::Pickup {
        return Err(AppError::BadRequest("Pickup orders have no tracking".into()));
    }
    if !matches!(order.status, OrderStatus::Paid | OrderStatus::Processing) {
        return Err(AppError::InvalidTransition {
            current: order.status,
            requested: OrderStatus::Shipped,
        });
    }

    let patch = OrderPatch {
        tracking_number: Some(tracking_number),
        tracking_url: payload.tracking_url.filter(|s| !s.trim().is_empty()),
        shipping_carrier: payload.shipping_carrier.filter(|s| !s.trim().is_empty()),
        ..OrderPatch::default()
    };
    let order = order_store::enter_status(
        &txn,
        &state.config.settlement,
        order,
        OrderStatus::Shipped,
        patch,
        Some(actor.user_id),
        now,
    )
    .await?;
    txn.commit().await?;
    Ok(order)
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    #[test]
    fn codes_are_long_hex_and_distinct() {
        let a = generate_pickup_code();
        let b = generate_pickup_code();
        assert_eq!(a.len(), PICKUP_CODE_BYTES * 2);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn ticket_lifetimes_follow_config() {
        let now = Utc::now();
        let ticket = issue_pickup_ticket(&SettlementConfig::default(), now);
        assert_eq!(ticket.expires_at - now, Duration::days(7));
        assert_eq!(ticket.deadline - now, Duration::days(7));
    }
}
