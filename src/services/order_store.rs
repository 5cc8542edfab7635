//! Order persistence and the fulfillment state machine. Every write goes
//! through `OrderPatch` on a row locked with `FOR UPDATE`.

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseTransaction, EntityTrait, QueryFilter, QuerySelect, Set,
};
use sea_orm::sea_query::LockType;
use uuid::Uuid;

use crate::{
    config::SettlementConfig,
    entity::orders::{ActiveModel as OrderActive, Column as OrderCol, Entity as Orders, Model as OrderModel},
    error::{AppError, AppResult},
    models::OrderStatus,
    services::ledger_service,
};

/// Targets reachable through a status update. PAID, PENDING and DISPUTED are
/// only entered through their own workflows.
pub const UPDATABLE_TARGETS: [OrderStatus; 8] = [
    OrderStatus::Processing,
    OrderStatus::ReadyForPickup,
    OrderStatus::Shipped,
    OrderStatus::InTransit,
    OrderStatus::Delivered,
    OrderStatus::Completed,
    OrderStatus::Cancelled,
    OrderStatus::Refunded,
];

pub fn allowed_targets(from: OrderStatus) -> &'static [OrderStatus] {
    use OrderStatus::*;
    match from {
        Paid => &[Processing, ReadyForPickup, Shipped],
        Processing => &[ReadyForPickup, Shipped],
        ReadyForPickup => &[Delivered],
        Shipped => &[InTransit, Delivered],
        InTransit => &[Delivered],
        Delivered => &[Completed],
        _ => &[],
    }
}

pub fn check_transition(
    current: OrderStatus,
    requested: OrderStatus,
    forced: bool,
) -> AppResult<()> {
    let permitted = if forced {
        current != requested
    } else {
        allowed_targets(current).contains(&requested)
    };
    if !permitted {
        return Err(AppError::InvalidTransition { current, requested });
    }
    Ok(())
}

/// Partial update of an order row. Only fields that are `Some` are written.
#[derive(Debug, Default, Clone)]
pub struct OrderPatch {
    pub status: Option<OrderStatus>,
    pub checkout_session_id: Option<String>,
    pub payment_intent_id: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub pickup_scanned_at: Option<DateTime<Utc>>,
    pub tracking_number: Option<String>,
    pub tracking_url: Option<String>,
    pub shipping_carrier: Option<String>,
    pub shipped_at: Option<DateTime<Utc>>,
    pub payout_scheduled_at: Option<DateTime<Utc>>,
    pub impact_recorded_at: Option<DateTime<Utc>>,
    pub seller_notes: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancelled_by: Option<Uuid>,
    pub cancellation_reason: Option<String>,
}

impl OrderPatch {
    pub fn status(status: OrderStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.checkout_session_id.is_none()
            && self.payment_intent_id.is_none()
            && self.paid_at.is_none()
            && self.pickup_scanned_at.is_none()
            && self.tracking_number.is_none()
            && self.tracking_url.is_none()
            && self.shipping_carrier.is_none()
            && self.shipped_at.is_none()
            && self.payout_scheduled_at.is_none()
            && self.impact_recorded_at.is_none()
            && self.seller_notes.is_none()
            && self.completed_at.is_none()
            && self.cancelled_at.is_none()
            && self.cancelled_by.is_none()
            && self.cancellation_reason.is_none()
    }

    pub fn into_active(self, model: OrderModel, now: DateTime<Utc>) -> OrderActive {
        let mut active: OrderActive = model.into();
        if let Some(v) = self.status {
            active.status = Set(v);
        }
        if let Some(v) = self.checkout_session_id {
            active.checkout_session_id = Set(Some(v));
        }
        if let Some(v) = self.payment_intent_id {
            active.payment_intent_id = Set(Some(v));
        }
        if let Some(v) = self.paid_at {
            active.paid_at = Set(Some(v.into()));
        }
        if let Some(v) = self.pickup_scanned_at {
            active.pickup_scanned_at = Set(Some(v.into()));
        }
        if let Some(v) = self.tracking_number {
            active.tracking_number = Set(Some(v));
        }
        if let Some(v) = self.tracking_url {
            active.tracking_url = Set(Some(v));
        }
        if let Some(v) = self.shipping_carrier {
            active.shipping_carrier = Set(Some(v));
        }
        if let Some(v) = self.shipped_at {
            active.shipped_at = Set(Some(v.into()));
        }
        if let Some(v) = self.payout_scheduled_at {
            active.payout_scheduled_at = Set(Some(v.into()));
        }
        if let Some(v) = self.impact_recorded_at {
            active.impact_recorded_at = Set(Some(v.into()));
        }
        if let Some(v) = self.seller_notes {
            active.seller_notes = Set(Some(v));
        }
        if let Some(v) = self.completed_at {
            active.completed_at = Set(Some(v.into()));
        }
        if let Some(v) = self.cancelled_at {
            active.cancelled_at = Set(Some(v.into()));
        }
        if let Some(v) = self.cancelled_by {
            active.cancelled_by = Set(Some(v));
        }
        if let Some(v) = self.cancellation_reason {
            active.cancellation_reason = Set(Some(v));
        }
        active.updated_at = Set(now.into());
        active
    }
}

pub async fn lock_order(txn: &DatabaseTransaction, id: Uuid) -> AppResult<OrderModel> {
    Orders::find_by_id(id)
        .lock(LockType::Update)
        .one(txn)
        .await?
        .ok_or(AppError::NotFound)
}

pub async fn lock_order_by_pickup_code(
    txn: &DatabaseTransaction,
    code: &str,
) -> AppResult<Option<OrderModel>> {
    Ok(Orders::find()
        .filter(OrderCol::PickupCode.eq(code))
        .lock(LockType::Update)
        .one(txn)
        .await?)
}

pub async fn lock_order_by_checkout_session(
    txn: &DatabaseTransaction,
    session_id: &str,
) -> AppResult<Option<OrderModel>> {
    Ok(Orders::find()
        .filter(OrderCol::CheckoutSessionId.eq(session_id))
        .lock(LockType::Update)
        .one(txn)
        .await?)
}

pub async fn apply_patch(
    txn: &DatabaseTransaction,
    order: OrderModel,
    patch: OrderPatch,
    now: DateTime<Utc>,
) -> AppResult<OrderModel> {
    if patch.is_empty() {
        return Ok(order);
    }
    Ok(patch.into_active(order, now).update(txn).await?)
}

/// Move a locked order to `target`, writing the side effects that belong to
/// the target state. Table checks are the caller's job.
pub async fn enter_status(
    txn: &DatabaseTransaction,
    cfg: &SettlementConfig,
    order: OrderModel,
    target: OrderStatus,
    mut patch: OrderPatch,
    actor_id: Option<Uuid>,
    now: DateTime<Utc>,
) -> AppResult<OrderModel> {
    let from = order.status;
    patch.status = Some(target);

    match target {
        OrderStatus::Shipped if order.shipped_at.is_none() => {
            patch.shipped_at = Some(now);
        }
        OrderStatus::Delivered => {
            patch.payout_scheduled_at = Some(now + cfg.payout_delay());
        }
        OrderStatus::Completed => {
            if order.completed_at.is_none() {
                patch.completed_at = Some(now);
            }
            if order.impact_recorded_at.is_none() {
                ledger_service::grant_order_impact(txn, cfg, &order, now).await?;
                patch.impact_recorded_at = Some(now);
            }
        }
        OrderStatus::Cancelled => {
            patch.cancelled_at = Some(now);
            patch.cancelled_by = actor_id;
        }
        _ => {}
    }

    let updated = apply_patch(txn, order, patch, now).await?;
    tracing::info!(
        order_id = %updated.id,
        from = %from,
        to = %updated.status,
        "order status changed"
    );
    Ok(updated)
}

#[cfg(test)]
mod tests {
    use sea_orm::ActiveValue;

    use super::*;
    use crate::models::DeliveryType;

    const ALL: [OrderStatus; 11] = [
        OrderStatus::Pending,
        OrderStatus::Paid,
        OrderStatus::Processing,
        OrderStatus::ReadyForPickup,
        OrderStatus::Shipped,
        OrderStatus::InTransit,
        OrderStatus::Delivered,
        OrderStatus::Completed,
        OrderStatus::Cancelled,
        OrderStatus::Refunded,
        OrderStatus::Disputed,
    ];

    #[test]
    fn table_lists_every_permitted_move() {
        let permitted = [
            (OrderStatus::Paid, OrderStatus::Processing),
            (OrderStatus::Paid, OrderStatus::ReadyForPickup),
            (OrderStatus::Paid, OrderStatus::Shipped),
            (OrderStatus::Processing, OrderStatus::ReadyForPickup),
            (OrderStatus::Processing, OrderStatus::Shipped),
            (OrderStatus::ReadyForPickup, OrderStatus::Delivered),
            (OrderStatus::Shipped, OrderStatus::InTransit),
            (OrderStatus::Shipped, OrderStatus::Delivered),
            (OrderStatus::InTransit, OrderStatus::Delivered),
            (OrderStatus::Delivered, OrderStatus::Completed),
        ];
        for from in ALL {
            for to in ALL {
                let result = check_transition(from, to, false);
                if permitted.contains(&(from, to)) {
                    assert!(result.is_ok(), "{from} -> {to} should be allowed");
                } else {
                    match result {
                        Err(AppError::InvalidTransition { current, requested }) => {
                            assert_eq!((current, requested), (from, to));
                        }
                        other => panic!("{from} -> {to} gave {other:?}"),
                    }
                }
            }
        }
    }

    #[test]
    fn forced_moves_skip_the_table_but_not_no_ops() {
        assert!(check_transition(OrderStatus::Paid, OrderStatus::Completed, true).is_ok());
        assert!(check_transition(OrderStatus::Shipped, OrderStatus::Shipped, true).is_err());
    }

    fn sample_order() -> OrderModel {
        let now: sea_orm::prelude::DateTimeWithTimeZone = Utc::now().into();
        OrderModel {
            id: Uuid::new_v4(),
            buyer_id: Uuid::new_v4(),
            seller_id: Uuid::new_v4(),
            product_id: Uuid::new_v4(),
            quantity: 1,
            unit_price: 1_000,
            shipping_cost: 0,
            total_amount: 1_000,
            platform_fee: 100,
            gateway_fee: 39,
            seller_payout: 861,
            status: OrderStatus::Paid,
            delivery_type: DeliveryType::SellerShips,
            pickup_location_id: None,
            pickup_address: None,
            pickup_instructions: None,
            pickup_deadline: None,
            pickup_code: None,
            pickup_code_expires_at: None,
            pickup_scanned_at: None,
            shipping_address: Some("Via Roma 1".into()),
            shipping_city: Some("Milano".into()),
            shipping_postal_code: Some("20100".into()),
            shipping_country: Some("IT".into()),
            tracking_number: None,
            tracking_url: Some("https://old.example/track".into()),
            shipping_carrier: None,
            shipped_at: None,
            checkout_session_id: Some("cs_1".into()),
            payment_intent_id: Some("pi_1".into()),
            paid_at: Some(now),
            payout_scheduled_at: None,
            payout_completed_at: None,
            co2_saved: 2.0,
            water_saved: 500.0,
            eco_credits_buyer: 100,
            eco_credits_seller: 150,
            impact_recorded_at: None,
            buyer_notes: None,
            seller_notes: None,
            completed_at: None,
            cancelled_at: None,
            cancelled_by: None,
            cancellation_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn patch_touches_only_supplied_fields() {
        let patch = OrderPatch {
            tracking_number: Some("TRK-1".into()),
            ..OrderPatch::status(OrderStatus::Shipped)
        };
        let active = patch.into_active(sample_order(), Utc::now());

        assert_eq!(active.status, ActiveValue::Set(OrderStatus::Shipped));
        assert_eq!(active.tracking_number, ActiveValue::Set(Some("TRK-1".to_string())));
        assert!(matches!(active.tracking_url, ActiveValue::Unchanged(_)));
        assert!(matches!(active.payment_intent_id, ActiveValue::Unchanged(_)));
        assert!(matches!(active.updated_at, ActiveValue::Set(_)));
    }

    #[test]
    fn empty_patch_is_detected() {
        assert!(OrderPatch::default().is_empty());
        assert!(!OrderPatch::status(OrderStatus::Delivered).is_empty());
    }
}
