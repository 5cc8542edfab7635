//! Order orchestrator. Request handlers call into this module only; it
//! sequences pricing, persistence, payment and fulfillment and wraps results
//! in the API envelope.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit,
    dto::{
        disputes::{DisputeWithOrder, OpenDisputeRequest, RespondDisputeRequest},
        orders::{
            CancelOrderRequest, CheckoutRedirect, ConfirmPickupRequest, CreateOrderRequest,
            CreateReviewRequest, OrderList, PickupCodeView, ReviewCreated, TrackingRequest,
            UpdateStatusRequest,
        },
    },
    entity::orders::{ActiveModel as OrderActive, Column as OrderCol, Entity as Orders, Model as OrderModel},
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_active},
    models::{DeliveryType, Dispute, Order, OrderStatus, Review},
    response::{ApiResponse, Meta},
    routes::params::{OrderListQuery, SortOrder},
    services::{
        catalog_service, dispute_service, fulfillment_service,
        notification::NotificationJob,
        order_store::{self, OrderPatch, UPDATABLE_TARGETS},
        payment_service::{self, GIFT_PAYMENT_REFERENCE},
        policy::{self, OrderAction},
        pricing, review_service,
    },
    state::AppState,
};

struct ShippingSnapshot {
    address: Option<String>,
    city: Option<String>,
    postal_code: Option<String>,
    country: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn shipping_snapshot(payload: &CreateOrderRequest) -> AppResult<ShippingSnapshot> {
    let snapshot = ShippingSnapshot {
        address: non_empty(payload.shipping_address.clone()),
        city: non_empty(payload.shipping_city.clone()),
        postal_code: non_empty(payload.shipping_postal_code.clone()),
        country: non_empty(payload.shipping_country.clone()),
    };
    if payload.delivery_type != DeliveryType::Pickup
        && (snapshot.address.is_none() || snapshot.city.is_none() || snapshot.postal_code.is_none())
    {
        return Err(AppError::MissingShippingInfo);
    }
    Ok(snapshot)
}

pub async fn create_order(
    state: &AppState,
    actor: &AuthUser,
    payload: CreateOrderRequest,
) -> AppResult<ApiResponse<CheckoutRedirect>> {
    ensure_active(actor)?;
    if payload.quantity < 1 {
        return Err(AppError::BadRequest("quantity must be at least 1".into()));
    }
    let shipping = shipping_snapshot(&payload)?;

    let cfg = &state.config.settlement;
    let now = Utc::now();
    let txn = state.orm.begin().await?;

    let listing = catalog_service::get_listing(&txn, payload.product_id).await?;
    if !listing.is_active {
        return Err(AppError::NotFound);
    }
    if listing.seller_id == actor.user_id {
        return Err(AppError::SelfPurchase);
    }
    if payload.quantity > listing.quantity_available {
        return Err(AppError::InsufficientStock {
            requested: payload.quantity,
            available: listing.quantity_available,
        });
    }
    if !dispute_service::can_user_order(&txn, cfg, actor.user_id, now).await? {
        return Err(AppError::OrderingSuspended);
    }

    let unit_price = catalog_service::effective_price(&listing, now);
    let shipping_cost = match payload.delivery_type {
        DeliveryType::SellerShips => listing.shipping_cost,
        DeliveryType::Pickup | DeliveryType::BuyerArranges => 0,
    };
    let total = unit_price * i64::from(payload.quantity) + shipping_cost;
    let fees = pricing::compute_fees(total, cfg);
    let impact = pricing::impact_snapshot(
        listing.co2_per_unit_kg,
        listing.water_per_unit_l,
        payload.quantity,
        total,
        cfg,
    );
    let ticket = (payload.delivery_type == DeliveryType::Pickup)
        .then(|| fulfillment_service::issue_pickup_ticket(cfg, now));
    let is_pickup = ticket.is_some();

    let order = OrderActive {
        id: Set(Uuid::new_v4()),
        buyer_id: Set(actor.user_id),
        seller_id: Set(listing.seller_id),
        product_id: Set(listing.id),
        quantity: Set(payload.quantity),
        unit_price: Set(unit_price),
        shipping_cost: Set(shipping_cost),
        total_amount: Set(total),
        platform_fee: Set(fees.platform_fee),
        gateway_fee: Set(fees.gateway_fee),
        seller_payout: Set(fees.seller_payout),
        status: Set(OrderStatus::Pending),
        delivery_type: Set(payload.delivery_type),
        pickup_location_id: Set(listing.pickup_location_id.filter(|_| is_pickup)),
        pickup_address: Set(listing.pickup_address.clone().filter(|_| is_pickup)),
        pickup_instructions: Set(listing.pickup_instructions.clone().filter(|_| is_pickup)),
        pickup_deadline: Set(ticket.as_ref().map(|t| t.deadline.into())),
        pickup_code: Set(ticket.as_ref().map(|t| t.code.clone())),
        pickup_code_expires_at: Set(ticket.as_ref().map(|t| t.expires_at.into())),
        pickup_scanned_at: Set(None),
        shipping_address: Set(shipping.address),
        shipping_city: Set(shipping.city),
        shipping_postal_code: Set(shipping.postal_code),
        shipping_country: Set(shipping.country),
        tracking_number: Set(None),
        tracking_url: Set(None),
        shipping_carrier: Set(None),
        shipped_at: Set(None),
        checkout_session_id: Set(None),
        payment_intent_id: Set(None),
        paid_at: Set(None),
        payout_scheduled_at: Set(None),
        payout_completed_at: Set(None),
        co2_saved: Set(impact.co2_saved),
        water_saved: Set(impact.water_saved),
        eco_credits_buyer: Set(impact.buyer_credits),
        eco_credits_seller: Set(impact.seller_credits),
        impact_recorded_at: Set(None),
        buyer_notes: Set(non_empty(payload.buyer_notes)),
        seller_notes: Set(None),
        completed_at: Set(None),
        cancelled_at: Set(None),
        cancelled_by: Set(None),
        cancellation_reason: Set(None),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    }
    .insert(&txn)
    .await?;

    tracing::info!(
        order_id = %order.id,
        product_id = %order.product_id,
        total = order.total_amount,
        "order created"
    );

    if order.total_amount == 0 {
        let (order, listing) = payment_service::mark_paid(
            &txn,
            cfg,
            order,
            GIFT_PAYMENT_REFERENCE.to_string(),
            now,
        )
        .await?;
        txn.commit().await?;

        state.notifications.submit(NotificationJob::OrderConfirmed(
            payment_service::order_notice(&order, &listing),
        ));
        audit::record(
            &state.pool,
            Some(actor.user_id),
            "order_created",
            "orders",
            serde_json::json!({ "order_id": order.id, "gift": true }),
        )
        .await;

        let redirect_url = payment_service::success_url(&state.config, order.id);
        return Ok(ApiResponse::success(
            "Gift order confirmed",
            CheckoutRedirect {
                order: policy::redact(actor, Order::from(order)),
                redirect_url,
                checkout_session_id: None,
            },
            Some(Meta::empty()),
        ));
    }

    txn.commit().await?;
    audit::record(
        &state.pool,
        Some(actor.user_id),
        "order_created",
        "orders",
        serde_json::json!({ "order_id": order.id, "total_amount": order.total_amount }),
    )
    .await;

    let (order, redirect_url) = payment_service::start_checkout(state, order, &listing).await?;
    let checkout_session_id = order.checkout_session_id.clone();
    Ok(ApiResponse::success(
        "Order created",
        CheckoutRedirect {
            order: policy::redact(actor, Order::from(order)),
            redirect_url,
            checkout_session_id,
        },
        Some(Meta::empty()),
    ))
}

/// Build a fresh checkout page for an order still awaiting payment.
pub async fn retry_checkout(
    state: &AppState,
    actor: &AuthUser,
    order_id: Uuid,
) -> AppResult<ApiResponse<CheckoutRedirect>> {
    let order = find_order(state, order_id).await?;
    policy::ensure(actor, &order, OrderAction::RetryCheckout)?;
    if order.status != OrderStatus::Pending {
        return Err(AppError::InvalidTransition {
            current: order.status,
            requested: OrderStatus::Paid,
        });
    }

    let listing = catalog_service::get_listing(&state.orm, order.product_id).await?;
    let (order, redirect_url) = payment_service::start_checkout(state, order, &listing).await?;
    let checkout_session_id = order.checkout_session_id.clone();
    Ok(ApiResponse::success(
        "Checkout ready",
        CheckoutRedirect {
            order: policy::redact(actor, Order::from(order)),
            redirect_url,
            checkout_session_id,
        },
        Some(Meta::empty()),
    ))
}

pub(crate) async fn find_order(state: &AppState, id: Uuid) -> AppResult<OrderModel> {
    Orders::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)
}

pub(crate) async fn list_with(
    state: &AppState,
    condition: Condition,
    query: &OrderListQuery,
) -> AppResult<(Vec<OrderModel>, Meta)> {
    let (page, limit, offset) = query.pagination().normalize();
    let mut condition = condition;
    if let Some(status) = query.status {
        condition = condition.add(OrderCol::Status.eq(status));
    }

    let mut finder = Orders::find().filter(condition);
    finder = match query.sort_order.unwrap_or(SortOrder::Desc) {
        SortOrder::Asc => finder.order_by_asc(OrderCol::CreatedAt),
        SortOrder::Desc => finder.order_by_desc(OrderCol::CreatedAt),
    };

    let total = finder.clone().count(&state.orm).await? as i64;
    let orders = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?;

    Ok((orders, Meta::new(page, limit, total)))
}

pub async fn list_my_orders(
    state: &AppState,
    actor: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    let condition = Condition::all().add(OrderCol::BuyerId.eq(actor.user_id));
    let (orders, meta) = list_with(state, condition, &query).await?;
    let items = orders
        .into_iter()
        .map(|o| policy::redact(actor, Order::from(o)))
        .collect();
    Ok(ApiResponse::success("Ok", OrderList { items }, Some(meta)))
}

pub async fn list_seller_orders(
    state: &AppState,
    actor: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    let condition = Condition::all().add(OrderCol::SellerId.eq(actor.user_id));
    let (orders, meta) = list_with(state, condition, &query).await?;
    let items = orders
        .into_iter()
        .map(|o| policy::redact(actor, Order::from(o)))
        .collect();
    Ok(ApiResponse::success("Ok", OrderList { items }, Some(meta)))
}

pub async fn get_order(
    state: &AppState,
    actor: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<Order>> {
    let order = find_order(state, id).await?;
    policy::ensure(actor, &order, OrderAction::View)?;
    Ok(ApiResponse::success(
        "OK",
        policy::redact(actor, Order::from(order)),
        Some(Meta::empty()),
    ))
}

pub async fn update_status(
    state: &AppState,
    actor: &AuthUser,
    id: Uuid,
    payload: UpdateStatusRequest,
) -> AppResult<ApiResponse<Order>> {
    if !UPDATABLE_TARGETS.contains(&payload.status) {
        return Err(AppError::BadRequest(format!(
            "{} cannot be set through a status update",
            payload.status
        )));
    }

    let now = Utc::now();
    let txn = state.orm.begin().await?;
    let order = order_store::lock_order(&txn, id).await?;
    policy::ensure(actor, &order, OrderAction::UpdateStatus)?;
    order_store::check_transition(order.status, payload.status, actor.is_admin())?;

    let from = order.status;
    let patch = OrderPatch {
        seller_notes: non_empty(payload.seller_notes),
        ..OrderPatch::default()
    };
    let order = order_store::enter_status(
        &txn,
        &state.config.settlement,
        order,
        payload.status,
        patch,
        Some(actor.user_id),
        now,
    )
    .await?;
    txn.commit().await?;

    audit::record(
        &state.pool,
        Some(actor.user_id),
        "order_status_updated",
        "orders",
        serde_json::json!({ "order_id": order.id, "from": from, "to": order.status }),
    )
    .await;

    Ok(ApiResponse::success(
        "Order status updated",
        policy::redact(actor, Order::from(order)),
        Some(Meta::empty()),
    ))
}

pub async fn update_tracking(
    state: &AppState,
    actor: &AuthUser,
    id: Uuid,
    payload: TrackingRequest,
) -> AppResult<ApiResponse<Order>> {
    let order = fulfillment_service::update_tracking(state, actor, id, payload).await?;
    audit::record(
        &state.pool,
        Some(actor.user_id),
        "order_shipped",
        "orders",
        serde_json::json!({ "order_id": order.id, "tracking_number": order.tracking_number }),
    )
    .await;
    Ok(ApiResponse::success(
        "Tracking updated",
        policy::redact(actor, Order::from(order)),
        Some(Meta::empty()),
    ))
}

pub async fn cancel_order(
    state: &AppState,
    actor: &AuthUser,
    id: Uuid,
    payload: CancelOrderRequest,
) -> AppResult<ApiResponse<Order>> {
    let now = Utc::now();
    let txn = state.orm.begin().await?;
    let order = order_store::lock_order(&txn, id).await?;
    policy::ensure(actor, &order, OrderAction::Cancel)?;
    if !order.status.is_cancellable() {
        return Err(AppError::InvalidTransition {
            current: order.status,
            requested: OrderStatus::Cancelled,
        });
    }

    let was_paid = order.status == OrderStatus::Paid;
    let patch = OrderPatch {
        cancellation_reason: non_empty(payload.reason),
        ..OrderPatch::default()
    };
    let order = order_store::enter_status(
        &txn,
        &state.config.settlement,
        order,
        OrderStatus::Cancelled,
        patch,
        Some(actor.user_id),
        now,
    )
    .await?;
    txn.commit().await?;

    audit::record(
        &state.pool,
        Some(actor.user_id),
        "order_cancelled",
        "orders",
        serde_json::json!({ "order_id": order.id, "refund_due": was_paid }),
    )
    .await;

    Ok(ApiResponse::success(
        "Order cancelled",
        policy::redact(actor, Order::from(order)),
        Some(Meta::empty()),
    ))
}

pub async fn get_pickup_code(
    state: &AppState,
    actor: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<PickupCodeView>> {
    let order = find_order(state, id).await?;
    let view = fulfillment_service::pickup_code_view(actor, &order)?;
    Ok(ApiResponse::success("Pickup code", view, Some(Meta::empty())))
}

pub async fn confirm_pickup(
    state: &AppState,
    actor: &AuthUser,
    payload: ConfirmPickupRequest,
) -> AppResult<ApiResponse<Order>> {
    let order = fulfillment_service::confirm_pickup(state, actor, &payload.pickup_code).await?;
    audit::record(
        &state.pool,
        Some(actor.user_id),
        "pickup_confirmed",
        "orders",
        serde_json::json!({ "order_id": order.id }),
    )
    .await;
    Ok(ApiResponse::success(
        "Pickup confirmed",
        policy::redact(actor, Order::from(order)),
        Some(Meta::empty()),
    ))
}

pub async fn open_dispute(
    state: &AppState,
    actor: &AuthUser,
    id: Uuid,
    payload: OpenDisputeRequest,
) -> AppResult<ApiResponse<DisputeWithOrder>> {
    let (dispute, order) = dispute_service::open_dispute(state, actor, id, payload).await?;
    audit::record(
        &state.pool,
        Some(actor.user_id),
        "dispute_opened",
        "disputes",
        serde_json::json!({ "order_id": order.id, "dispute_id": dispute.id }),
    )
    .await;
    Ok(ApiResponse::success(
        "Dispute opened",
        DisputeWithOrder {
            dispute: Dispute::from(dispute),
            order: policy::redact(actor, Order::from(order)),
        },
        Some(Meta::empty()),
    ))
}

pub async fn respond_to_dispute(
    state: &AppState,
    actor: &AuthUser,
    id: Uuid,
    payload: RespondDisputeRequest,
) -> AppResult<ApiResponse<Dispute>> {
    let dispute = dispute_service::respond_to_dispute(state, actor, id, payload).await?;
    audit::record(
        &state.pool,
        Some(actor.user_id),
        "dispute_responded",
        "disputes",
        serde_json::json!({ "order_id": id, "dispute_id": dispute.id }),
    )
    .await;
    Ok(ApiResponse::success(
        "Response recorded",
        Dispute::from(dispute),
        Some(Meta::empty()),
    ))
}

pub async fn get_dispute(
    state: &AppState,
    actor: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<DisputeWithOrder>> {
    let (dispute, order) = dispute_service::get_dispute(state, actor, id).await?;
    Ok(ApiResponse::success(
        "OK",
        DisputeWithOrder {
            dispute: Dispute::from(dispute),
            order: policy::redact(actor, Order::from(order)),
        },
        Some(Meta::empty()),
    ))
}

pub async fn create_review(
    state: &AppState,
    actor: &AuthUser,
    id: Uuid,
    payload: CreateReviewRequest,
) -> AppResult<ApiResponse<ReviewCreated>> {
    let (review, credits_earned) = review_service::create_review(state, actor, id, payload).await?;
    audit::record(
        &state.pool,
        Some(actor.user_id),
        "review_created",
        "order_reviews",
        serde_json::json!({ "order_id": id, "review_id": review.id }),
    )
    .await;
    Ok(ApiResponse::success(
        "Review saved",
        ReviewCreated {
            review: Review::from(review),
            credits_earned,
        },
        Some(Meta::empty()),
    ))
}
