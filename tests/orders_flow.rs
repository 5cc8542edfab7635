mod common;

use chrono::{Duration, Utc};
use eco_marketplace_api::{
    dto::{
        disputes::OpenDisputeRequest,
        orders::{ConfirmPickupRequest, CreateOrderRequest, CreateReviewRequest, UpdateStatusRequest},
    },
    entity::{
        orders::{ActiveModel as OrderActive, Entity as Orders, Model as OrderModel},
        products::Entity as Products,
        users::Entity as Users,
    },
    error::AppError,
    middleware::auth::AuthUser,
    models::{DeliveryType, DisputeReason, OrderStatus, StrikeType},
    services::{
        dispute_service::{self, NewStrike},
        ledger_service,
        notification::NotificationJob,
        order_service,
        payment_service::{self, WebhookOutcome},
    },
    state::AppState,
};
use sea_orm::{ActiveModelTrait, EntityTrait, Set};
use uuid::Uuid;

async fn reload(state: &AppState, id: Uuid) -> anyhow::Result<OrderModel> {
    Ok(Orders::find_by_id(id)
        .one(&state.orm)
        .await?
        .expect("order exists"))
}

async fn available(state: &AppState, product_id: Uuid) -> anyhow::Result<i32> {
    Ok(Products::find_by_id(product_id)
        .one(&state.orm)
        .await?
        .expect("listing exists")
        .quantity_available)
}

/// Create a pickup order and settle it through a signed webhook.
async fn paid_pickup_order(
    state: &AppState,
    buyer: &AuthUser,
    product_id: Uuid,
) -> anyhow::Result<OrderModel> {
    let created = order_service::create_order(state, buyer, CreateOrderRequest::pickup(product_id, 1))
        .await?
        .data
        .expect("checkout redirect");
    let session_id = created.checkout_session_id.expect("session id");
    let (payload, header) = common::completed_event(created.order.id, &session_id);
    let outcome = payment_service::handle_webhook(state, &payload, Some(&header)).await?;
    assert_eq!(outcome, WebhookOutcome::Settled { order_id: created.order.id });
    reload(state, created.order.id).await
}

#[tokio::test]
async fn order_is_priced_then_settled_once_by_webhook() -> anyhow::Result<()> {
    let Some(mut ctx) = common::setup().await? else {
        return Ok(());
    };
    let state = ctx.state.clone();
    let seller = common::create_user(&state, "user").await?;
    let buyer = common::create_user(&state, "user").await?;
    let listing = common::create_listing(&state, &seller, 1000, 5).await?;

    let created = order_service::create_order(&state, &buyer, CreateOrderRequest::pickup(listing.id, 2))
        .await?
        .data
        .expect("checkout redirect");

    let order = &created.order;
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.total_amount, 2000);
    assert_eq!(order.platform_fee, 200);
    assert_eq!(order.gateway_fee, 53);
    assert_eq!(order.seller_payout, 1747);
    assert!(created.redirect_url.starts_with("https://checkout.test/"));
    assert_eq!(available(&state, listing.id).await?, 5);

    {
        let requests = ctx.gateway.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(
            requests[0].metadata.get("order_id"),
            Some(&order.id.to_string())
        );
    }

    let session_id = created.checkout_session_id.clone().expect("session id");
    let (payload, header) = common::completed_event(order.id, &session_id);
    let outcome = payment_service::handle_webhook(&state, &payload, Some(&header)).await?;
    assert_eq!(outcome, WebhookOutcome::Settled { order_id: order.id });

    let paid = reload(&state, order.id).await?;
    assert_eq!(paid.status, OrderStatus::Paid);
    assert!(paid.paid_at.is_some());
    assert_eq!(available(&state, listing.id).await?, 3);

    // Gateway retries the same delivery.
    let replay = payment_service::handle_webhook(&state, &payload, Some(&header)).await?;
    assert_eq!(replay, WebhookOutcome::AlreadyProcessed { order_id: order.id });
    assert_eq!(available(&state, listing.id).await?, 3);

    let jobs = ctx.drain_notifications();
    assert_eq!(jobs.len(), 1);
    let NotificationJob::OrderConfirmed(notice) = &jobs[0];
    assert_eq!(notice.order_id, order.id);
    Ok(())
}

#[tokio::test]
async fn concurrent_webhooks_decrement_stock_once() -> anyhow::Result<()> {
    let Some(ctx) = common::setup().await? else {
        return Ok(());
    };
    let state = ctx.state.clone();
    let seller = common::create_user(&state, "user").await?;
    let buyer = common::create_user(&state, "user").await?;
    let listing = common::create_listing(&state, &seller, 1500, 3).await?;

    let created = order_service::create_order(&state, &buyer, CreateOrderRequest::pickup(listing.id, 2))
        .await?
        .data
        .expect("checkout redirect");
    let session_id = created.checkout_session_id.expect("session id");
    let (payload, header) = common::completed_event(created.order.id, &session_id);

    let mut handles = Vec::new();
    for _ in 0..2 {
        let state = state.clone();
        let payload = payload.clone();
        let header = header.clone();
        handles.push(tokio::spawn(async move {
            payment_service::handle_webhook(&state, &payload, Some(&header)).await
        }));
    }

    let mut settled = 0;
    for handle in handles {
        match handle.await?? {
            WebhookOutcome::Settled { .. } => settled += 1,
            WebhookOutcome::AlreadyProcessed { .. } => {}
            other => panic!("unexpected outcome {other:?}"),
        }
    }
    assert_eq!(settled, 1);
    assert_eq!(available(&state, listing.id).await?, 1);
    Ok(())
}

#[tokio::test]
async fn tampered_webhook_is_rejected() -> anyhow::Result<()> {
    let Some(ctx) = common::setup().await? else {
        return Ok(());
    };
    let (mut payload, header) = common::completed_event(Uuid::new_v4(), "cs_test_tampered");
    payload.extend_from_slice(b" ");

    let err = payment_service::handle_webhook(&ctx.state, &payload, Some(&header))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidSignature));

    let err = payment_service::handle_webhook(&ctx.state, &payload, None)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidSignature));
    Ok(())
}

#[tokio::test]
async fn gift_order_skips_the_gateway() -> anyhow::Result<()> {
    let Some(mut ctx) = common::setup().await? else {
        return Ok(());
    };
    let state = ctx.state.clone();
    let seller = common::create_user(&state, "user").await?;
    let buyer = common::create_user(&state, "user").await?;
    let listing = common::create_listing(&state, &seller, 0, 2).await?;

    let created = order_service::create_order(&state, &buyer, CreateOrderRequest::pickup(listing.id, 1))
        .await?
        .data
        .expect("checkout redirect");

    assert_eq!(created.order.status, OrderStatus::Paid);
    assert_eq!(created.order.total_amount, 0);
    assert_eq!(created.order.platform_fee, 0);
    assert_eq!(created.order.gateway_fee, 0);
    assert!(created.checkout_session_id.is_none());
    assert_eq!(
        created.redirect_url,
        format!("http://frontend.test/orders/{}/success", created.order.id)
    );
    assert!(ctx.gateway.requests.lock().unwrap().is_empty());
    assert_eq!(available(&state, listing.id).await?, 1);

    let stored = reload(&state, created.order.id).await?;
    assert_eq!(stored.payment_intent_id.as_deref(), Some("FREE_GIFT"));
    assert_eq!(ctx.drain_notifications().len(), 1);
    Ok(())
}

#[tokio::test]
async fn creation_rejects_invalid_requests() -> anyhow::Result<()> {
    let Some(ctx) = common::setup().await? else {
        return Ok(());
    };
    let state = ctx.state.clone();
    let seller = common::create_user(&state, "user").await?;
    let buyer = common::create_user(&state, "user").await?;
    let listing = common::create_listing(&state, &seller, 1000, 2).await?;

    let err = order_service::create_order(&state, &seller, CreateOrderRequest::pickup(listing.id, 1))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::SelfPurchase));

    let err = order_service::create_order(&state, &buyer, CreateOrderRequest::pickup(listing.id, 3))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AppError::InsufficientStock {
            requested: 3,
            available: 2
        }
    ));

    let shipped = CreateOrderRequest {
        delivery_type: DeliveryType::SellerShips,
        shipping_address: Some("   ".into()),
        ..CreateOrderRequest::pickup(listing.id, 1)
    };
    let err = order_service::create_order(&state, &buyer, shipped)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::MissingShippingInfo));
    Ok(())
}

#[tokio::test]
async fn gateway_outage_keeps_order_pending_for_retry() -> anyhow::Result<()> {
    let Some(ctx) = common::setup().await? else {
        return Ok(());
    };
    let state = ctx.state.clone();
    let seller = common::create_user(&state, "user").await?;
    let buyer = common::create_user(&state, "user").await?;
    let listing = common::create_listing(&state, &seller, 1200, 1).await?;

    ctx.gateway.fail.store(true, std::sync::atomic::Ordering::SeqCst);
    let err = order_service::create_order(&state, &buyer, CreateOrderRequest::pickup(listing.id, 1))
        .await
        .unwrap_err();
    let AppError::GatewayUnavailable { order_id } = err else {
        panic!("expected GatewayUnavailable, got {err:?}");
    };
    assert_eq!(reload(&state, order_id).await?.status, OrderStatus::Pending);

    ctx.gateway.fail.store(false, std::sync::atomic::Ordering::SeqCst);
    let retried = order_service::retry_checkout(&state, &buyer, order_id)
        .await?
        .data
        .expect("checkout redirect");
    assert_eq!(retried.order.id, order_id);
    assert!(retried.checkout_session_id.is_some());
    Ok(())
}

#[tokio::test]
async fn dispute_needs_a_real_description() -> anyhow::Result<()> {
    let Some(ctx) = common::setup().await? else {
        return Ok(());
    };
    let state = ctx.state.clone();
    let seller = common::create_user(&state, "user").await?;
    let buyer = common::create_user(&state, "user").await?;
    let listing = common::create_listing(&state, &seller, 3000, 1).await?;
    let order = paid_pickup_order(&state, &buyer, listing.id).await?;
    let code = order.pickup_code.clone().expect("pickup code");
    order_service::confirm_pickup(&state, &seller, ConfirmPickupRequest { pickup_code: code }).await?;

    let short = OpenDisputeRequest {
        reason: DisputeReason::ItemNotReceived,
        description: "x".repeat(40),
        evidence_urls: vec![],
    };
    let err = order_service::open_dispute(&state, &buyer, order.id, short)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));
    assert_eq!(reload(&state, order.id).await?.status, OrderStatus::Delivered);

    let long = OpenDisputeRequest {
        reason: DisputeReason::ItemNotReceived,
        description: "y".repeat(60),
        evidence_urls: vec!["https://img.test/1.jpg".into()],
    };
    let opened = order_service::open_dispute(&state, &buyer, order.id, long)
        .await?
        .data
        .expect("dispute");
    assert_eq!(opened.order.status, OrderStatus::Disputed);
    assert_eq!(opened.dispute.evidence_urls.len(), 1);
    let deadline = opened
        .dispute
        .seller_response_deadline
        .expect("seller response deadline");
    let window = deadline - opened.dispute.created_at;
    assert_eq!(window, Duration::hours(48));

    let again = OpenDisputeRequest {
        reason: DisputeReason::Other,
        description: "z".repeat(60),
        evidence_urls: vec![],
    };
    let err = order_service::open_dispute(&state, &buyer, order.id, again)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::DisputeAlreadyOpen));
    Ok(())
}

#[tokio::test]
async fn strikes_above_threshold_suspend_ordering() -> anyhow::Result<()> {
    let Some(ctx) = common::setup().await? else {
        return Ok(());
    };
    let state = ctx.state.clone();
    let seller = common::create_user(&state, "user").await?;
    let buyer = common::create_user(&state, "user").await?;
    let listing = common::create_listing(&state, &seller, 500, 10).await?;
    let now = Utc::now();

    let strike = |expires_at| NewStrike {
        user_id: buyer.user_id,
        order_id: None,
        strike_type: StrikeType::NoShow,
        description: None,
        expires_at,
        issued_by: None,
    };

    // An expired strike never counts.
    dispute_service::issue_strike(&state.orm, strike(Some(now - Duration::days(1))), now).await?;
    for _ in 0..2 {
        dispute_service::issue_strike(&state.orm, strike(None), now).await?;
    }
    order_service::create_order(&state, &buyer, CreateOrderRequest::pickup(listing.id, 1)).await?;

    dispute_service::issue_strike(&state.orm, strike(None), now).await?;
    let err = order_service::create_order(&state, &buyer, CreateOrderRequest::pickup(listing.id, 1))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::OrderingSuspended));
    Ok(())
}

#[tokio::test]
async fn pickup_code_confirms_once_then_order_completes_with_grants() -> anyhow::Result<()> {
    let Some(ctx) = common::setup().await? else {
        return Ok(());
    };
    let state = ctx.state.clone();
    let seller = common::create_user(&state, "user").await?;
    let buyer = common::create_user(&state, "user").await?;
    let listing = common::create_listing(&state, &seller, 2000, 1).await?;
    let order = paid_pickup_order(&state, &buyer, listing.id).await?;

    let code = order_service::get_pickup_code(&state, &buyer, order.id)
        .await?
        .data
        .expect("pickup code")
        .pickup_code;
    assert_eq!(code.len(), 64);

    let err = order_service::confirm_pickup(
        &state,
        &buyer,
        ConfirmPickupRequest { pickup_code: code.clone() },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Forbidden));

    let delivered = order_service::confirm_pickup(
        &state,
        &seller,
        ConfirmPickupRequest { pickup_code: code.clone() },
    )
    .await?
    .data
    .expect("order");
    assert_eq!(delivered.status, OrderStatus::Delivered);
    assert!(delivered.pickup_scanned_at.is_some());

    let err = order_service::confirm_pickup(&state, &seller, ConfirmPickupRequest { pickup_code: code })
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidOrExpiredCode));

    let completed = order_service::update_status(
        &state,
        &seller,
        order.id,
        UpdateStatusRequest {
            status: OrderStatus::Completed,
            seller_notes: None,
        },
    )
    .await?
    .data
    .expect("order");
    assert_eq!(completed.status, OrderStatus::Completed);

    // Purchase 200 + first purchase 50 + pickup 5; sale 300 + first sale 50.
    let buyer_row = Users::find_by_id(buyer.user_id).one(&state.orm).await?.expect("buyer");
    let seller_row = Users::find_by_id(seller.user_id).one(&state.orm).await?.expect("seller");
    assert_eq!(buyer_row.eco_credits, 255);
    assert_eq!(seller_row.eco_credits, 350);
    assert!((buyer_row.total_co2_saved - 2.0).abs() < f64::EPSILON);
    assert!((seller_row.total_co2_saved - 2.0).abs() < f64::EPSILON);
    assert!(reload(&state, order.id).await?.impact_recorded_at.is_some());
    Ok(())
}

#[tokio::test]
async fn expired_pickup_code_is_refused() -> anyhow::Result<()> {
    let Some(ctx) = common::setup().await? else {
        return Ok(());
    };
    let state = ctx.state.clone();
    let seller = common::create_user(&state, "user").await?;
    let buyer = common::create_user(&state, "user").await?;
    let listing = common::create_listing(&state, &seller, 800, 1).await?;
    let order = paid_pickup_order(&state, &buyer, listing.id).await?;
    let code = order.pickup_code.clone().expect("pickup code");

    let mut active: OrderActive = order.into();
    active.pickup_code_expires_at = Set(Some((Utc::now() - Duration::minutes(1)).into()));
    active.update(&state.orm).await?;

    let err = order_service::confirm_pickup(&state, &seller, ConfirmPickupRequest { pickup_code: code })
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidOrExpiredCode));
    Ok(())
}

#[tokio::test]
async fn status_updates_follow_the_table() -> anyhow::Result<()> {
    let Some(ctx) = common::setup().await? else {
        return Ok(());
    };
    let state = ctx.state.clone();
    let seller = common::create_user(&state, "user").await?;
    let buyer = common::create_user(&state, "user").await?;
    let admin = common::create_admin(&state).await?;
    let listing = common::create_listing(&state, &seller, 1000, 1).await?;
    let order = paid_pickup_order(&state, &buyer, listing.id).await?;

    let update = |status| UpdateStatusRequest {
        status,
        seller_notes: None,
    };

    let err = order_service::update_status(&state, &seller, order.id, update(OrderStatus::Completed))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AppError::InvalidTransition {
            current: OrderStatus::Paid,
            requested: OrderStatus::Completed
        }
    ));

    let err = order_service::update_status(&state, &buyer, order.id, update(OrderStatus::ReadyForPickup))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden));

    let err = order_service::update_status(&state, &seller, order.id, update(OrderStatus::Paid))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    let forced = order_service::update_status(&state, &admin, order.id, update(OrderStatus::Refunded))
        .await?
        .data
        .expect("order");
    assert_eq!(forced.status, OrderStatus::Refunded);
    Ok(())
}

async fn audit_count(state: &AppState, action: &str, order_id: Uuid) -> anyhow::Result<i64> {
    let (count,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM audit_logs WHERE action = $1 AND metadata->>'order_id' = $2",
    )
    .bind(action)
    .bind(order_id.to_string())
    .fetch_one(&state.pool)
    .await?;
    Ok(count)
}

#[tokio::test]
async fn replaced_session_expiry_keeps_order_payable() -> anyhow::Result<()> {
    let Some(ctx) = common::setup().await? else {
        return Ok(());
    };
    let state = ctx.state.clone();
    let seller = common::create_user(&state, "user").await?;
    let buyer = common::create_user(&state, "user").await?;
    let listing = common::create_listing(&state, &seller, 900, 3).await?;

    let created = order_service::create_order(&state, &buyer, CreateOrderRequest::pickup(listing.id, 1))
        .await?
        .data
        .expect("checkout redirect");
    let first_session = created.checkout_session_id.expect("session id");

    let retried = order_service::retry_checkout(&state, &buyer, created.order.id)
        .await?
        .data
        .expect("checkout redirect");
    let live_session = retried.checkout_session_id.expect("session id");
    assert_ne!(first_session, live_session);

    let (payload, header) =
        common::signed_event("checkout.session.expired", created.order.id, &first_session);
    let outcome = payment_service::handle_webhook(&state, &payload, Some(&header)).await?;
    assert_eq!(outcome, WebhookOutcome::Superseded { order_id: created.order.id });

    let pending = reload(&state, created.order.id).await?;
    assert_eq!(pending.status, OrderStatus::Pending);
    assert_eq!(pending.checkout_session_id.as_deref(), Some(live_session.as_str()));

    let (payload, header) = common::completed_event(created.order.id, &live_session);
    let outcome = payment_service::handle_webhook(&state, &payload, Some(&header)).await?;
    assert_eq!(outcome, WebhookOutcome::Settled { order_id: created.order.id });

    let paid = reload(&state, created.order.id).await?;
    assert_eq!(paid.status, OrderStatus::Paid);
    assert!(paid.paid_at.is_some());
    assert_eq!(available(&state, listing.id).await?, 2);
    Ok(())
}

#[tokio::test]
async fn expired_checkout_cancels_and_late_payment_is_flagged() -> anyhow::Result<()> {
    let Some(mut ctx) = common::setup().await? else {
        return Ok(());
    };
    let state = ctx.state.clone();
    let seller = common::create_user(&state, "user").await?;
    let buyer = common::create_user(&state, "user").await?;
    let listing = common::create_listing(&state, &seller, 700, 2).await?;

    let created = order_service::create_order(&state, &buyer, CreateOrderRequest::pickup(listing.id, 1))
        .await?
        .data
        .expect("checkout redirect");
    let order_id = created.order.id;
    let session_id = created.checkout_session_id.expect("session id");

    let (payload, header) = common::signed_event("checkout.session.expired", order_id, &session_id);
    let outcome = payment_service::handle_webhook(&state, &payload, Some(&header)).await?;
    assert_eq!(outcome, WebhookOutcome::Cancelled { order_id });

    let cancelled = reload(&state, order_id).await?;
    assert_eq!(cancelled.status, OrderStatus::Cancelled);
    assert!(cancelled.cancelled_at.is_some());
    assert!(cancelled.cancellation_reason.is_some());
    assert_eq!(available(&state, listing.id).await?, 2);

    let replay = payment_service::handle_webhook(&state, &payload, Some(&header)).await?;
    assert_eq!(replay, WebhookOutcome::AlreadyProcessed { order_id });

    // The buyer finished paying just as the session lapsed.
    let (payload, header) = common::completed_event(order_id, &session_id);
    let outcome = payment_service::handle_webhook(&state, &payload, Some(&header)).await?;
    assert_eq!(outcome, WebhookOutcome::RefundDue { order_id });

    let still = reload(&state, order_id).await?;
    assert_eq!(still.status, OrderStatus::Cancelled);
    assert!(still.paid_at.is_none());
    assert_eq!(available(&state, listing.id).await?, 2);
    assert_eq!(audit_count(&state, "refund_due", order_id).await?, 1);
    assert!(ctx.drain_notifications().is_empty());
    Ok(())
}

#[tokio::test]
async fn order_view_depends_on_the_viewer() -> anyhow::Result<()> {
    let Some(ctx) = common::setup().await? else {
        return Ok(());
    };
    let state = ctx.state.clone();
    let seller = common::create_user(&state, "user").await?;
    let buyer = common::create_user(&state, "user").await?;
    let stranger = common::create_user(&state, "user").await?;
    let listing = common::create_listing(&state, &seller, 1100, 2).await?;

    let created = order_service::create_order(&state, &buyer, CreateOrderRequest::pickup(listing.id, 1))
        .await?
        .data
        .expect("checkout redirect");
    let order_id = created.order.id;

    let unpaid = order_service::get_order(&state, &buyer, order_id)
        .await?
        .data
        .expect("order");
    assert!(unpaid.pickup_address.is_none());
    assert!(unpaid.pickup_instructions.is_none());
    assert!(unpaid.pickup_code.is_some());

    let seller_view = order_service::get_order(&state, &seller, order_id)
        .await?
        .data
        .expect("order");
    assert_eq!(seller_view.pickup_address.as_deref(), Some("Market Square 1"));
    assert!(seller_view.pickup_code.is_none());
    assert!(seller_view.pickup_code_expires_at.is_none());

    let err = order_service::get_order(&state, &stranger, order_id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound));

    let session_id = created.checkout_session_id.expect("session id");
    let (payload, header) = common::completed_event(order_id, &session_id);
    payment_service::handle_webhook(&state, &payload, Some(&header)).await?;

    let paid = order_service::get_order(&state, &buyer, order_id)
        .await?
        .data
        .expect("order");
    assert_eq!(paid.pickup_address.as_deref(), Some("Market Square 1"));
    assert!(paid.pickup_code.is_some());
    Ok(())
}

#[tokio::test]
async fn crossed_completions_grant_without_deadlock() -> anyhow::Result<()> {
    let Some(ctx) = common::setup().await? else {
        return Ok(());
    };
    let state = ctx.state.clone();
    let x = common::create_user(&state, "user").await?;
    let y = common::create_user(&state, "user").await?;
    let admin = common::create_admin(&state).await?;
    let listing_x = common::create_listing(&state, &x, 1000, 50).await?;
    let listing_y = common::create_listing(&state, &y, 1000, 50).await?;

    for _ in 0..10 {
        // x buys from y while y buys from x.
        let a = paid_pickup_order(&state, &x, listing_y.id).await?;
        let b = paid_pickup_order(&state, &y, listing_x.id).await?;

        let mut handles = Vec::new();
        for order_id in [a.id, b.id] {
            let state = state.clone();
            let admin = admin.clone();
            handles.push(tokio::spawn(async move {
                order_service::update_status(
                    &state,
                    &admin,
                    order_id,
                    UpdateStatusRequest {
                        status: OrderStatus::Completed,
                        seller_notes: None,
                    },
                )
                .await
            }));
        }
        for handle in handles {
            let order = handle.await??.data.expect("order");
            assert_eq!(order.status, OrderStatus::Completed);
        }
    }

    for user in [&x, &y] {
        let row = Users::find_by_id(user.user_id).one(&state.orm).await?.expect("user");
        let totals = ledger_service::ledger_totals(&state, user.user_id).await?;
        assert!(totals.matches(&row));
        assert!((row.total_co2_saved - 40.0).abs() < 1e-9);
    }
    Ok(())
}

#[tokio::test]
async fn concurrent_reviews_resolve_to_one() -> anyhow::Result<()> {
    let Some(ctx) = common::setup().await? else {
        return Ok(());
    };
    let state = ctx.state.clone();
    let seller = common::create_user(&state, "user").await?;
    let buyer = common::create_user(&state, "user").await?;
    let listing = common::create_listing(&state, &seller, 600, 1).await?;
    let order = paid_pickup_order(&state, &buyer, listing.id).await?;
    let code = order.pickup_code.clone().expect("pickup code");
    order_service::confirm_pickup(&state, &seller, ConfirmPickupRequest { pickup_code: code }).await?;
    let order_id = order.id;

    let mut handles = Vec::new();
    for rating in [4, 5] {
        let state = state.clone();
        let buyer = buyer.clone();
        handles.push(tokio::spawn(async move {
            order_service::create_review(
                &state,
                &buyer,
                order_id,
                CreateReviewRequest {
                    rating,
                    comment: Some("Fresh and as described".into()),
                    is_anonymous: false,
                },
            )
            .await
        }));
    }

    let mut created = 0;
    for handle in handles {
        match handle.await? {
            Ok(_) => created += 1,
            Err(AppError::AlreadyReviewed) => {}
            Err(other) => panic!("unexpected error {other:?}"),
        }
    }
    assert_eq!(created, 1);
    Ok(())
}
