//! Disputes and strikes. Deadlines are stored and reported; nothing here
//! resolves a dispute on its own.

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseTransaction, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use sea_orm::sea_query::LockType;
use uuid::Uuid;

use crate::{
    config::SettlementConfig,
    dto::{
        admin::{DisputeOutcome, ResolveDisputeRequest},
        disputes::{OpenDisputeRequest, RespondDisputeRequest},
    },
    entity::{
        disputes::{ActiveModel as DisputeActive, Column as DisputeCol, Entity as Disputes, Model as DisputeModel},
        orders::Model as OrderModel,
        user_strikes::{ActiveModel as StrikeActive, Column as StrikeCol, Entity as UserStrikes, Model as StrikeModel},
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::{DisputeReason, DisputeStatus, OrderStatus, StrikeType},
    services::{
        order_store::{self, OrderPatch},
        policy::{self, OrderAction},
    },
    state::AppState,
};

fn ensure_min_len(field: &str, text: &str, min: usize) -> AppResult<()> {
    let len = text.trim().chars().count();
    if len < min {
        return Err(AppError::BadRequest(format!(
            "{field} must be at least {min} characters (got {len})"
        )));
    }
    Ok(())
}

fn url_json(urls: Vec<String>) -> serde_json::Value {
    serde_json::Value::from(
        urls.into_iter()
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty())
            .collect::<Vec<_>>(),
    )
}

async fn find_active_dispute(
    txn: &DatabaseTransaction,
    order_id: Uuid,
) -> AppResult<Option<DisputeModel>> {
    Ok(Disputes::find()
        .filter(DisputeCol::OrderId.eq(order_id))
        .filter(DisputeCol::Status.is_in(DisputeStatus::ACTIVE))
        .lock(LockType::Update)
        .one(txn)
        .await?)
}

async fn lock_dispute(txn: &DatabaseTransaction, id: Uuid) -> AppResult<DisputeModel> {
    Disputes::find_by_id(id)
        .lock(LockType::Update)
        .one(txn)
        .await?
        .ok_or(AppError::NotFound)
}

pub async fn open_dispute(
    state: &AppState,
    actor: &AuthUser,
    order_id: Uuid,
    payload: OpenDisputeRequest,
) -> AppResult<(DisputeModel, OrderModel)> {
    let cfg = &state.config.settlement;
    ensure_min_len("description", &payload.description, cfg.dispute_min_text_len)?;

    let now = Utc::now();
    let txn = state.orm.begin().await?;
    let order = order_store::lock_order(&txn, order_id).await?;
    policy::ensure(actor, &order, OrderAction::OpenDispute)?;

    if find_active_dispute(&txn, order.id).await?.is_some() {
        return Err(AppError::DisputeAlreadyOpen);
    }
    if !order.status.is_disputable() {
        return Err(AppError::InvalidTransition {
            current: order.status,
            requested: OrderStatus::Disputed,
        });
    }

    let dispute = DisputeActive {
        id: Set(Uuid::new_v4()),
        order_id: Set(order.id),
        opened_by: Set(actor.user_id),
        reason: Set(payload.reason),
        description: Set(payload.description.trim().to_string()),
        evidence_urls: Set(url_json(payload.evidence_urls)),
        status: Set(DisputeStatus::Open),
        seller_response: Set(None),
        seller_evidence_urls: Set(serde_json::json!([])),
        seller_response_at: Set(None),
        resolved_by: Set(None),
        resolution_notes: Set(None),
        refund_amount: Set(None),
        seller_payout_amount: Set(None),
        resolved_at: Set(None),
        seller_response_deadline: Set(Some((now + cfg.dispute_response_window()).into())),
        admin_review_deadline: Set(None),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    }
    .insert(&txn)
    .await?;

    let order = order_store::enter_status(
        &txn,
        cfg,
        order,
        OrderStatus::Disputed,
        OrderPatch::default(),
        Some(actor.user_id),
        now,
    )
    .await?;
    txn.commit().await?;

    tracing::info!(order_id = %order.id, dispute_id = %dispute.id, reason = %dispute.reason, "dispute opened");
    Ok((dispute, order))
}

pub async fn respond_to_dispute(
    state: &AppState,
    actor: &AuthUser,
    order_id: Uuid,
    payload: RespondDisputeRequest,
) -> AppResult<DisputeModel> {
    let cfg = &state.config.settlement;
    ensure_min_len("response", &payload.response, cfg.dispute_min_text_len)?;

    let now = Utc::now();
    let txn = state.orm.begin().await?;
    let order = order_store::lock_order(&txn, order_id).await?;
    policy::ensure(actor, &order, OrderAction::RespondDispute)?;

    let dispute = find_active_dispute(&txn, order.id)
        .await?
        .ok_or(AppError::NotFound)?;
    if dispute.status != DisputeStatus::Open {
        return Err(AppError::BadRequest(format!(
            "Dispute is {} and no longer awaits a seller response",
            dispute.status
        )));
    }

    let mut active: DisputeActive = dispute.into();
    active.status = Set(DisputeStatus::SellerResponse);
    active.seller_response = Set(Some(payload.response.trim().to_string()));
    active.seller_evidence_urls = Set(url_json(payload.evidence_urls));
    active.seller_response_at = Set(Some(now.into()));
    active.admin_review_deadline = Set(Some((now + cfg.dispute_review_window()).into()));
    active.updated_at = Set(now.into());
    let dispute = active.update(&txn).await?;
    txn.commit().await?;

    Ok(dispute)
}

/// Latest dispute on an order, visible to both parties and admins.
pub async fn get_dispute(
    state: &AppState,
    actor: &AuthUser,
    order_id: Uuid,
) -> AppResult<(DisputeModel, OrderModel)> {
    let order = crate::entity::Orders::find_by_id(order_id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;
    policy::ensure(actor, &order, OrderAction::View)?;

    let dispute = Disputes::find()
        .filter(DisputeCol::OrderId.eq(order.id))
        .order_by_desc(DisputeCol::CreatedAt)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok((dispute, order))
}

pub async fn escalate(state: &AppState, admin: &AuthUser, dispute_id: Uuid) -> AppResult<DisputeModel> {
    ensure_admin(admin)?;
    let now = Utc::now();
    let txn = state.orm.begin().await?;
    let dispute = lock_dispute(&txn, dispute_id).await?;

    let status = dispute.status;
    match status {
        DisputeStatus::AdminReview => return Ok(dispute),
        _ if status.is_terminal() => {
            return Err(AppError::BadRequest(format!("Dispute is already {status}")));
        }
        _ => {}
    }

    let review_deadline = dispute
        .admin_review_deadline
        .unwrap_or_else(|| (now + state.config.settlement.dispute_review_window()).into());
    let mut active: DisputeActive = dispute.into();
    active.status = Set(DisputeStatus::AdminReview);
    active.admin_review_deadline = Set(Some(review_deadline));
    active.updated_at = Set(now.into());
    let dispute = active.update(&txn).await?;
    txn.commit().await?;

    tracing::info!(dispute_id = %dispute.id, "dispute escalated to admin review");
    Ok(dispute)
}

/// Amounts recorded on a resolution. Missing values take the outcome's
/// default; the sum may never exceed the order total.
pub fn resolution_amounts(
    outcome: DisputeOutcome,
    order_total: i64,
    order_payout: i64,
    refund: Option<i64>,
    payout: Option<i64>,
) -> AppResult<(i64, i64)> {
    let missing = |field: &str| AppError::BadRequest(format!("{field} is required for this outcome"));
    let (refund, payout) = match outcome {
        DisputeOutcome::RefundFull => (refund.unwrap_or(order_total), payout.unwrap_or(0)),
        DisputeOutcome::RefundPartial => (refund.ok_or_else(|| missing("refund_amount"))?, payout.unwrap_or(0)),
        DisputeOutcome::PayoutSeller => (refund.unwrap_or(0), payout.unwrap_or(order_payout)),
        DisputeOutcome::Split => (
            refund.ok_or_else(|| missing("refund_amount"))?,
            payout.ok_or_else(|| missing("seller_payout_amount"))?,
        ),
        DisputeOutcome::Closed => (refund.unwrap_or(0), payout.unwrap_or(0)),
    };

    if refund < 0 || payout < 0 {
        return Err(AppError::BadRequest("Amounts cannot be negative".into()));
    }
    if refund + payout > order_total {
        return Err(AppError::BadRequest(format!(
            "refund {refund} + seller payout {payout} exceeds order total {order_total}"
        )));
    }
    Ok((refund, payout))
}

pub fn resolved_status(outcome: DisputeOutcome) -> (DisputeStatus, OrderStatus) {
    match outcome {
        DisputeOutcome::RefundFull => (DisputeStatus::ResolvedRefundFull, OrderStatus::Refunded),
        DisputeOutcome::RefundPartial => (DisputeStatus::ResolvedRefundPartial, OrderStatus::Completed),
        DisputeOutcome::PayoutSeller => (DisputeStatus::ResolvedPayoutSeller, OrderStatus::Completed),
        DisputeOutcome::Split => (DisputeStatus::ResolvedSplit, OrderStatus::Completed),
        DisputeOutcome::Closed => (DisputeStatus::Closed, OrderStatus::Completed),
    }
}

/// Strike caused by a resolution, if any: buyer-favoured outcomes on seller
/// no-show or scam strike the seller, seller-favoured outcomes on buyer
/// no-show strike the buyer.
pub fn outcome_strike(
    reason: DisputeReason,
    outcome: DisputeOutcome,
    buyer_id: Uuid,
    seller_id: Uuid,
) -> Option<(Uuid, StrikeType)> {
    let buyer_favoured = matches!(outcome, DisputeOutcome::RefundFull | DisputeOutcome::RefundPartial);
    let seller_favoured = outcome == DisputeOutcome::PayoutSeller;
    match reason {
        DisputeReason::SellerNoShow if buyer_favoured => Some((seller_id, StrikeType::NoShow)),
        DisputeReason::ScamAttempt if buyer_favoured => Some((seller_id, StrikeType::ScamAttempt)),
        DisputeReason::BuyerNoShow if seller_favoured => Some((buyer_id, StrikeType::NoShow)),
        _ => None,
    }
}

pub async fn resolve(
    state: &AppState,
    admin: &AuthUser,
    dispute_id: Uuid,
    payload: ResolveDisputeRequest,
) -> AppResult<(DisputeModel, OrderModel)> {
    ensure_admin(admin)?;
    let cfg = &state.config.settlement;
    let now = Utc::now();
    let txn = state.orm.begin().await?;

    let dispute = lock_dispute(&txn, dispute_id).await?;
    if dispute.status.is_terminal() {
        return Err(AppError::BadRequest(format!("Dispute is already {}", dispute.status)));
    }
    let order = order_store::lock_order(&txn, dispute.order_id).await?;

    let (refund, payout) = resolution_amounts(
        payload.outcome,
        order.total_amount,
        order.seller_payout,
        payload.refund_amount,
        payload.seller_payout_amount,
    )?;
    let (dispute_status, order_status) = resolved_status(payload.outcome);
    let strike = outcome_strike(dispute.reason, payload.outcome, order.buyer_id, order.seller_id);
    let reason = dispute.reason;

    let mut active: DisputeActive = dispute.into();
    active.status = Set(dispute_status);
    active.refund_amount = Set(Some(refund));
    active.seller_payout_amount = Set(Some(payout));
    active.resolution_notes = Set(payload.notes.filter(|n| !n.trim().is_empty()));
    active.resolved_by = Set(Some(admin.user_id));
    active.resolved_at = Set(Some(now.into()));
    active.updated_at = Set(now.into());
    let dispute = active.update(&txn).await?;

    let patch = if order_status == OrderStatus::Completed && payout > 0 {
        OrderPatch {
            payout_scheduled_at: Some(now),
            ..OrderPatch::default()
        }
    } else {
        OrderPatch::default()
    };
    let order = order_store::enter_status(
        &txn,
        cfg,
        order,
        order_status,
        patch,
        Some(admin.user_id),
        now,
    )
    .await?;

    if let Some((user_id, strike_type)) = strike {
        issue_strike(
            &txn,
            NewStrike {
                user_id,
                order_id: Some(order.id),
                strike_type,
                description: Some(format!("Dispute resolved against user ({reason})")),
                expires_at: Some(now + cfg.strike_ttl()),
                issued_by: Some(admin.user_id),
            },
            now,
        )
        .await?;
    }
    txn.commit().await?;

    tracing::info!(
        dispute_id = %dispute.id,
        order_id = %order.id,
        status = %dispute.status,
        refund,
        payout,
        "dispute resolved"
    );
    Ok((dispute, order))
}

/// Which deadline an active dispute has missed, if any.
pub fn overdue_clock(dispute: &DisputeModel, now: DateTime<Utc>) -> Option<DisputeStatus> {
    let passed = |deadline: Option<sea_orm::prelude::DateTimeWithTimeZone>| {
        deadline.is_some_and(|d| d.with_timezone(&Utc) < now)
    };
    match dispute.status {
        DisputeStatus::Open if passed(dispute.seller_response_deadline) => {
            Some(DisputeStatus::SellerResponse)
        }
        DisputeStatus::SellerResponse | DisputeStatus::AdminReview
            if passed(dispute.admin_review_deadline) =>
        {
            Some(DisputeStatus::AdminReview)
        }
        _ => None,
    }
}

pub async fn overdue_disputes(
    state: &AppState,
    admin: &AuthUser,
) -> AppResult<Vec<(DisputeModel, DisputeStatus)>> {
    ensure_admin(admin)?;
    let now = Utc::now();
    let candidates = Disputes::find()
        .filter(DisputeCol::Status.is_in(DisputeStatus::ACTIVE))
        .filter(
            Condition::any()
                .add(DisputeCol::SellerResponseDeadline.lt(now))
                .add(DisputeCol::AdminReviewDeadline.lt(now)),
        )
        .order_by_asc(DisputeCol::CreatedAt)
        .all(&state.orm)
        .await?;

    Ok(candidates
        .into_iter()
        .filter_map(|d| overdue_clock(&d, now).map(|clock| (d, clock)))
        .collect())
}

#[derive(Debug, Clone)]
pub struct NewStrike {
    pub user_id: Uuid,
    pub order_id: Option<Uuid>,
    pub strike_type: StrikeType,
    pub description: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub issued_by: Option<Uuid>,
}

pub async fn issue_strike<C: ConnectionTrait>(
    conn: &C,
    strike: NewStrike,
    now: DateTime<Utc>,
) -> AppResult<StrikeModel> {
    let model = StrikeActive {
        id: Set(Uuid::new_v4()),
        user_id: Set(strike.user_id),
        order_id: Set(strike.order_id),
        strike_type: Set(strike.strike_type),
        description: Set(strike.description),
        expires_at: Set(strike.expires_at.map(Into::into)),
        is_active: Set(true),
        issued_by: Set(strike.issued_by),
        created_at: Set(now.into()),
    }
    .insert(conn)
    .await?;

    tracing::warn!(user_id = %model.user_id, strike_type = %model.strike_type, "strike issued");
    Ok(model)
}

pub async fn revoke_strike(state: &AppState, admin: &AuthUser, strike_id: Uuid) -> AppResult<StrikeModel> {
    ensure_admin(admin)?;
    let strike = UserStrikes::find_by_id(strike_id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;
    let mut active: StrikeActive = strike.into();
    active.is_active = Set(false);
    Ok(active.update(&state.orm).await?)
}

fn counting_strikes(user_id: Uuid, now: DateTime<Utc>) -> Condition {
    Condition::all()
        .add(StrikeCol::UserId.eq(user_id))
        .add(StrikeCol::IsActive.eq(true))
        .add(
            Condition::any()
                .add(StrikeCol::ExpiresAt.is_null())
                .add(StrikeCol::ExpiresAt.gt(now)),
        )
}

pub async fn active_strike_count<C: ConnectionTrait>(
    conn: &C,
    user_id: Uuid,
    now: DateTime<Utc>,
) -> AppResult<u64> {
    Ok(UserStrikes::find()
        .filter(counting_strikes(user_id, now))
        .count(conn)
        .await?)
}

pub async fn list_strikes<C: ConnectionTrait>(conn: &C, user_id: Uuid) -> AppResult<Vec<StrikeModel>> {
    Ok(UserStrikes::find()
        .filter(StrikeCol::UserId.eq(user_id))
        .order_by_desc(StrikeCol::CreatedAt)
        .all(conn)
        .await?)
}

pub fn strikes_allow_ordering(active_strikes: u64, cfg: &SettlementConfig) -> bool {
    active_strikes <= cfg.strike_threshold
}

pub async fn can_user_order<C: ConnectionTrait>(
    conn: &C,
    cfg: &SettlementConfig,
    user_id: Uuid,
    now: DateTime<Utc>,
) -> AppResult<bool> {
    let count = active_strike_count(conn, user_id, now).await?;
    Ok(strikes_allow_ordering(count, cfg))
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    #[test]
    fn full_refund_defaults_to_order_total() {
        let amounts = resolution_amounts(DisputeOutcome::RefundFull, 2_000, 1_747, None, None).unwrap();
        assert_eq!(amounts, (2_000, 0));
    }

    #[test]
    fn payout_seller_defaults_to_original_payout() {
        let amounts = resolution_amounts(DisputeOutcome::PayoutSeller, 2_000, 1_747, None, None).unwrap();
        assert_eq!(amounts, (0, 1_747));
    }

    #[test]
    fn amounts_cannot_exceed_total() {
        let err = resolution_amounts(DisputeOutcome::Split, 2_000, 1_747, Some(1_500), Some(600));
        assert!(matches!(err, Err(AppError::BadRequest(_))));
        assert!(resolution_amounts(DisputeOutcome::Split, 2_000, 1_747, Some(1_000), Some(1_000)).is_ok());
    }

    #[test]
    fn partial_refund_needs_an_amount() {
        assert!(resolution_amounts(DisputeOutcome::RefundPartial, 2_000, 1_747, None, None).is_err());
        assert!(resolution_amounts(DisputeOutcome::Closed, 2_000, 1_747, Some(-1), None).is_err());
    }

    #[test]
    fn only_refund_full_refunds_the_order() {
        assert_eq!(resolved_status(DisputeOutcome::RefundFull).1, OrderStatus::Refunded);
        for outcome in [
            DisputeOutcome::RefundPartial,
            DisputeOutcome::PayoutSeller,
            DisputeOutcome::Split,
            DisputeOutcome::Closed,
        ] {
            assert_eq!(resolved_status(outcome).1, OrderStatus::Completed);
        }
    }

    #[test]
    fn no_show_strikes_land_on_the_absent_party() {
        let (buyer, seller) = (Uuid::new_v4(), Uuid::new_v4());
        assert_eq!(
            outcome_strike(DisputeReason::SellerNoShow, DisputeOutcome::RefundFull, buyer, seller),
            Some((seller, StrikeType::NoShow))
        );
        assert_eq!(
            outcome_strike(DisputeReason::BuyerNoShow, DisputeOutcome::PayoutSeller, buyer, seller),
            Some((buyer, StrikeType::NoShow))
        );
        assert_eq!(
            outcome_strike(DisputeReason::ScamAttempt, DisputeOutcome::RefundPartial, buyer, seller),
            Some((seller, StrikeType::ScamAttempt))
        );
        assert_eq!(
            outcome_strike(DisputeReason::SellerNoShow, DisputeOutcome::PayoutSeller, buyer, seller),
            None
        );
        assert_eq!(
            outcome_strike(DisputeReason::ItemDamaged, DisputeOutcome::RefundFull, buyer, seller),
            None
        );
    }

    #[test]
    fn threshold_is_exceeded_not_reached() {
        let cfg = SettlementConfig::default();
        assert!(strikes_allow_ordering(2, &cfg));
        assert!(!strikes_allow_ordering(3, &cfg));
    }

    fn dispute(status: DisputeStatus, response: Option<DateTime<Utc>>, review: Option<DateTime<Utc>>) -> DisputeModel {
        let now: sea_orm::prelude::DateTimeWithTimeZone = Utc::now().into();
        DisputeModel {
            id: Uuid::new_v4(),
            order_id: Uuid::new_v4(),
            opened_by: Uuid::new_v4(),
            reason: DisputeReason::ItemDamaged,
            description: "x".repeat(60),
            evidence_urls: serde_json::json!([]),
            status,
            seller_response: None,
            seller_evidence_urls: serde_json::json!([]),
            seller_response_at: None,
            resolved_by: None,
            resolution_notes: None,
            refund_amount: None,
            seller_payout_amount: None,
            resolved_at: None,
            seller_response_deadline: response.map(Into::into),
            admin_review_deadline: review.map(Into::into),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn overdue_clock_follows_dispute_stage() {
        let now = Utc::now();
        let past = Some(now - Duration::hours(1));
        let future = Some(now + Duration::hours(1));

        assert_eq!(
            overdue_clock(&dispute(DisputeStatus::Open, past, None), now),
            Some(DisputeStatus::SellerResponse)
        );
        assert_eq!(overdue_clock(&dispute(DisputeStatus::Open, future, None), now), None);
        assert_eq!(
            overdue_clock(&dispute(DisputeStatus::SellerResponse, past, past), now),
            Some(DisputeStatus::AdminReview)
        );
        assert_eq!(overdue_clock(&dispute(DisputeStatus::ResolvedSplit, past, past), now), None);
    }
}
