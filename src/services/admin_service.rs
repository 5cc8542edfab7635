use chrono::{Duration, Utc};
use sea_orm::{Condition, EntityTrait, TransactionTrait};
use uuid::Uuid;

use crate::{
    audit,
    dto::{
        admin::{
            AwardWinnersRequest, BalanceReconciliation, CreateAwardRequest, IssueStrikeRequest,
            LedgerAdjustmentRequest, LedgerAdjustmentResult, OverdueDispute, OverdueDisputeList,
            PeriodWinners, ResolveDisputeRequest, RestockRequest, RestockResult, StrikeList,
            StrikeSummary,
        },
        disputes::DisputeWithOrder,
        orders::OrderList,
    },
    entity::users::Entity as Users,
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::{Award, Dispute, ImpactAction, LedgerEntry, Order, Strike},
    response::{ApiResponse, Meta},
    routes::params::OrderListQuery,
    services::{
        award_service::{self, NewAward},
        catalog_service,
        dispute_service::{self, NewStrike},
        ledger_service::{self, NewEntry},
        order_service,
    },
    state::AppState,
};

pub async fn list_all_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    ensure_admin(user)?;
    let (orders, meta) = order_service::list_with(state, Condition::all(), &query).await?;
    let items = orders.into_iter().map(Order::from).collect();
    Ok(ApiResponse::success("Orders", OrderList { items }, Some(meta)))
}

pub async fn get_order_admin(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<Order>> {
    ensure_admin(user)?;
    let order = order_service::find_order(state, id).await?;
    Ok(ApiResponse::success("OK", Order::from(order), Some(Meta::empty())))
}

pub async fn restock_listing(
    state: &AppState,
    user: &AuthUser,
    product_id: Uuid,
    payload: RestockRequest,
) -> AppResult<ApiResponse<RestockResult>> {
    ensure_admin(user)?;
    if payload.delta == 0 {
        return Err(AppError::BadRequest("delta must not be 0".into()));
    }

    let txn = state.orm.begin().await?;
    let listing =
        catalog_service::adjust_available(&txn, product_id, payload.delta, Utc::now()).await?;
    txn.commit().await?;

    audit::record(
        &state.pool,
        Some(user.user_id),
        "listing_restocked",
        "products",
        serde_json::json!({ "product_id": listing.id, "delta": payload.delta }),
    )
    .await;

    Ok(ApiResponse::success(
        "Listing restocked",
        RestockResult {
            product_id: listing.id,
            quantity_available: listing.quantity_available,
        },
        Some(Meta::empty()),
    ))
}

pub async fn overdue_disputes(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<OverdueDisputeList>> {
    let overdue = dispute_service::overdue_disputes(state, user).await?;
    let total = overdue.len() as i64;
    let items = overdue
        .into_iter()
        .map(|(dispute, clock)| OverdueDispute {
            dispute: Dispute::from(dispute),
            overdue: clock.to_string(),
        })
        .collect();
    Ok(ApiResponse::success(
        "Overdue disputes",
        OverdueDisputeList { items },
        Some(Meta::new(1, total.max(1), total)),
    ))
}

pub async fn escalate_dispute(
    state: &AppState,
    user: &AuthUser,
    dispute_id: Uuid,
) -> AppResult<ApiResponse<Dispute>> {
    let dispute = dispute_service::escalate(state, user, dispute_id).await?;
    audit::record(
        &state.pool,
        Some(user.user_id),
        "dispute_escalated",
        "disputes",
        serde_json::json!({ "dispute_id": dispute.id, "order_id": dispute.order_id }),
    )
    .await;
    Ok(ApiResponse::success(
        "Dispute escalated",
        Dispute::from(dispute),
        Some(Meta::empty()),
    ))
}

pub async fn resolve_dispute(
    state: &AppState,
    user: &AuthUser,
    dispute_id: Uuid,
    payload: ResolveDisputeRequest,
) -> AppResult<ApiResponse<DisputeWithOrder>> {
    let outcome = payload.outcome;
    let (dispute, order) = dispute_service::resolve(state, user, dispute_id, payload).await?;
    audit::record(
        &state.pool,
        Some(user.user_id),
        "dispute_resolved",
        "disputes",
        serde_json::json!({
            "dispute_id": dispute.id,
            "order_id": order.id,
            "outcome": outcome,
            "order_status": order.status,
        }),
    )
    .await;
    Ok(ApiResponse::success(
        "Dispute resolved",
        DisputeWithOrder {
            dispute: Dispute::from(dispute),
            order: Order::from(order),
        },
        Some(Meta::empty()),
    ))
}

pub async fn issue_strike(
    state: &AppState,
    user: &AuthUser,
    payload: IssueStrikeRequest,
) -> AppResult<ApiResponse<Strike>> {
    ensure_admin(user)?;
    let now = Utc::now();
    let cfg = &state.config.settlement;

    let lifetime = match payload.expires_in_days {
        Some(days) if days <= 0 => None,
        Some(days) => Some(Duration::days(days)),
        None => Some(cfg.strike_ttl()),
    };
    let strike = dispute_service::issue_strike(
        &state.orm,
        NewStrike {
            user_id: payload.user_id,
            order_id: payload.order_id,
            strike_type: payload.strike_type,
            description: payload.description,
            expires_at: lifetime.map(|ttl| now + ttl),
            issued_by: Some(user.user_id),
        },
        now,
    )
    .await?;

    audit::record(
        &state.pool,
        Some(user.user_id),
        "strike_issued",
        "user_strikes",
        serde_json::json!({ "strike_id": strike.id, "user_id": strike.user_id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Strike issued",
        Strike::from(strike),
        Some(Meta::empty()),
    ))
}

pub async fn revoke_strike(
    state: &AppState,
    user: &AuthUser,
    strike_id: Uuid,
) -> AppResult<ApiResponse<Strike>> {
    let strike = dispute_service::revoke_strike(state, user, strike_id).await?;
    audit::record(
        &state.pool,
        Some(user.user_id),
        "strike_revoked",
        "user_strikes",
        serde_json::json!({ "strike_id": strike.id, "user_id": strike.user_id }),
    )
    .await;
    Ok(ApiResponse::success(
        "Strike revoked",
        Strike::from(strike),
        Some(Meta::empty()),
    ))
}

pub async fn user_strikes(
    state: &AppState,
    user: &AuthUser,
    user_id: Uuid,
) -> AppResult<ApiResponse<StrikeList>> {
    ensure_admin(user)?;
    let cfg = &state.config.settlement;
    let active_strikes = dispute_service::active_strike_count(&state.orm, user_id, Utc::now()).await?;
    let items = dispute_service::list_strikes(&state.orm, user_id)
        .await?
        .into_iter()
        .map(Strike::from)
        .collect();

    Ok(ApiResponse::success(
        "Strikes",
        StrikeList {
            summary: StrikeSummary {
                user_id,
                active_strikes,
                can_order: dispute_service::strikes_allow_ordering(active_strikes, cfg),
            },
            items,
        },
        Some(Meta::empty()),
    ))
}

pub async fn adjust_ledger(
    state: &AppState,
    user: &AuthUser,
    payload: LedgerAdjustmentRequest,
) -> AppResult<ApiResponse<LedgerAdjustmentResult>> {
    ensure_admin(user)?;
    let reason = payload.reason.trim();
    if reason.is_empty() {
        return Err(AppError::BadRequest("reason is required".into()));
    }
    let co2 = payload.co2_saved.unwrap_or(0.0);
    let water = payload.water_saved.unwrap_or(0.0);
    if payload.credits == 0 && co2 == 0.0 && water == 0.0 {
        return Err(AppError::BadRequest("adjustment must change something".into()));
    }

    let now = Utc::now();
    let txn = state.orm.begin().await?;
    let (entry, account) = if payload.credits < 0 {
        let entry = NewEntry::spend(payload.user_id, ImpactAction::AdminAdjustment, payload.credits.saturating_neg())
            .with_impact(co2, water)
            .describe(reason);
        ledger_service::spend(&txn, entry, now).await?
    } else {
        let entry = NewEntry::earn(payload.user_id, ImpactAction::AdminAdjustment, payload.credits)
            .with_impact(co2, water)
            .describe(reason);
        let account = ledger_service::lock_user(&txn, payload.user_id).await?;
        ledger_service::append_locked(&txn, account, entry, now).await?
    };
    txn.commit().await?;

    audit::record(
        &state.pool,
        Some(user.user_id),
        "ledger_adjusted",
        "eco_ledger_entries",
        serde_json::json!({
            "entry_id": entry.id,
            "user_id": account.id,
            "credits": payload.credits,
        }),
    )
    .await;

    Ok(ApiResponse::success(
        "Ledger adjusted",
        LedgerAdjustmentResult {
            entry: LedgerEntry::from(entry),
            new_balance: account.eco_credits,
        },
        Some(Meta::empty()),
    ))
}

/// Compare the cached credit, CO2 and water totals on the user row with the
/// fold of the ledger.
pub async fn reconcile_balance(
    state: &AppState,
    user: &AuthUser,
    user_id: Uuid,
) -> AppResult<ApiResponse<BalanceReconciliation>> {
    ensure_admin(user)?;
    let account = Users::find_by_id(user_id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;
    let totals = ledger_service::ledger_totals(state, user_id).await?;
    let consistent = totals.matches(&account);
    if !consistent {
        tracing::warn!(
            user_id = %user_id,
            cached_credits = account.eco_credits,
            ledger_credits = totals.credits,
            cached_co2 = account.total_co2_saved,
            ledger_co2 = totals.co2_saved,
            cached_water = account.total_water_saved,
            ledger_water = totals.water_saved,
            "eco totals drifted from ledger"
        );
    }

    Ok(ApiResponse::success(
        "Reconciliation",
        BalanceReconciliation {
            user_id,
            cached_balance: account.eco_credits,
            ledger_balance: totals.credits,
            cached_co2_saved: account.total_co2_saved,
            ledger_co2_saved: totals.co2_saved,
            cached_water_saved: account.total_water_saved,
            ledger_water_saved: totals.water_saved,
            entry_count: totals.entry_count,
            consistent,
        },
        Some(Meta::empty()),
    ))
}

pub async fn create_award(
    state: &AppState,
    user: &AuthUser,
    payload: CreateAwardRequest,
) -> AppResult<ApiResponse<Award>> {
    ensure_admin(user)?;
    Users::find_by_id(payload.user_id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let award = award_service::insert_award(
        &state.orm,
        NewAward {
            user_id: payload.user_id,
            award_type: payload.award_type,
            period_type: payload.period_type,
            period_start: payload.period_start,
            period_end: payload.period_end,
            title: payload
                .title
                .unwrap_or_else(|| payload.award_type.title().to_string()),
            description: payload.description,
            co2_saved: payload.co2_saved.unwrap_or(0.0),
            is_featured: payload.is_featured,
            is_public: payload.is_public,
            awarded_by: Some(user.user_id),
        },
        Utc::now(),
    )
    .await?;

    audit::record(
        &state.pool,
        Some(user.user_id),
        "award_created",
        "awards",
        serde_json::json!({ "award_id": award.id, "user_id": award.user_id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Award created",
        Award::from(award),
        Some(Meta::empty()),
    ))
}

pub async fn award_period_winners(
    state: &AppState,
    user: &AuthUser,
    payload: AwardWinnersRequest,
) -> AppResult<ApiResponse<PeriodWinners>> {
    ensure_admin(user)?;
    let period = payload.period;
    let (starts_at, ends_at, newly_awarded, awards) =
        award_service::award_period_winners(state, period, Some(user.user_id)).await?;

    if newly_awarded {
        audit::record(
            &state.pool,
            Some(user.user_id),
            "period_winners_awarded",
            "awards",
            serde_json::json!({
                "period": period,
                "starts_at": starts_at,
                "award_ids": awards.iter().map(|a| a.id).collect::<Vec<_>>(),
            }),
        )
        .await;
    }

    Ok(ApiResponse::success(
        "Period winners",
        PeriodWinners {
            period,
            starts_at,
            ends_at,
            newly_awarded,
            awards,
        },
        Some(Meta::empty()),
    ))
}
