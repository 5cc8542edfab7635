use sea_orm::EntityTrait;
use uuid::Uuid;

use crate::{
    dto::eco::{
        AwardList, CommunityStats, HallOfFame, Leaderboard, LeaderboardQuery, LedgerHistory,
        MyRank, RedeemRequest, RedeemResult, Reward, RewardCatalog,
    },
    entity::users::{Entity as Users, Model as UserModel},
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_active},
    models::{PeriodType, RewardType},
    response::{ApiResponse, Meta},
    routes::params::{Pagination, PeriodQuery},
    services::{award_service, ledger_service},
    state::AppState,
};

const DEFAULT_LEADERBOARD_SIZE: i64 = 10;
const MAX_LEADERBOARD_SIZE: i64 = 100;

async fn find_user(state: &AppState, user_id: Uuid) -> AppResult<UserModel> {
    Users::find_by_id(user_id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)
}

pub async fn leaderboard(
    state: &AppState,
    query: LeaderboardQuery,
) -> AppResult<ApiResponse<Leaderboard>> {
    let period = query.period.unwrap_or(PeriodType::Monthly);
    let limit = query
        .limit
        .unwrap_or(DEFAULT_LEADERBOARD_SIZE)
        .clamp(1, MAX_LEADERBOARD_SIZE);
    let board = ledger_service::leaderboard(state, period, limit).await?;
    Ok(ApiResponse::success("Leaderboard", board, Some(Meta::empty())))
}

pub async fn my_rank(
    state: &AppState,
    actor: &AuthUser,
    query: PeriodQuery,
) -> AppResult<ApiResponse<MyRank>> {
    let period = query.period.unwrap_or(PeriodType::Monthly);
    let rank = ledger_service::my_rank(state, actor.user_id, period).await?;
    Ok(ApiResponse::success("Rank", rank, Some(Meta::empty())))
}

pub async fn community_stats(state: &AppState) -> AppResult<ApiResponse<CommunityStats>> {
    let stats = ledger_service::community_stats(state).await?;
    Ok(ApiResponse::success("Community stats", stats, Some(Meta::empty())))
}

/// Defaults to the last closed month.
pub async fn hall_of_fame(
    state: &AppState,
    query: PeriodQuery,
) -> AppResult<ApiResponse<HallOfFame>> {
    let period = query.period.unwrap_or(PeriodType::Monthly);
    let hall = award_service::hall_of_fame(state, period).await?;
    Ok(ApiResponse::success("Hall of Fame", hall, Some(Meta::empty())))
}

pub async fn my_awards(state: &AppState, actor: &AuthUser) -> AppResult<ApiResponse<AwardList>> {
    let items = award_service::user_awards(state, actor.user_id).await?;
    Ok(ApiResponse::success("Awards", AwardList { items }, Some(Meta::empty())))
}

pub async fn history(
    state: &AppState,
    actor: &AuthUser,
    query: Pagination,
) -> AppResult<ApiResponse<LedgerHistory>> {
    let (page, limit, offset) = query.normalize();
    let user = find_user(state, actor.user_id).await?;
    let (items, total) = ledger_service::history(state, user.id, limit, offset).await?;
    Ok(ApiResponse::success(
        "Ledger history",
        LedgerHistory {
            balance: user.eco_credits,
            items,
        },
        Some(Meta::new(page, limit, total)),
    ))
}

pub fn reward_catalog(balance: i64) -> RewardCatalog {
    let items = RewardType::ALL
        .into_iter()
        .map(|reward| Reward {
            reward_type: reward,
            cost: reward.cost(),
            description: reward.message().to_string(),
            affordable: balance >= reward.cost(),
        })
        .collect();
    RewardCatalog { balance, items }
}

pub async fn rewards(state: &AppState, actor: &AuthUser) -> AppResult<ApiResponse<RewardCatalog>> {
    let user = find_user(state, actor.user_id).await?;
    Ok(ApiResponse::success(
        "Rewards",
        reward_catalog(user.eco_credits),
        Some(Meta::empty()),
    ))
}

pub async fn redeem(
    state: &AppState,
    actor: &AuthUser,
    payload: RedeemRequest,
) -> AppResult<ApiResponse<RedeemResult>> {
    ensure_active(actor)?;
    let reward = payload.reward_type;
    let (entry, user) = ledger_service::redeem(state, actor.user_id, reward).await?;

    tracing::info!(user_id = %user.id, reward = reward.code(), balance = user.eco_credits, "reward redeemed");
    crate::audit::record(
        &state.pool,
        Some(actor.user_id),
        "reward_redeemed",
        "eco_ledger_entries",
        serde_json::json!({ "entry_id": entry.id, "reward": reward.code() }),
    )
    .await;

    Ok(ApiResponse::success(
        "Reward redeemed",
        RedeemResult {
            reward_type: reward,
            credits_spent: entry.credits_spent,
            new_balance: user.eco_credits,
            message: reward.message().to_string(),
        },
        Some(Meta::empty()),
    ))
}
