use axum::{
    Json, Router,
    extract::{Query, State},
    routing::{get, post},
};

use crate::{
    dto::eco::{
        AwardList, CommunityStats, HallOfFame, Leaderboard, LeaderboardQuery, LedgerHistory,
        MyRank, RedeemRequest, RedeemResult, RewardCatalog,
    },
    error::AppResult,
    middleware::auth::AuthUser,
    response::ApiResponse,
    routes::params::{Pagination, PeriodQuery},
    services::eco_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/leaderboard", get(leaderboard))
        .route("/my-rank", get(my_rank))
        .route("/community-stats", get(community_stats))
        .route("/hall-of-fame", get(hall_of_fame))
        .route("/my-awards", get(my_awards))
        .route("/history", get(history))
        .route("/rewards", get(rewards))
        .route("/redeem", post(redeem))
}

#[utoipa::path(
    get,
    path = "/api/eco/leaderboard",
    params(
        ("period" = Option<String>, Query, description = "WEEKLY, MONTHLY (default), YEARLY or ALLTIME"),
        ("limit" = Option<i64>, Query, description = "Entries, default 10, max 100")
    ),
    responses(
        (status = 200, description = "Top savers by CO2 in the period", body = ApiResponse<Leaderboard>),
    ),
    tag = "Eco"
)]
pub async fn leaderboard(
    State(state): State<AppState>,
    Query(query): Query<LeaderboardQuery>,
) -> AppResult<Json<ApiResponse<Leaderboard>>> {
    let resp = eco_service::leaderboard(&state, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/eco/my-rank",
    params(("period" = Option<String>, Query, description = "WEEKLY, MONTHLY (default), YEARLY or ALLTIME")),
    responses(
        (status = 200, description = "Caller's position in the period", body = ApiResponse<MyRank>),
    ),
    security(("bearer_auth" = [])),
    tag = "Eco"
)]
pub async fn my_rank(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<PeriodQuery>,
) -> AppResult<Json<ApiResponse<MyRank>>> {
    let resp = eco_service::my_rank(&state, &user, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/eco/community-stats",
    responses(
        (status = 200, description = "Platform-wide impact totals", body = ApiResponse<CommunityStats>),
    ),
    tag = "Eco"
)]
pub async fn community_stats(
    State(state): State<AppState>,
) -> AppResult<Json<ApiResponse<CommunityStats>>> {
    let resp = eco_service::community_stats(&state).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/eco/hall-of-fame",
    params(("period" = Option<String>, Query, description = "WEEKLY, MONTHLY (default) or YEARLY")),
    responses(
        (status = 200, description = "Public awards of the last closed period", body = ApiResponse<HallOfFame>),
        (status = 400, description = "All-time has no closed window"),
    ),
    tag = "Eco"
)]
pub async fn hall_of_fame(
    State(state): State<AppState>,
    Query(query): Query<PeriodQuery>,
) -> AppResult<Json<ApiResponse<HallOfFame>>> {
    let resp = eco_service::hall_of_fame(&state, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/eco/my-awards",
    responses(
        (status = 200, description = "Caller's awards, newest first", body = ApiResponse<AwardList>),
    ),
    security(("bearer_auth" = [])),
    tag = "Eco"
)]
pub async fn my_awards(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<AwardList>>> {
    let resp = eco_service::my_awards(&state, &user).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/eco/history",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20")
    ),
    responses(
        (status = 200, description = "Caller's ledger entries, newest first", body = ApiResponse<LedgerHistory>),
    ),
    security(("bearer_auth" = [])),
    tag = "Eco"
)]
pub async fn history(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<Pagination>,
) -> AppResult<Json<ApiResponse<LedgerHistory>>> {
    let resp = eco_service::history(&state, &user, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/eco/rewards",
    responses(
        (status = 200, description = "Reward catalog with affordability", body = ApiResponse<RewardCatalog>),
    ),
    security(("bearer_auth" = [])),
    tag = "Eco"
)]
pub async fn rewards(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<RewardCatalog>>> {
    let resp = eco_service::rewards(&state, &user).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/eco/redeem",
    request_body = RedeemRequest,
    responses(
        (status = 200, description = "Reward redeemed", body = ApiResponse<RedeemResult>),
        (status = 409, description = "Insufficient eco-credits"),
    ),
    security(("bearer_auth" = [])),
    tag = "Eco"
)]
pub async fn redeem(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<RedeemRequest>,
) -> AppResult<Json<ApiResponse<RedeemResult>>> {
    let resp = eco_service::redeem(&state, &user, payload).await?;
    Ok(Json(resp))
}
