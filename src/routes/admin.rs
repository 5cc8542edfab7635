use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
};
use uuid::Uuid;

use crate::{
    dto::{
        admin::{
            AwardWinnersRequest, BalanceReconciliation, CreateAwardRequest, IssueStrikeRequest,
            LedgerAdjustmentRequest, LedgerAdjustmentResult, OverdueDisputeList, PeriodWinners,
            ResolveDisputeRequest, RestockRequest, RestockResult, StrikeList,
        },
        disputes::DisputeWithOrder,
        orders::OrderList,
    },
    error::AppResult,
    middleware::auth::AuthUser,
    models::{Award, Dispute, Order, Strike},
    response::ApiResponse,
    routes::params::OrderListQuery,
    services::admin_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/orders", get(list_all_orders))
        .route("/orders/{id}", get(get_order_admin))
        .route("/listings/{id}/restock", post(restock_listing))
        .route("/disputes/overdue", get(overdue_disputes))
        .route("/disputes/{id}/escalate", post(escalate_dispute))
        .route("/disputes/{id}/resolve", post(resolve_dispute))
        .route("/strikes", post(issue_strike))
        .route("/strikes/{id}/revoke", post(revoke_strike))
        .route("/users/{id}/strikes", get(user_strikes))
        .route("/users/{id}/reconcile", get(reconcile_balance))
        .route("/ledger/adjustments", post(adjust_ledger))
        .route("/awards", post(create_award))
        .route("/awards/period-winners", post(award_period_winners))
}

#[utoipa::path(
    get,
    path = "/api/admin/orders",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20"),
        ("status" = Option<String>, Query, description = "Filter by status"),
        ("sort_order" = Option<String>, Query, description = "Sort order: asc, desc")
    ),
    responses(
    (status = 200, description = "Get all orders (admin only)", body = ApiResponse<OrderList>),
    (status = 403, description = "Forbidden"),
    (status = 500, description = "Internal Server Error"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn list_all_orders(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<OrderListQuery>,
) -> AppResult<Json<ApiResponse<OrderList>>> {
    let resp = admin_service::list_all_orders(&state, &user, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/admin/orders/{id}",
    params(("id" = Uuid, Path, description = "Order ID")),
    responses(
    (status = 200, description = "Any order, unredacted (admin only)", body = ApiResponse<Order>),
    (status = 404, description = "Not Found"),
    (status = 403, description = "Forbidden"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn get_order_admin(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Order>>> {
    let resp = admin_service::get_order_admin(&state, &user, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/admin/listings/{id}/restock",
    params(("id" = Uuid, Path, description = "Listing ID")),
    request_body = RestockRequest,
    responses(
        (status = 200, description = "Available quantity adjusted", body = ApiResponse<RestockResult>),
        (status = 400, description = "Invalid adjustment"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Not Found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn restock_listing(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<RestockRequest>,
) -> AppResult<Json<ApiResponse<RestockResult>>> {
    let resp = admin_service::restock_listing(&state, &user, id, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/admin/disputes/overdue",
    responses(
        (status = 200, description = "Active disputes past a deadline", body = ApiResponse<OverdueDisputeList>),
        (status = 403, description = "Forbidden"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn overdue_disputes(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<OverdueDisputeList>>> {
    let resp = admin_service::overdue_disputes(&state, &user).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/admin/disputes/{id}/escalate",
    params(("id" = Uuid, Path, description = "Dispute ID")),
    responses(
        (status = 200, description = "Dispute moved to ADMIN_REVIEW", body = ApiResponse<Dispute>),
        (status = 400, description = "Dispute cannot be escalated"),
        (status = 403, description = "Forbidden"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn escalate_dispute(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Dispute>>> {
    let resp = admin_service::escalate_dispute(&state, &user, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/admin/disputes/{id}/resolve",
    params(("id" = Uuid, Path, description = "Dispute ID")),
    request_body = ResolveDisputeRequest,
    responses(
        (status = 200, description = "Dispute resolved and order settled", body = ApiResponse<DisputeWithOrder>),
        (status = 400, description = "Invalid amounts or dispute already resolved"),
        (status = 403, description = "Forbidden"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn resolve_dispute(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<ResolveDisputeRequest>,
) -> AppResult<Json<ApiResponse<DisputeWithOrder>>> {
    let resp = admin_service::resolve_dispute(&state, &user, id, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/admin/strikes",
    request_body = IssueStrikeRequest,
    responses(
        (status = 200, description = "Strike issued", body = ApiResponse<Strike>),
        (status = 403, description = "Forbidden"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn issue_strike(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<IssueStrikeRequest>,
) -> AppResult<Json<ApiResponse<Strike>>> {
    let resp = admin_service::issue_strike(&state, &user, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/admin/strikes/{id}/revoke",
    params(("id" = Uuid, Path, description = "Strike ID")),
    responses(
        (status = 200, description = "Strike no longer counts", body = ApiResponse<Strike>),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Not Found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn revoke_strike(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Strike>>> {
    let resp = admin_service::revoke_strike(&state, &user, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/admin/users/{id}/strikes",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "Strikes and ordering eligibility", body = ApiResponse<StrikeList>),
        (status = 403, description = "Forbidden"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn user_strikes(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<StrikeList>>> {
    let resp = admin_service::user_strikes(&state, &user, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/admin/users/{id}/reconcile",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "Cached balance compared with the ledger", body = ApiResponse<BalanceReconciliation>),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Not Found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn reconcile_balance(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<BalanceReconciliation>>> {
    let resp = admin_service::reconcile_balance(&state, &user, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/admin/ledger/adjustments",
    request_body = LedgerAdjustmentRequest,
    responses(
        (status = 200, description = "Adjustment entry appended", body = ApiResponse<LedgerAdjustmentResult>),
        (status = 400, description = "Empty adjustment"),
        (status = 403, description = "Forbidden"),
        (status = 409, description = "Debit exceeds balance"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn adjust_ledger(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<LedgerAdjustmentRequest>,
) -> AppResult<Json<ApiResponse<LedgerAdjustmentResult>>> {
    let resp = admin_service::adjust_ledger(&state, &user, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/admin/awards",
    request_body = CreateAwardRequest,
    responses(
        (status = 201, description = "Award granted", body = ApiResponse<Award>),
        (status = 400, description = "Invalid period or title"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "User not found"),
        (status = 409, description = "Podium already awarded for the period"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn create_award(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateAwardRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<Award>>)> {
    let resp = admin_service::create_award(&state, &user, payload).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

#[utoipa::path(
    post,
    path = "/api/admin/awards/period-winners",
    request_body = AwardWinnersRequest,
    responses(
        (status = 200, description = "Podium of the last closed window", body = ApiResponse<PeriodWinners>),
        (status = 400, description = "All-time has no closed window"),
        (status = 403, description = "Forbidden"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn award_period_winners(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<AwardWinnersRequest>,
) -> AppResult<Json<ApiResponse<PeriodWinners>>> {
    let resp = admin_service::award_period_winners(&state, &user, payload).await?;
    Ok(Json(resp))
}
