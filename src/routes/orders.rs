use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, patch, post},
};
use uuid::Uuid;

use crate::{
    dto::{
        disputes::{DisputeWithOrder, OpenDisputeRequest, RespondDisputeRequest},
        orders::{
            CancelOrderRequest, CheckoutRedirect, ConfirmPickupRequest, CreateOrderRequest,
            CreateReviewRequest, OrderList, PickupCodeView, ReviewCreated, TrackingRequest,
            UpdateStatusRequest,
        },
    },
    error::AppResult,
    middleware::auth::AuthUser,
    models::{Dispute, Order},
    response::ApiResponse,
    routes::params::OrderListQuery,
    services::order_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_order).get(list_my_orders))
        .route("/seller", get(list_seller_orders))
        .route("/confirm-pickup", post(confirm_pickup))
        .route("/{id}", get(get_order))
        .route("/{id}/status", patch(update_status))
        .route("/{id}/tracking", post(update_tracking))
        .route("/{id}/cancel", post(cancel_order))
        .route("/{id}/checkout", post(retry_checkout))
        .route("/{id}/pickup-code", get(get_pickup_code))
        .route("/{id}/dispute", post(open_dispute).get(get_dispute))
        .route("/{id}/dispute/respond", post(respond_to_dispute))
        .route("/{id}/review", post(create_review))
}

#[utoipa::path(
    post,
    path = "/api/orders",
    request_body = CreateOrderRequest,
    responses(
        (status = 201, description = "Order created, follow redirect_url to pay", body = ApiResponse<CheckoutRedirect>),
        (status = 400, description = "Validation failed (self purchase, missing shipping info)"),
        (status = 403, description = "Ordering suspended"),
        (status = 404, description = "Listing not found"),
        (status = 409, description = "Insufficient stock"),
        (status = 502, description = "Order kept as PENDING, checkout could not be built"),
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn create_order(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateOrderRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<CheckoutRedirect>>)> {
    let resp = order_service::create_order(&state, &user, payload).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

#[utoipa::path(
    get,
    path = "/api/orders",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20"),
        ("status" = Option<String>, Query, description = "Filter by status"),
        ("sort_order" = Option<String>, Query, description = "Sort order: asc, desc")
    ),
    responses(
        (status = 200, description = "Orders placed by the caller", body = ApiResponse<OrderList>),
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn list_my_orders(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<OrderListQuery>,
) -> AppResult<Json<ApiResponse<OrderList>>> {
    let resp = order_service::list_my_orders(&state, &user, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/orders/seller",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20"),
        ("status" = Option<String>, Query, description = "Filter by status"),
        ("sort_order" = Option<String>, Query, description = "Sort order: asc, desc")
    ),
    responses(
        (status = 200, description = "Orders on the caller's listings", body = ApiResponse<OrderList>),
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn list_seller_orders(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<OrderListQuery>,
) -> AppResult<Json<ApiResponse<OrderList>>> {
    let resp = order_service::list_seller_orders(&state, &user, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/orders/{id}",
    params(("id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Order, with fields the caller may not see removed", body = ApiResponse<Order>),
        (status = 404, description = "Not Found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn get_order(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Order>>> {
    let resp = order_service::get_order(&state, &user, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    patch,
    path = "/api/orders/{id}/status",
    params(("id" = Uuid, Path, description = "Order ID")),
    request_body = UpdateStatusRequest,
    responses(
        (status = 200, description = "Status changed", body = ApiResponse<Order>),
        (status = 400, description = "Status cannot be set directly"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Not Found"),
        (status = 409, description = "Transition not allowed"),
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn update_status(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateStatusRequest>,
) -> AppResult<Json<ApiResponse<Order>>> {
    let resp = order_service::update_status(&state, &user, id, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/orders/{id}/tracking",
    params(("id" = Uuid, Path, description = "Order ID")),
    request_body = TrackingRequest,
    responses(
        (status = 200, description = "Tracking stored, order SHIPPED", body = ApiResponse<Order>),
        (status = 403, description = "Forbidden"),
        (status = 409, description = "Order cannot ship from its current status"),
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn update_tracking(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<TrackingRequest>,
) -> AppResult<Json<ApiResponse<Order>>> {
    let resp = order_service::update_tracking(&state, &user, id, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/orders/{id}/cancel",
    params(("id" = Uuid, Path, description = "Order ID")),
    request_body = CancelOrderRequest,
    responses(
        (status = 200, description = "Order cancelled", body = ApiResponse<Order>),
        (status = 403, description = "Forbidden"),
        (status = 409, description = "Order is past the point of cancellation"),
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn cancel_order(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<CancelOrderRequest>,
) -> AppResult<Json<ApiResponse<Order>>> {
    let resp = order_service::cancel_order(&state, &user, id, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/orders/{id}/checkout",
    params(("id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "New checkout page for a PENDING order", body = ApiResponse<CheckoutRedirect>),
        (status = 409, description = "Order is no longer PENDING"),
        (status = 502, description = "Gateway unavailable"),
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn retry_checkout(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<CheckoutRedirect>>> {
    let resp = order_service::retry_checkout(&state, &user, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/orders/{id}/pickup-code",
    params(("id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Pickup code to show the seller", body = ApiResponse<PickupCodeView>),
        (status = 403, description = "Forbidden"),
        (status = 409, description = "No usable code for this order"),
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn get_pickup_code(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<PickupCodeView>>> {
    let resp = order_service::get_pickup_code(&state, &user, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/orders/confirm-pickup",
    request_body = ConfirmPickupRequest,
    responses(
        (status = 200, description = "Pickup confirmed, order DELIVERED", body = ApiResponse<Order>),
        (status = 403, description = "Only the seller confirms pickups"),
        (status = 409, description = "Invalid or expired code"),
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn confirm_pickup(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<ConfirmPickupRequest>,
) -> AppResult<Json<ApiResponse<Order>>> {
    let resp = order_service::confirm_pickup(&state, &user, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/orders/{id}/dispute",
    params(("id" = Uuid, Path, description = "Order ID")),
    request_body = OpenDisputeRequest,
    responses(
        (status = 200, description = "Dispute opened, order DISPUTED", body = ApiResponse<DisputeWithOrder>),
        (status = 400, description = "Description too short"),
        (status = 409, description = "Order not disputable or dispute already open"),
    ),
    security(("bearer_auth" = [])),
    tag = "Disputes"
)]
pub async fn open_dispute(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<OpenDisputeRequest>,
) -> AppResult<Json<ApiResponse<DisputeWithOrder>>> {
    let resp = order_service::open_dispute(&state, &user, id, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/orders/{id}/dispute",
    params(("id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Latest dispute on the order", body = ApiResponse<DisputeWithOrder>),
        (status = 404, description = "Not Found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Disputes"
)]
pub async fn get_dispute(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<DisputeWithOrder>>> {
    let resp = order_service::get_dispute(&state, &user, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/orders/{id}/dispute/respond",
    params(("id" = Uuid, Path, description = "Order ID")),
    request_body = RespondDisputeRequest,
    responses(
        (status = 200, description = "Seller response recorded", body = ApiResponse<Dispute>),
        (status = 400, description = "Response too short or dispute not open"),
        (status = 403, description = "Forbidden"),
    ),
    security(("bearer_auth" = [])),
    tag = "Disputes"
)]
pub async fn respond_to_dispute(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<RespondDisputeRequest>,
) -> AppResult<Json<ApiResponse<Dispute>>> {
    let resp = order_service::respond_to_dispute(&state, &user, id, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/orders/{id}/review",
    params(("id" = Uuid, Path, description = "Order ID")),
    request_body = CreateReviewRequest,
    responses(
        (status = 200, description = "Review saved", body = ApiResponse<ReviewCreated>),
        (status = 400, description = "Rating out of range or order not delivered yet"),
        (status = 409, description = "Already reviewed"),
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn create_review(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<CreateReviewRequest>,
) -> AppResult<Json<ApiResponse<ReviewCreated>>> {
    let resp = order_service::create_review(&state, &user, id, payload).await?;
    Ok(Json(resp))
}
