use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, Set, SqlErr,
    TransactionTrait,
};
use uuid::Uuid;

use crate::{
    dto::orders::CreateReviewRequest,
    entity::order_reviews::{ActiveModel as ReviewActive, Column as ReviewCol, Entity as OrderReviews, Model as ReviewModel},
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{ImpactAction, OrderStatus},
    services::{
        ledger_service::{self, NewEntry},
        order_store,
        policy::{self, OrderAction},
    },
    state::AppState,
};

/// Buyer reviews seller or seller reviews buyer, once per order, after
/// delivery. Each review earns the reviewer a small bonus.
pub async fn create_review(
    state: &AppState,
    actor: &AuthUser,
    order_id: Uuid,
    payload: CreateReviewRequest,
) -> AppResult<(ReviewModel, i64)> {
    if !(1..=5).contains(&payload.rating) {
        return Err(AppError::BadRequest("rating must be between 1 and 5".into()));
    }

    let now = Utc::now();
    let txn = state.orm.begin().await?;
    let order = order_store::lock_order(&txn, order_id).await?;
    policy::ensure(actor, &order, OrderAction::Review)?;

    if !matches!(order.status, OrderStatus::Delivered | OrderStatus::Completed) {
        return Err(AppError::BadRequest(format!(
            "Orders can be reviewed once delivered, this one is {}",
            order.status
        )));
    }

    let existing = OrderReviews::find()
        .filter(ReviewCol::OrderId.eq(order.id))
        .filter(ReviewCol::ReviewerId.eq(actor.user_id))
        .count(&txn)
        .await?;
    if existing > 0 {
        return Err(AppError::AlreadyReviewed);
    }

    let reviewed_id = if actor.user_id == order.buyer_id {
        order.seller_id
    } else {
        order.buyer_id
    };

    let review = ReviewActive {
        id: Set(Uuid::new_v4()),
        order_id: Set(order.id),
        reviewer_id: Set(actor.user_id),
        reviewed_id: Set(reviewed_id),
        rating: Set(payload.rating),
        comment: Set(payload.comment.map(|c| c.trim().to_string()).filter(|c| !c.is_empty())),
        is_anonymous: Set(payload.is_anonymous),
        created_at: Set(now.into()),
    }
    .insert(&txn)
    .await
    .map_err(|err| match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => AppError::AlreadyReviewed,
        _ => AppError::from(err),
    })?;

    let bonus = state.config.settlement.review_bonus;
    if bonus > 0 {
        ledger_service::append(
            &txn,
            NewEntry::earn(actor.user_id, ImpactAction::ReviewBonus, bonus)
                .for_order(order.id)
                .describe("Review left"),
            now,
        )
        .await?;
    }
    txn.commit().await?;

    Ok((review, bonus.max(0)))
}
