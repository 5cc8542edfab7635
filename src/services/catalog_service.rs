//! Listing access for the order core: read a listing, price it, and move its
//! available quantity. Quantity only changes on payment and admin restock.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveModelTrait, ConnectionTrait, DatabaseTransaction, EntityTrait, QuerySelect, Set};
use sea_orm::sea_query::LockType;
use uuid::Uuid;

use crate::{
    entity::products::{ActiveModel as ProductActive, Entity as Products, Model as ProductModel},
    error::{AppError, AppResult},
    services::pricing::{DutchAuction, current_unit_price},
};

pub async fn get_listing<C: ConnectionTrait>(conn: &C, id: Uuid) -> AppResult<ProductModel> {
    Products::find_by_id(id)
        .one(conn)
        .await?
        .ok_or(AppError::NotFound)
}

pub async fn lock_listing(txn: &DatabaseTransaction, id: Uuid) -> AppResult<ProductModel> {
    Products::find_by_id(id)
        .lock(LockType::Update)
        .one(txn)
        .await?
        .ok_or(AppError::NotFound)
}

pub fn auction_of(listing: &ProductModel) -> Option<DutchAuction> {
    listing.is_dutch_auction.then(|| DutchAuction {
        start_price: listing.dutch_start_price,
        decrease_amount: listing.dutch_decrease_amount,
        decrease_hours: listing.dutch_decrease_hours,
        min_price: listing.dutch_min_price,
        started_at: listing.dutch_started_at.map(|dt| dt.with_timezone(&Utc)),
    })
}

pub fn effective_price(listing: &ProductModel, now: DateTime<Utc>) -> i64 {
    current_unit_price(listing.price, auction_of(listing).as_ref(), now)
}

/// Take `amount` units off a listing after payment. Payment is already
/// captured at this point, so a shortfall clamps to zero and is logged.
pub async fn decrement_available(
    txn: &DatabaseTransaction,
    id: Uuid,
    amount: i32,
    now: DateTime<Utc>,
) -> AppResult<ProductModel> {
    let listing = lock_listing(txn, id).await?;
    let remaining = listing.quantity_available - amount;
    if remaining < 0 {
        tracing::warn!(
            product_id = %id,
            available = listing.quantity_available,
            requested = amount,
            "listing oversold, clamping available quantity to zero"
        );
    }

    let mut active: ProductActive = listing.into();
    active.quantity_available = Set(remaining.max(0));
    active.updated_at = Set(now.into());
    Ok(active.update(txn).await?)
}

/// Administrative restock. Rejects changes that would go negative.
pub async fn adjust_available(
    txn: &DatabaseTransaction,
    id: Uuid,
    delta: i32,
    now: DateTime<Utc>,
) -> AppResult<ProductModel> {
    let listing = lock_listing(txn, id).await?;
    let updated = listing
        .quantity_available
        .checked_add(delta)
        .filter(|q| *q >= 0)
        .ok_or_else(|| {
            AppError::BadRequest(format!(
                "Available quantity {} cannot change by {delta}",
                listing.quantity_available
            ))
        })?;

    let mut active: ProductActive = listing.into();
    active.quantity_available = Set(updated);
    active.updated_at = Set(now.into());
    Ok(active.update(txn).await?)
}
