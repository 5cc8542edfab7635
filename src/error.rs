use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::{Value, json};
use thiserror::Error;
use uuid::Uuid;

use crate::{
    models::OrderStatus,
    response::{ApiResponse, Meta},
};

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not Found")]
    NotFound,

    #[error("Bad Request {0}")]
    BadRequest(String),

    #[error("Forbidden")]
    Forbidden,

    #[error("Cannot buy your own listing")]
    SelfPurchase,

    #[error("Shipping address is required for this delivery type")]
    MissingShippingInfo,

    #[error("Transition from {current} to {requested} is not allowed")]
    InvalidTransition {
        current: OrderStatus,
        requested: OrderStatus,
    },

    #[error("Requested quantity {requested} exceeds available {available}")]
    InsufficientStock { requested: i32, available: i32 },

    #[error("Ordering is suspended for this account")]
    OrderingSuspended,

    #[error("Pickup code is invalid or expired")]
    InvalidOrExpiredCode,

    #[error("Order already has an active dispute")]
    DisputeAlreadyOpen,

    #[error("Order already reviewed")]
    AlreadyReviewed,

    #[error("Award already granted for this period")]
    AwardAlreadyGranted,

    #[error("Insufficient eco-credits: required {required}, balance {balance}")]
    InsufficientBalance { required: i64, balance: i64 },

    #[error("Invalid webhook signature")]
    InvalidSignature,

    #[error("Payment gateway unavailable")]
    GatewayUnavailable { order_id: Uuid },

    #[error("Database error")]
    DbError(#[from] sqlx::Error),

    #[error("ORM error")]
    OrmError(#[from] sea_orm::DbErr),

    #[error("Internal Server Error")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::BadRequest(_)
            | AppError::SelfPurchase
            | AppError::MissingShippingInfo
            | AppError::InvalidSignature => StatusCode::BAD_REQUEST,
            AppError::Forbidden | AppError::OrderingSuspended => StatusCode::FORBIDDEN,
            AppError::InvalidTransition { .. }
            | AppError::InsufficientStock { .. }
            | AppError::InvalidOrExpiredCode
            | AppError::DisputeAlreadyOpen
            | AppError::AlreadyReviewed
            | AppError::AwardAlreadyGranted
            | AppError::InsufficientBalance { .. } => StatusCode::CONFLICT,
            AppError::GatewayUnavailable { .. } => StatusCode::BAD_GATEWAY,
            AppError::DbError(_) | AppError::OrmError(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Context a caller needs to react to a conflict without re-reading state.
    fn details(&self) -> Option<Value> {
        match self {
            AppError::InvalidTransition { current, requested } => Some(json!({
                "current_status": current,
                "requested": requested,
            })),
            AppError::InsufficientStock {
                requested,
                available,
            } => Some(json!({ "requested": requested, "available": available })),
            AppError::InsufficientBalance { required, balance } => Some(json!({
                "required": required,
                "current_balance": balance,
            })),
            AppError::GatewayUnavailable { order_id } => Some(json!({ "order_id": order_id })),
            _ => None,
        }
    }
}

#[derive(Serialize)]
struct ErrorData {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Value>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = ?self, "request failed");
        }

        let body = ApiResponse {
            message: self.to_string(),
            data: Some(ErrorData {
                error: self.to_string(),
                details: self.details(),
            }),
            meta: Some(Meta::empty()),
        };

        (status, axum::Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
