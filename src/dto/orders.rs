use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::{DeliveryType, Order, OrderStatus, Review};

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateOrderRequest {
    pub product_id: Uuid,
    pub quantity: i32,
    pub delivery_type: DeliveryType,
    pub shipping_address: Option<String>,
    pub shipping_city: Option<String>,
    pub shipping_postal_code: Option<String>,
    pub shipping_country: Option<String>,
    pub buyer_notes: Option<String>,
}

impl CreateOrderRequest {
    pub fn pickup(product_id: Uuid, quantity: i32) -> Self {
        Self {
            product_id,
            quantity,
            delivery_type: DeliveryType::Pickup,
            shipping_address: None,
            shipping_city: None,
            shipping_postal_code: None,
            shipping_country: None,
            buyer_notes: None,
        }
    }
}

/// What the client does next after creating or retrying an order.
#[derive(Debug, Serialize, ToSchema)]
pub struct CheckoutRedirect {
    pub order: Order,
    pub redirect_url: String,
    pub checkout_session_id: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateStatusRequest {
    pub status: OrderStatus,
    pub seller_notes: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct TrackingRequest {
    pub tracking_number: String,
    pub tracking_url: Option<String>,
    pub shipping_carrier: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CancelOrderRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ConfirmPickupRequest {
    pub pickup_code: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PickupCodeView {
    pub order_id: Uuid,
    pub pickup_code: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub pickup_deadline: Option<DateTime<Utc>>,
    pub pickup_address: Option<String>,
    pub pickup_instructions: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateReviewRequest {
    pub rating: i32,
    pub comment: Option<String>,
    #[serde(default)]
    pub is_anonymous: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ReviewCreated {
    pub review: Review,
    pub credits_earned: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderList {
    pub items: Vec<Order>,
}
