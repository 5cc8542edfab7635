use sea_orm::entity::prelude::*;

use crate::models::{DeliveryType, OrderStatus};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub buyer_id: Uuid,
    pub seller_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    pub unit_price: i64,
    pub shipping_cost: i64,
    pub total_amount: i64,
    pub platform_fee: i64,
    pub gateway_fee: i64,
    pub seller_payout: i64,
    pub status: OrderStatus,
    pub delivery_type: DeliveryType,
    pub pickup_location_id: Option<Uuid>,
    pub pickup_address: Option<String>,
    pub pickup_instructions: Option<String>,
    pub pickup_deadline: Option<DateTimeWithTimeZone>,
    #[sea_orm(unique)]
    pub pickup_code: Option<String>,
    pub pickup_code_expires_at: Option<DateTimeWithTimeZone>,
    pub pickup_scanned_at: Option<DateTimeWithTimeZone>,
    pub shipping_address: Option<String>,
    pub shipping_city: Option<String>,
    pub shipping_postal_code: Option<String>,
    pub shipping_country: Option<String>,
    pub tracking_number: Option<String>,
    pub tracking_url: Option<String>,
    pub shipping_carrier: Option<String>,
    pub shipped_at: Option<DateTimeWithTimeZone>,
    pub checkout_session_id: Option<String>,
    pub payment_intent_id: Option<String>,
    pub paid_at: Option<DateTimeWithTimeZone>,
    pub payout_scheduled_at: Option<DateTimeWithTimeZone>,
    pub payout_completed_at: Option<DateTimeWithTimeZone>,
    pub co2_saved: f64,
    pub water_saved: f64,
    pub eco_credits_buyer: i64,
    pub eco_credits_seller: i64,
    /// Set once the completion grants have been written to the ledger.
    pub impact_recorded_at: Option<DateTimeWithTimeZone>,
    pub buyer_notes: Option<String>,
    pub seller_notes: Option<String>,
    pub completed_at: Option<DateTimeWithTimeZone>,
    pub cancelled_at: Option<DateTimeWithTimeZone>,
    pub cancelled_by: Option<Uuid>,
    pub cancellation_reason: Option<String>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::products::Entity",
        from = "Column::ProductId",
        to = "super::products::Column::Id"
    )]
    Products,
    #[sea_orm(has_many = "super::disputes::Entity")]
    Disputes,
}

impl Related<super::products::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Products.def()
    }
}

impl Related<super::disputes::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Disputes.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
