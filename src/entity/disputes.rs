use sea_orm::entity::prelude::*;

use crate::models::{DisputeReason, DisputeStatus};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "disputes")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub order_id: Uuid,
    pub opened_by: Uuid,
    pub reason: DisputeReason,
    pub description: String,
    pub evidence_urls: Json,
    pub status: DisputeStatus,
    pub seller_response: Option<String>,
    pub seller_evidence_urls: Json,
    pub seller_response_at: Option<DateTimeWithTimeZone>,
    pub resolved_by: Option<Uuid>,
    pub resolution_notes: Option<String>,
    pub refund_amount: Option<i64>,
    pub seller_payout_amount: Option<i64>,
    pub resolved_at: Option<DateTimeWithTimeZone>,
    pub seller_response_deadline: Option<DateTimeWithTimeZone>,
    pub admin_review_deadline: Option<DateTimeWithTimeZone>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::orders::Entity",
        from = "Column::OrderId",
        to = "super::orders::Column::Id",
        on_delete = "Cascade"
    )]
    Orders,
}

impl Related<super::orders::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Orders.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
