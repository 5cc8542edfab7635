use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "products")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub seller_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub price: i64,
    pub quantity_available: i32,
    pub shipping_cost: i64,
    pub pickup_location_id: Option<Uuid>,
    pub pickup_address: Option<String>,
    pub pickup_instructions: Option<String>,
    pub is_dutch_auction: bool,
    pub dutch_start_price: Option<i64>,
    pub dutch_decrease_amount: Option<i64>,
    pub dutch_decrease_hours: Option<i32>,
    pub dutch_min_price: Option<i64>,
    pub dutch_started_at: Option<DateTimeWithTimeZone>,
    pub co2_per_unit_kg: Option<f64>,
    pub water_per_unit_l: Option<f64>,
    pub is_active: bool,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::SellerId",
        to = "super::users::Column::Id"
    )]
    Seller,
    #[sea_orm(has_many = "super::orders::Entity")]
    Orders,
}

impl Related<super::orders::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Orders.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
