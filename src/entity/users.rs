use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub email: String,
    pub display_name: String,
    pub role: String,
    pub is_active: bool,
    /// Cached balance. The ledger is the source of truth.
    pub eco_credits: i64,
    pub total_co2_saved: f64,
    pub total_water_saved: f64,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::awards::Entity")]
    Awards,
    #[sea_orm(has_many = "super::eco_ledger_entries::Entity")]
    EcoLedgerEntries,
    #[sea_orm(has_many = "super::user_strikes::Entity")]
    UserStrikes,
}

impl Related<super::awards::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Awards.def()
    }
}

impl Related<super::eco_ledger_entries::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::EcoLedgerEntries.def()
    }
}

impl Related<super::user_strikes::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::UserStrikes.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
