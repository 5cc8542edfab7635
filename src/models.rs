use std::fmt;

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::entity::{
    awards::Model as AwardModel, disputes::Model as DisputeModel, eco_ledger_entries::Model as LedgerModel,
    order_reviews::Model as ReviewModel, orders::Model as OrderModel,
    user_strikes::Model as StrikeModel,
};

macro_rules! display_as_db_value {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl fmt::Display for $ty {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    f.write_str(&self.to_value())
                }
            }
        )+
    };
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    #[sea_orm(string_value = "PENDING")]
    Pending,
    #[sea_orm(string_value = "PAID")]
    Paid,
    #[sea_orm(string_value = "PROCESSING")]
    Processing,
    #[sea_orm(string_value = "READY_FOR_PICKUP")]
    ReadyForPickup,
    #[sea_orm(string_value = "SHIPPED")]
    Shipped,
    #[sea_orm(string_value = "IN_TRANSIT")]
    InTransit,
    #[sea_orm(string_value = "DELIVERED")]
    Delivered,
    #[sea_orm(string_value = "COMPLETED")]
    Completed,
    #[sea_orm(string_value = "CANCELLED")]
    Cancelled,
    #[sea_orm(string_value = "REFUNDED")]
    Refunded,
    #[sea_orm(string_value = "DISPUTED")]
    Disputed,
}

impl OrderStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            OrderStatus::Completed | OrderStatus::Cancelled | OrderStatus::Refunded
        )
    }

    pub fn is_cancellable(self) -> bool {
        matches!(self, OrderStatus::Pending | OrderStatus::Paid)
    }

    pub fn is_disputable(self) -> bool {
        matches!(self, OrderStatus::Paid | OrderStatus::Delivered)
    }

    pub fn is_pickup_confirmable(self) -> bool {
        matches!(self, OrderStatus::Paid | OrderStatus::ReadyForPickup)
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeliveryType {
    #[sea_orm(string_value = "PICKUP")]
    Pickup,
    #[sea_orm(string_value = "SELLER_SHIPS")]
    SellerShips,
    #[sea_orm(string_value = "BUYER_ARRANGES")]
    BuyerArranges,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DisputeReason {
    #[sea_orm(string_value = "ITEM_NOT_RECEIVED")]
    ItemNotReceived,
    #[sea_orm(string_value = "ITEM_DAMAGED")]
    ItemDamaged,
    #[sea_orm(string_value = "ITEM_NOT_AS_DESCRIBED")]
    ItemNotAsDescribed,
    #[sea_orm(string_value = "SELLER_NO_SHOW")]
    SellerNoShow,
    #[sea_orm(string_value = "BUYER_NO_SHOW")]
    BuyerNoShow,
    #[sea_orm(string_value = "SCAM_ATTEMPT")]
    ScamAttempt,
    #[sea_orm(string_value = "OTHER")]
    Other,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DisputeStatus {
    #[sea_orm(string_value = "OPEN")]
    Open,
    #[sea_orm(string_value = "SELLER_RESPONSE")]
    SellerResponse,
    #[sea_orm(string_value = "ADMIN_REVIEW")]
    AdminReview,
    #[sea_orm(string_value = "RESOLVED_REFUND_FULL")]
    ResolvedRefundFull,
    #[sea_orm(string_value = "RESOLVED_REFUND_PARTIAL")]
    ResolvedRefundPartial,
    #[sea_orm(string_value = "RESOLVED_PAYOUT_SELLER")]
    ResolvedPayoutSeller,
    #[sea_orm(string_value = "RESOLVED_SPLIT")]
    ResolvedSplit,
    #[sea_orm(string_value = "CLOSED")]
    Closed,
}

impl DisputeStatus {
    pub const ACTIVE: [DisputeStatus; 3] = [
        DisputeStatus::Open,
        DisputeStatus::SellerResponse,
        DisputeStatus::AdminReview,
    ];

    pub fn is_active(self) -> bool {
        Self::ACTIVE.contains(&self)
    }

    pub fn is_terminal(self) -> bool {
        !self.is_active()
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ImpactAction {
    #[sea_orm(string_value = "PURCHASE")]
    Purchase,
    #[sea_orm(string_value = "SALE")]
    Sale,
    #[sea_orm(string_value = "GIFT_GIVEN")]
    GiftGiven,
    #[sea_orm(string_value = "GIFT_RECEIVED")]
    GiftReceived,
    #[sea_orm(string_value = "FIRST_PURCHASE")]
    FirstPurchase,
    #[sea_orm(string_value = "FIRST_SALE")]
    FirstSale,
    #[sea_orm(string_value = "PICKUP_BONUS")]
    PickupBonus,
    #[sea_orm(string_value = "REVIEW_BONUS")]
    ReviewBonus,
    #[sea_orm(string_value = "REDEEM_BOOST")]
    RedeemBoost,
    #[sea_orm(string_value = "REDEEM_TREE")]
    RedeemTree,
    #[sea_orm(string_value = "REDEEM_BADGE")]
    RedeemBadge,
    #[sea_orm(string_value = "ADMIN_ADJUSTMENT")]
    AdminAdjustment,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StrikeType {
    #[sea_orm(string_value = "NO_SHOW")]
    NoShow,
    #[sea_orm(string_value = "SCAM_ATTEMPT")]
    ScamAttempt,
    #[sea_orm(string_value = "ABUSE")]
    Abuse,
    #[sea_orm(string_value = "LATE_SHIPMENT")]
    LateShipment,
    #[sea_orm(string_value = "OTHER")]
    Other,
}

display_as_db_value!(
    OrderStatus,
    DeliveryType,
    DisputeReason,
    DisputeStatus,
    ImpactAction,
    StrikeType,
    PeriodType,
    AwardType,
);

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
pub enum PeriodType {
    #[sea_orm(string_value = "WEEKLY")]
    #[serde(rename = "WEEKLY")]
    Weekly,
    #[sea_orm(string_value = "MONTHLY")]
    #[serde(rename = "MONTHLY")]
    Monthly,
    #[sea_orm(string_value = "YEARLY")]
    #[serde(rename = "YEARLY")]
    Yearly,
    #[sea_orm(string_value = "ALLTIME")]
    #[serde(rename = "ALLTIME")]
    AllTime,
}

/// Recognitions shown in the Hall of Fame. The first three are the podium of
/// a closed leaderboard period.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AwardType {
    #[sea_orm(string_value = "ECO_CHAMPION")]
    EcoChampion,
    #[sea_orm(string_value = "ECO_RUNNER_UP")]
    EcoRunnerUp,
    #[sea_orm(string_value = "ECO_THIRD")]
    EcoThird,
    #[sea_orm(string_value = "NEW_ENTRY")]
    NewEntry,
    #[sea_orm(string_value = "RECORD_BREAKER")]
    RecordBreaker,
    #[sea_orm(string_value = "TOP_WEEK")]
    TopWeek,
    #[sea_orm(string_value = "ECO_LEGEND")]
    EcoLegend,
    #[sea_orm(string_value = "MILESTONE")]
    Milestone,
}

impl AwardType {
    pub const PODIUM: [AwardType; 3] = [
        AwardType::EcoChampion,
        AwardType::EcoRunnerUp,
        AwardType::EcoThird,
    ];

    /// Podium award for a 1-based leaderboard rank.
    pub fn for_rank(rank: i64) -> Option<Self> {
        usize::try_from(rank - 1)
            .ok()
            .and_then(|idx| Self::PODIUM.get(idx).copied())
    }

    pub fn title(self) -> &'static str {
        match self {
            AwardType::EcoChampion => "Eco Champion",
            AwardType::EcoRunnerUp => "Eco Runner-up",
            AwardType::EcoThird => "Eco Bronze",
            AwardType::NewEntry => "New Entry",
            AwardType::RecordBreaker => "Record Breaker",
            AwardType::TopWeek => "Top of the Week",
            AwardType::EcoLegend => "Eco Legend",
            AwardType::Milestone => "Milestone",
        }
    }
}

impl PeriodType {
    pub fn display_name(self) -> &'static str {
        match self {
            PeriodType::Weekly => "This week",
            PeriodType::Monthly => "This month",
            PeriodType::Yearly => "This year",
            PeriodType::AllTime => "All time",
        }
    }
}

/// Rewards purchasable with eco-credits. Costs are fixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum RewardType {
    #[serde(rename = "BOOST_24H")]
    Boost24h,
    #[serde(rename = "BOOST_7D")]
    Boost7d,
    #[serde(rename = "TOP_CATEGORY")]
    TopCategory,
    #[serde(rename = "TREE")]
    Tree,
    #[serde(rename = "BADGE")]
    Badge,
}

impl RewardType {
    pub const ALL: [RewardType; 5] = [
        RewardType::Boost24h,
        RewardType::Boost7d,
        RewardType::TopCategory,
        RewardType::Tree,
        RewardType::Badge,
    ];

    pub fn cost(self) -> i64 {
        match self {
            RewardType::Boost24h => 100,
            RewardType::Boost7d => 500,
            RewardType::TopCategory => 200,
            RewardType::Tree => 300,
            RewardType::Badge => 150,
        }
    }

    pub fn action(self) -> ImpactAction {
        match self {
            RewardType::Boost24h | RewardType::Boost7d | RewardType::TopCategory => {
                ImpactAction::RedeemBoost
            }
            RewardType::Tree => ImpactAction::RedeemTree,
            RewardType::Badge => ImpactAction::RedeemBadge,
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            RewardType::Boost24h => "BOOST_24H",
            RewardType::Boost7d => "BOOST_7D",
            RewardType::TopCategory => "TOP_CATEGORY",
            RewardType::Tree => "TREE",
            RewardType::Badge => "BADGE",
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            RewardType::Boost24h => "24h boost active, your listing gets extra visibility.",
            RewardType::Boost7d => "7 day boost active, maximum visibility for a week.",
            RewardType::TopCategory => "Your listing is now featured in its category.",
            RewardType::Tree => "A tree will be planted in your name. The certificate follows by email.",
            RewardType::Badge => "Exclusive badge unlocked on your profile.",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Order {
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
    pub pickup_deadline: Option<DateTime<Utc>>,
    pub pickup_code: Option<String>,
    pub pickup_code_expires_at: Option<DateTime<Utc>>,
    pub pickup_scanned_at: Option<DateTime<Utc>>,
    pub shipping_address: Option<String>,
    pub shipping_city: Option<String>,
    pub shipping_postal_code: Option<String>,
    pub shipping_country: Option<String>,
    pub tracking_number: Option<String>,
    pub tracking_url: Option<String>,
    pub shipping_carrier: Option<String>,
    pub shipped_at: Option<DateTime<Utc>>,
    pub checkout_session_id: Option<String>,
    pub payment_intent_id: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub payout_scheduled_at: Option<DateTime<Utc>>,
    pub payout_completed_at: Option<DateTime<Utc>>,
    pub co2_saved: f64,
    pub water_saved: f64,
    pub eco_credits_buyer: i64,
    pub eco_credits_seller: i64,
    pub buyer_notes: Option<String>,
    pub seller_notes: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancelled_by: Option<Uuid>,
    pub cancellation_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn utc(dt: DateTimeWithTimeZone) -> DateTime<Utc> {
    dt.with_timezone(&Utc)
}

fn opt_utc(dt: Option<DateTimeWithTimeZone>) -> Option<DateTime<Utc>> {
    dt.map(utc)
}

impl From<OrderModel> for Order {
    fn from(model: OrderModel) -> Self {
        Self {
            id: model.id,
            buyer_id: model.buyer_id,
            seller_id: model.seller_id,
            product_id: model.product_id,
            quantity: model.quantity,
            unit_price: model.unit_price,
            shipping_cost: model.shipping_cost,
            total_amount: model.total_amount,
            platform_fee: model.platform_fee,
            gateway_fee: model.gateway_fee,
            seller_payout: model.seller_payout,
            status: model.status,
            delivery_type: model.delivery_type,
            pickup_location_id: model.pickup_location_id,
            pickup_address: model.pickup_address,
            pickup_instructions: model.pickup_instructions,
            pickup_deadline: opt_utc(model.pickup_deadline),
            pickup_code: model.pickup_code,
            pickup_code_expires_at: opt_utc(model.pickup_code_expires_at),
            pickup_scanned_at: opt_utc(model.pickup_scanned_at),
            shipping_address: model.shipping_address,
            shipping_city: model.shipping_city,
            shipping_postal_code: model.shipping_postal_code,
            shipping_country: model.shipping_country,
            tracking_number: model.tracking_number,
            tracking_url: model.tracking_url,
            shipping_carrier: model.shipping_carrier,
            shipped_at: opt_utc(model.shipped_at),
            checkout_session_id: model.checkout_session_id,
            payment_intent_id: model.payment_intent_id,
            paid_at: opt_utc(model.paid_at),
            payout_scheduled_at: opt_utc(model.payout_scheduled_at),
            payout_completed_at: opt_utc(model.payout_completed_at),
            co2_saved: model.co2_saved,
            water_saved: model.water_saved,
            eco_credits_buyer: model.eco_credits_buyer,
            eco_credits_seller: model.eco_credits_seller,
            buyer_notes: model.buyer_notes,
            seller_notes: model.seller_notes,
            completed_at: opt_utc(model.completed_at),
            cancelled_at: opt_utc(model.cancelled_at),
            cancelled_by: model.cancelled_by,
            cancellation_reason: model.cancellation_reason,
            created_at: utc(model.created_at),
            updated_at: utc(model.updated_at),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Dispute {
    pub id: Uuid,
    pub order_id: Uuid,
    pub opened_by: Uuid,
    pub reason: DisputeReason,
    pub description: String,
    pub evidence_urls: Vec<String>,
    pub status: DisputeStatus,
    pub seller_response: Option<String>,
    pub seller_evidence_urls: Vec<String>,
    pub seller_response_at: Option<DateTime<Utc>>,
    pub resolved_by: Option<Uuid>,
    pub resolution_notes: Option<String>,
    pub refund_amount: Option<i64>,
    pub seller_payout_amount: Option<i64>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub seller_response_deadline: Option<DateTime<Utc>>,
    pub admin_review_deadline: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn url_list(value: Json) -> Vec<String> {
    serde_json::from_value(value).unwrap_or_default()
}

impl From<DisputeModel> for Dispute {
    fn from(model: DisputeModel) -> Self {
        Self {
            id: model.id,
            order_id: model.order_id,
            opened_by: model.opened_by,
            reason: model.reason,
            description: model.description,
            evidence_urls: url_list(model.evidence_urls),
            status: model.status,
            seller_response: model.seller_response,
            seller_evidence_urls: url_list(model.seller_evidence_urls),
            seller_response_at: opt_utc(model.seller_response_at),
            resolved_by: model.resolved_by,
            resolution_notes: model.resolution_notes,
            refund_amount: model.refund_amount,
            seller_payout_amount: model.seller_payout_amount,
            resolved_at: opt_utc(model.resolved_at),
            seller_response_deadline: opt_utc(model.seller_response_deadline),
            admin_review_deadline: opt_utc(model.admin_review_deadline),
            created_at: utc(model.created_at),
            updated_at: utc(model.updated_at),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LedgerEntry {
    pub id: Uuid,
    pub user_id: Uuid,
    pub order_id: Option<Uuid>,
    pub action_type: ImpactAction,
    pub co2_saved: f64,
    pub water_saved: f64,
    pub credits_earned: i64,
    pub credits_spent: i64,
    pub resulting_balance: i64,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<LedgerModel> for LedgerEntry {
    fn from(model: LedgerModel) -> Self {
        Self {
            id: model.id,
            user_id: model.user_id,
            order_id: model.order_id,
            action_type: model.action_type,
            co2_saved: model.co2_saved,
            water_saved: model.water_saved,
            credits_earned: model.credits_earned,
            credits_spent: model.credits_spent,
            resulting_balance: model.resulting_balance,
            description: model.description,
            created_at: utc(model.created_at),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Strike {
    pub id: Uuid,
    pub user_id: Uuid,
    pub order_id: Option<Uuid>,
    pub strike_type: StrikeType,
    pub description: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub issued_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl From<StrikeModel> for Strike {
    fn from(model: StrikeModel) -> Self {
        Self {
            id: model.id,
            user_id: model.user_id,
            order_id: model.order_id,
            strike_type: model.strike_type,
            description: model.description,
            expires_at: opt_utc(model.expires_at),
            is_active: model.is_active,
            issued_by: model.issued_by,
            created_at: utc(model.created_at),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Review {
    pub id: Uuid,
    pub order_id: Uuid,
    pub reviewer_id: Option<Uuid>,
    pub reviewed_id: Uuid,
    pub rating: i32,
    pub comment: Option<String>,
    pub is_anonymous: bool,
    pub created_at: DateTime<Utc>,
}

impl From<ReviewModel> for Review {
    fn from(model: ReviewModel) -> Self {
        Self {
            id: model.id,
            order_id: model.order_id,
            reviewer_id: (!model.is_anonymous).then_some(model.reviewer_id),
            reviewed_id: model.reviewed_id,
            rating: model.rating,
            comment: model.comment,
            is_anonymous: model.is_anonymous,
            created_at: utc(model.created_at),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Award {
    pub id: Uuid,
    pub user_id: Uuid,
    /// Filled when the award is listed with its holder.
    pub display_name: Option<String>,
    pub award_type: AwardType,
    pub period_type: Option<PeriodType>,
    pub period_start: Option<DateTime<Utc>>,
    pub period_end: Option<DateTime<Utc>>,
    pub title: String,
    pub description: Option<String>,
    pub co2_saved: f64,
    pub is_featured: bool,
    pub is_public: bool,
    pub created_at: DateTime<Utc>,
}

impl From<AwardModel> for Award {
    fn from(model: AwardModel) -> Self {
        Self {
            id: model.id,
            user_id: model.user_id,
            display_name: None,
            award_type: model.award_type,
            period_type: model.period_type,
            period_start: opt_utc(model.period_start),
            period_end: opt_utc(model.period_end),
            title: model.title,
            description: model.description,
            co2_saved: model.co2_saved,
            is_featured: model.is_featured,
            is_public: model.is_public,
            created_at: utc(model.created_at),
        }
    }
}
