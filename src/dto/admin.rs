use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::{Award, AwardType, Dispute, LedgerEntry, PeriodType, Strike, StrikeType};

#[derive(Debug, Deserialize, ToSchema)]
pub struct RestockRequest {
    /// Signed change to the available quantity.
    pub delta: i32,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RestockResult {
    pub product_id: Uuid,
    pub quantity_available: i32,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DisputeOutcome {
    RefundFull,
    RefundPartial,
    PayoutSeller,
    Split,
    Closed,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ResolveDisputeRequest {
    pub outcome: DisputeOutcome,
    pub refund_amount: Option<i64>,
    pub seller_payout_amount: Option<i64>,
    pub notes: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OverdueDispute {
    pub dispute: Dispute,
    /// Which clock ran out: `SELLER_RESPONSE` or `ADMIN_REVIEW`.
    pub overdue: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OverdueDisputeList {
    pub items: Vec<OverdueDispute>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct IssueStrikeRequest {
    pub user_id: Uuid,
    pub order_id: Option<Uuid>,
    pub strike_type: StrikeType,
    pub description: Option<String>,
    /// Overrides the default strike lifetime. Zero or negative means no expiry.
    pub expires_in_days: Option<i64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StrikeSummary {
    pub user_id: Uuid,
    pub active_strikes: u64,
    pub can_order: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StrikeList {
    pub summary: StrikeSummary,
    pub items: Vec<Strike>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LedgerAdjustmentRequest {
    pub user_id: Uuid,
    /// Positive grants credits, negative removes them.
    pub credits: i64,
    pub co2_saved: Option<f64>,
    pub water_saved: Option<f64>,
    pub reason: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LedgerAdjustmentResult {
    pub entry: LedgerEntry,
    pub new_balance: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BalanceReconciliation {
    pub user_id: Uuid,
    pub cached_balance: i64,
    pub ledger_balance: i64,
    pub cached_co2_saved: f64,
    pub ledger_co2_saved: f64,
    pub cached_water_saved: f64,
    pub ledger_water_saved: f64,
    pub entry_count: i64,
    pub consistent: bool,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateAwardRequest {
    pub user_id: Uuid,
    pub award_type: AwardType,
    pub period_type: Option<PeriodType>,
    pub period_start: Option<DateTime<Utc>>,
    pub period_end: Option<DateTime<Utc>>,
    /// Defaults to the award type's title.
    pub title: Option<String>,
    pub description: Option<String>,
    pub co2_saved: Option<f64>,
    #[serde(default)]
    pub is_featured: bool,
    #[serde(default = "default_public")]
    pub is_public: bool,
}

fn default_public() -> bool {
    true
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AwardWinnersRequest {
    pub period: PeriodType,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PeriodWinners {
    pub period: PeriodType,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    /// False when the podium had already been awarded.
    pub newly_awarded: bool,
    pub awards: Vec<Award>,
}
