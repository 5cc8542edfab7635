use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::{Award, LedgerEntry, PeriodType, RewardType};

#[derive(Debug, Deserialize, ToSchema)]
pub struct LeaderboardQuery {
    pub period: Option<PeriodType>,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize, ToSchema, sqlx::FromRow)]
pub struct LeaderboardEntry {
    pub rank: i64,
    pub user_id: Uuid,
    pub display_name: String,
    pub co2_saved: f64,
    pub water_saved: f64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct Leaderboard {
    pub period: PeriodType,
    pub period_label: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub entries: Vec<LeaderboardEntry>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MyRank {
    pub period: PeriodType,
    /// `None` when the user saved nothing in the window.
    pub rank: Option<i64>,
    pub co2_saved: f64,
    pub water_saved: f64,
    pub participants: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CommunityStats {
    pub total_co2_saved: f64,
    pub total_water_saved: f64,
    pub trees_pledged: i64,
    pub units_rehomed: i64,
    pub active_users: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LedgerHistory {
    pub balance: i64,
    pub items: Vec<LedgerEntry>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct Reward {
    pub reward_type: RewardType,
    pub cost: i64,
    pub description: String,
    pub affordable: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RewardCatalog {
    pub balance: i64,
    pub items: Vec<Reward>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RedeemRequest {
    pub reward_type: RewardType,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RedeemResult {
    pub reward_type: RewardType,
    pub credits_spent: i64,
    pub new_balance: i64,
    pub message: String,
}

/// Public awards for the last closed window of a period.
#[derive(Debug, Serialize, ToSchema)]
pub struct HallOfFame {
    pub period: PeriodType,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub champion: Option<Award>,
    pub runner_up: Option<Award>,
    pub third: Option<Award>,
    pub others: Vec<Award>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AwardList {
    pub items: Vec<Award>,
}
