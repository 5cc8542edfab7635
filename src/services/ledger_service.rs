//! Eco-credit ledger. Entries are append-only and the cached totals on the
//! user row move in the same transaction as every insert.

use chrono::{
    DateTime, Datelike, Duration, FixedOffset, Months, NaiveDate, NaiveTime, Offset, TimeZone, Utc,
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseTransaction, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, TransactionTrait,
};
use sea_orm::sea_query::LockType;
use uuid::Uuid;

use crate::{
    config::SettlementConfig,
    dto::eco::{CommunityStats, Leaderboard, LeaderboardEntry, MyRank},
    entity::{
        eco_ledger_entries::{ActiveModel as LedgerActive, Column as LedgerCol, Entity as Ledger, Model as LedgerModel},
        orders::Model as OrderModel,
        users::{ActiveModel as UserActive, Entity as Users, Model as UserModel},
    },
    error::{AppError, AppResult},
    models::{DeliveryType, ImpactAction, LedgerEntry, PeriodType, RewardType},
    state::AppState,
};

/// One ledger event before the balance is known.
#[derive(Debug, Clone)]
pub struct NewEntry {
    pub user_id: Uuid,
    pub order_id: Option<Uuid>,
    pub action: ImpactAction,
    pub co2_saved: f64,
    pub water_saved: f64,
    pub credits_earned: i64,
    pub credits_spent: i64,
    pub description: Option<String>,
}

impl NewEntry {
    pub fn earn(user_id: Uuid, action: ImpactAction, credits: i64) -> Self {
        Self {
            user_id,
            order_id: None,
            action,
            co2_saved: 0.0,
            water_saved: 0.0,
            credits_earned: credits.max(0),
            credits_spent: 0,
            description: None,
        }
    }

    pub fn spend(user_id: Uuid, action: ImpactAction, credits: i64) -> Self {
        Self {
            credits_earned: 0,
            credits_spent: credits.max(0),
            ..Self::earn(user_id, action, 0)
        }
    }

    pub fn for_order(mut self, order_id: Uuid) -> Self {
        self.order_id = Some(order_id);
        self
    }

    pub fn with_impact(mut self, co2_saved: f64, water_saved: f64) -> Self {
        self.co2_saved = co2_saved;
        self.water_saved = water_saved;
        self
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

pub async fn lock_user(txn: &DatabaseTransaction, user_id: Uuid) -> AppResult<UserModel> {
    Users::find_by_id(user_id)
        .lock(LockType::Update)
        .one(txn)
        .await?
        .ok_or(AppError::NotFound)
}

/// Lock two user rows in id order, so transactions touching the same pair
/// from opposite sides queue instead of deadlocking. Returned as `(a, b)`.
pub async fn lock_user_pair(
    txn: &DatabaseTransaction,
    a: Uuid,
    b: Uuid,
) -> AppResult<(UserModel, UserModel)> {
    if a == b {
        return Err(AppError::SelfPurchase);
    }
    if a < b {
        let first = lock_user(txn, a).await?;
        let second = lock_user(txn, b).await?;
        Ok((first, second))
    } else {
        let first = lock_user(txn, b).await?;
        let second = lock_user(txn, a).await?;
        Ok((second, first))
    }
}

/// Append against a user row already locked by the caller.
pub async fn append_locked(
    txn: &DatabaseTransaction,
    user: UserModel,
    entry: NewEntry,
    now: DateTime<Utc>,
) -> AppResult<(LedgerModel, UserModel)> {
    let new_balance = user.eco_credits + entry.credits_earned - entry.credits_spent;

    let inserted = LedgerActive {
        id: Set(Uuid::new_v4()),
        user_id: Set(user.id),
        order_id: Set(entry.order_id),
        action_type: Set(entry.action),
        co2_saved: Set(entry.co2_saved),
        water_saved: Set(entry.water_saved),
        credits_earned: Set(entry.credits_earned),
        credits_spent: Set(entry.credits_spent),
        resulting_balance: Set(new_balance),
        description: Set(entry.description),
        created_at: Set(now.into()),
    }
    .insert(txn)
    .await?;

    let co2 = user.total_co2_saved + entry.co2_saved;
    let water = user.total_water_saved + entry.water_saved;
    let mut active: UserActive = user.into();
    active.eco_credits = Set(new_balance);
    active.total_co2_saved = Set(co2);
    active.total_water_saved = Set(water);
    active.updated_at = Set(now.into());
    let user = active.update(txn).await?;

    tracing::debug!(
        user_id = %inserted.user_id,
        action = %inserted.action_type,
        balance = new_balance,
        "ledger entry appended"
    );

    Ok((inserted, user))
}

pub async fn append(
    txn: &DatabaseTransaction,
    entry: NewEntry,
    now: DateTime<Utc>,
) -> AppResult<LedgerModel> {
    let user = lock_user(txn, entry.user_id).await?;
    let (inserted, _) = append_locked(txn, user, entry, now).await?;
    Ok(inserted)
}

/// Debit under the user lock, refusing to overdraw.
pub async fn spend(
    txn: &DatabaseTransaction,
    entry: NewEntry,
    now: DateTime<Utc>,
) -> AppResult<(LedgerModel, UserModel)> {
    let user = lock_user(txn, entry.user_id).await?;
    let available = user.eco_credits + entry.credits_earned;
    if entry.credits_spent > available {
        return Err(AppError::InsufficientBalance {
            required: entry.credits_spent,
            balance: user.eco_credits,
        });
    }
    append_locked(txn, user, entry, now).await
}

async fn has_entry(
    txn: &DatabaseTransaction,
    user_id: Uuid,
    action: ImpactAction,
) -> AppResult<bool> {
    let count = Ledger::find()
        .filter(LedgerCol::UserId.eq(user_id))
        .filter(LedgerCol::ActionType.eq(action))
        .count(txn)
        .await?;
    Ok(count > 0)
}

/// Grant the order's frozen impact to both parties. The caller owns the
/// once-only guard (`impact_recorded_at`).
pub async fn grant_order_impact(
    txn: &DatabaseTransaction,
    cfg: &SettlementConfig,
    order: &OrderModel,
    now: DateTime<Utc>,
) -> AppResult<()> {
    let is_gift = order.total_amount == 0;
    let (buyer_action, seller_action) = if is_gift {
        (ImpactAction::GiftReceived, ImpactAction::GiftGiven)
    } else {
        (ImpactAction::Purchase, ImpactAction::Sale)
    };

    let (mut buyer, mut seller) = lock_user_pair(txn, order.buyer_id, order.seller_id).await?;
    let first_purchase = !is_gift && !has_entry(txn, buyer.id, ImpactAction::Purchase).await?;
    let first_sale = !is_gift && !has_entry(txn, seller.id, ImpactAction::Sale).await?;

    buyer = append_locked(
        txn,
        buyer,
        NewEntry::earn(order.buyer_id, buyer_action, order.eco_credits_buyer)
            .for_order(order.id)
            .with_impact(order.co2_saved, order.water_saved)
            .describe(format!("Order {} completed", order.id)),
        now,
    )
    .await?
    .1;
    seller = append_locked(
        txn,
        seller,
        NewEntry::earn(order.seller_id, seller_action, order.eco_credits_seller)
            .for_order(order.id)
            .with_impact(order.co2_saved, order.water_saved)
            .describe(format!("Order {} completed", order.id)),
        now,
    )
    .await?
    .1;

    if first_purchase && cfg.first_purchase_bonus > 0 {
        buyer = append_locked(
            txn,
            buyer,
            NewEntry::earn(order.buyer_id, ImpactAction::FirstPurchase, cfg.first_purchase_bonus)
                .for_order(order.id)
                .describe("First purchase bonus"),
            now,
        )
        .await?
        .1;
    }
    if first_sale && cfg.first_sale_bonus > 0 {
        append_locked(
            txn,
            seller,
            NewEntry::earn(order.seller_id, ImpactAction::FirstSale, cfg.first_sale_bonus)
                .for_order(order.id)
                .describe("First sale bonus"),
            now,
        )
        .await?;
    }
    if order.delivery_type == DeliveryType::Pickup && cfg.pickup_bonus > 0 {
        append_locked(
            txn,
            buyer,
            NewEntry::earn(order.buyer_id, ImpactAction::PickupBonus, cfg.pickup_bonus)
                .for_order(order.id)
                .describe("Collected in person"),
            now,
        )
        .await?;
    }

    tracing::info!(order_id = %order.id, gift = is_gift, "order impact recorded");
    Ok(())
}

pub async fn history(
    state: &AppState,
    user_id: Uuid,
    limit: i64,
    offset: i64,
) -> AppResult<(Vec<LedgerEntry>, i64)> {
    let finder = Ledger::find()
        .filter(LedgerCol::UserId.eq(user_id))
        .order_by_desc(LedgerCol::CreatedAt)
        .order_by_desc(LedgerCol::Id);

    let total = finder.clone().count(&state.orm).await? as i64;
    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(LedgerEntry::from)
        .collect();

    Ok((items, total))
}

pub async fn redeem(
    state: &AppState,
    user_id: Uuid,
    reward: RewardType,
) -> AppResult<(LedgerModel, UserModel)> {
    let now = Utc::now();
    let txn = state.orm.begin().await?;
    let result = spend(
        &txn,
        NewEntry::spend(user_id, reward.action(), reward.cost())
            .describe(format!("Redeemed {}", reward.code())),
        now,
    )
    .await?;
    txn.commit().await?;
    Ok(result)
}

fn local_midnight_utc(date: NaiveDate, offset: FixedOffset) -> DateTime<Utc> {
    let naive = date.and_time(NaiveTime::MIN)
        - Duration::seconds(i64::from(offset.local_minus_utc()));
    Utc.from_utc_datetime(&naive)
}

/// Half-open `[start, end)` window for a leaderboard period, with calendar
/// boundaries taken in `offset`.
pub fn period_window(
    period: PeriodType,
    now: DateTime<Utc>,
    offset: FixedOffset,
) -> (DateTime<Utc>, DateTime<Utc>) {
    let today = now.with_timezone(&offset).date_naive();
    let (start, end) = match period {
        PeriodType::Weekly => {
            let monday = today - Duration::days(i64::from(today.weekday().num_days_from_monday()));
            (monday, monday + Duration::days(7))
        }
        PeriodType::Monthly => {
            let first = today - Duration::days(i64::from(today.day0()));
            (first, first.checked_add_months(Months::new(1)).unwrap_or(NaiveDate::MAX))
        }
        PeriodType::Yearly => {
            let first = today - Duration::days(i64::from(today.ordinal0()));
            (first, first.checked_add_months(Months::new(12)).unwrap_or(NaiveDate::MAX))
        }
        PeriodType::AllTime => {
            return (DateTime::<Utc>::UNIX_EPOCH, now + Duration::days(36_525));
        }
    };
    (local_midnight_utc(start, offset), local_midnight_utc(end, offset))
}

/// The last window of `period` that has fully ended before `now`. All-time
/// never closes.
pub fn previous_window(
    period: PeriodType,
    now: DateTime<Utc>,
    offset: FixedOffset,
) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    if period == PeriodType::AllTime {
        return None;
    }
    let (current_start, _) = period_window(period, now, offset);
    Some(period_window(period, current_start - Duration::seconds(1), offset))
}

pub fn leaderboard_offset(cfg: &SettlementConfig) -> FixedOffset {
    FixedOffset::east_opt(cfg.leaderboard_utc_offset_minutes * 60)
        .unwrap_or_else(|| Utc.fix())
}

const RANKING_CTE: &str = r#"
    WITH ranked AS (
        SELECT
            u.id AS user_id,
            u.display_name,
            SUM(e.co2_saved) AS co2_saved,
            SUM(e.water_saved) AS water_saved,
            ROW_NUMBER() OVER (ORDER BY SUM(e.co2_saved) DESC, u.id ASC) AS rank
        FROM eco_ledger_entries e
        JOIN users u ON u.id = e.user_id
        WHERE e.created_at >= $1 AND e.created_at < $2 AND u.is_active
        GROUP BY u.id, u.display_name
        HAVING SUM(e.co2_saved) > 0
    )
"#;

/// Top savers in `[starts_at, ends_at)`, best first.
pub async fn ranking(
    state: &AppState,
    starts_at: DateTime<Utc>,
    ends_at: DateTime<Utc>,
    limit: i64,
) -> AppResult<Vec<LeaderboardEntry>> {
    let sql = format!(
        "{RANKING_CTE} SELECT rank, user_id, display_name, co2_saved, water_saved FROM ranked ORDER BY rank LIMIT $3"
    );
    let entries = sqlx::query_as::<_, LeaderboardEntry>(&sql)
        .bind(starts_at)
        .bind(ends_at)
        .bind(limit)
        .fetch_all(&state.pool)
        .await?;
    Ok(entries)
}

pub async fn leaderboard(
    state: &AppState,
    period: PeriodType,
    limit: i64,
) -> AppResult<Leaderboard> {
    let offset = leaderboard_offset(&state.config.settlement);
    let (starts_at, ends_at) = period_window(period, Utc::now(), offset);
    let entries = ranking(state, starts_at, ends_at, limit).await?;

    Ok(Leaderboard {
        period,
        period_label: period.display_name().to_string(),
        starts_at,
        ends_at,
        entries,
    })
}

pub async fn my_rank(state: &AppState, user_id: Uuid, period: PeriodType) -> AppResult<MyRank> {
    let offset = leaderboard_offset(&state.config.settlement);
    let (starts_at, ends_at) = period_window(period, Utc::now(), offset);

    let sql = format!(
        "{RANKING_CTE} SELECT rank, user_id, display_name, co2_saved, water_saved FROM ranked WHERE user_id = $3"
    );
    let mine = sqlx::query_as::<_, LeaderboardEntry>(&sql)
        .bind(starts_at)
        .bind(ends_at)
        .bind(user_id)
        .fetch_optional(&state.pool)
        .await?;

    let count_sql = format!("{RANKING_CTE} SELECT COUNT(*) FROM ranked");
    let (participants,): (i64,) = sqlx::query_as(&count_sql)
        .bind(starts_at)
        .bind(ends_at)
        .fetch_one(&state.pool)
        .await?;

    Ok(MyRank {
        period,
        rank: mine.as_ref().map(|m| m.rank),
        co2_saved: mine.as_ref().map_or(0.0, |m| m.co2_saved),
        water_saved: mine.as_ref().map_or(0.0, |m| m.water_saved),
        participants,
    })
}

pub async fn community_stats(state: &AppState) -> AppResult<CommunityStats> {
    let (total_co2_saved, total_water_saved, active_users): (f64, f64, i64) = sqlx::query_as(
        r#"
        SELECT
            COALESCE(SUM(total_co2_saved), 0)::DOUBLE PRECISION,
            COALESCE(SUM(total_water_saved), 0)::DOUBLE PRECISION,
            COUNT(*)
        FROM users
        WHERE is_active
        "#,
    )
    .fetch_one(&state.pool)
    .await?;

    let (trees_pledged,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM eco_ledger_entries WHERE action_type = $1")
            .bind(ImpactAction::RedeemTree.to_string())
            .fetch_one(&state.pool)
            .await?;

    let (units_rehomed,): (i64,) = sqlx::query_as(
        "SELECT COALESCE(SUM(quantity), 0)::BIGINT FROM orders WHERE status = 'COMPLETED'",
    )
    .fetch_one(&state.pool)
    .await?;

    Ok(CommunityStats {
        total_co2_saved,
        total_water_saved,
        trees_pledged,
        units_rehomed,
        active_users,
    })
}

/// Sums of a user's ledger entries. The cached totals on the user row must
/// always equal these.
#[derive(Debug, Clone, Copy, PartialEq, sqlx::FromRow)]
pub struct LedgerTotals {
    pub credits: i64,
    pub co2_saved: f64,
    pub water_saved: f64,
    pub entry_count: i64,
}

impl LedgerTotals {
    pub fn matches(&self, user: &UserModel) -> bool {
        self.credits == user.eco_credits
            && (self.co2_saved - user.total_co2_saved).abs() < IMPACT_TOLERANCE
            && (self.water_saved - user.total_water_saved).abs() < IMPACT_TOLERANCE
    }
}

const IMPACT_TOLERANCE: f64 = 1e-6;

pub async fn ledger_totals(state: &AppState, user_id: Uuid) -> AppResult<LedgerTotals> {
    let totals = sqlx::query_as::<_, LedgerTotals>(
        r#"
        SELECT
            COALESCE(SUM(credits_earned - credits_spent), 0)::BIGINT AS credits,
            COALESCE(SUM(co2_saved), 0)::DOUBLE PRECISION AS co2_saved,
            COALESCE(SUM(water_saved), 0)::DOUBLE PRECISION AS water_saved,
            COUNT(*) AS entry_count
        FROM eco_ledger_entries
        WHERE user_id = $1
        "#,
    )
    .bind(user_id)
    .fetch_one(&state.pool)
    .await?;
    Ok(totals)
}
