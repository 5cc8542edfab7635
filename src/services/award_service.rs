//! Period awards and the Hall of Fame. Podium awards are derived from the
//! leaderboard of a closed window; other awards are granted by admins.

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set,
    SqlErr, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    dto::eco::HallOfFame,
    entity::{
        awards::{ActiveModel as AwardActive, Column as AwardCol, Entity as Awards, Model as AwardModel},
        users::{Entity as Users, Model as UserModel},
    },
    error::{AppError, AppResult},
    models::{Award, AwardType, PeriodType},
    services::ledger_service,
    state::AppState,
};

#[derive(Debug, Clone)]
pub struct NewAward {
    pub user_id: Uuid,
    pub award_type: AwardType,
    pub period_type: Option<PeriodType>,
    pub period_start: Option<DateTime<Utc>>,
    pub period_end: Option<DateTime<Utc>>,
    pub title: String,
    pub description: Option<String>,
    pub co2_saved: f64,
    pub is_featured: bool,
    pub is_public: bool,
    pub awarded_by: Option<Uuid>,
}

pub async fn insert_award<C: ConnectionTrait>(
    conn: &C,
    award: NewAward,
    now: DateTime<Utc>,
) -> AppResult<AwardModel> {
    if award.title.trim().is_empty() {
        return Err(AppError::BadRequest("title is required".into()));
    }
    match (award.period_start, award.period_end) {
        (Some(start), Some(end)) if start >= end => {
            return Err(AppError::BadRequest("period_start must be before period_end".into()));
        }
        (Some(_), None) | (None, Some(_)) => {
            return Err(AppError::BadRequest(
                "period_start and period_end go together".into(),
            ));
        }
        _ => {}
    }

    AwardActive {
        id: Set(Uuid::new_v4()),
        user_id: Set(award.user_id),
        award_type: Set(award.award_type),
        period_type: Set(award.period_type),
        period_start: Set(award.period_start.map(Into::into)),
        period_end: Set(award.period_end.map(Into::into)),
        title: Set(award.title.trim().to_string()),
        description: Set(award.description.filter(|d| !d.trim().is_empty())),
        co2_saved: Set(award.co2_saved),
        is_featured: Set(award.is_featured),
        is_public: Set(award.is_public),
        awarded_by: Set(award.awarded_by),
        created_at: Set(now.into()),
    }
    .insert(conn)
    .await
    .map_err(|err| match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => AppError::AwardAlreadyGranted,
        _ => AppError::from(err),
    })
}

fn with_holder((award, user): (AwardModel, Option<UserModel>)) -> Award {
    let mut view = Award::from(award);
    view.display_name = user.map(|u| u.display_name);
    view
}

fn window_noun(period: PeriodType) -> &'static str {
    match period {
        PeriodType::Weekly => "week",
        PeriodType::Monthly => "month",
        PeriodType::Yearly => "year",
        PeriodType::AllTime => "all time",
    }
}

fn closed_window(state: &AppState, period: PeriodType) -> AppResult<(DateTime<Utc>, DateTime<Utc>)> {
    let offset = ledger_service::leaderboard_offset(&state.config.settlement);
    ledger_service::previous_window(period, Utc::now(), offset)
        .ok_or_else(|| AppError::BadRequest("the all-time period never closes".into()))
}

async fn podium_for(
    state: &AppState,
    period: PeriodType,
    starts_at: DateTime<Utc>,
) -> AppResult<Vec<Award>> {
    let rows = Awards::find()
        .find_also_related(Users)
        .filter(AwardCol::AwardType.is_in(AwardType::PODIUM))
        .filter(AwardCol::PeriodType.eq(period))
        .filter(AwardCol::PeriodStart.eq(starts_at))
        .order_by_asc(AwardCol::AwardType)
        .all(&state.orm)
        .await?;
    Ok(rows.into_iter().map(with_holder).collect())
}

/// Grant the podium of the last closed window of `period`. Running it again
/// for the same window returns the existing awards.
pub async fn award_period_winners(
    state: &AppState,
    period: PeriodType,
    awarded_by: Option<Uuid>,
) -> AppResult<(DateTime<Utc>, DateTime<Utc>, bool, Vec<Award>)> {
    let (starts_at, ends_at) = closed_window(state, period)?;
    let (newly_awarded, awards) =
        award_window_winners(state, period, starts_at, ends_at, awarded_by).await?;
    Ok((starts_at, ends_at, newly_awarded, awards))
}

/// Podium for an explicit `[starts_at, ends_at)` window. Returns whether
/// anything was granted along with the podium.
pub async fn award_window_winners(
    state: &AppState,
    period: PeriodType,
    starts_at: DateTime<Utc>,
    ends_at: DateTime<Utc>,
    awarded_by: Option<Uuid>,
) -> AppResult<(bool, Vec<Award>)> {
    let existing = podium_for(state, period, starts_at).await?;
    if !existing.is_empty() {
        return Ok((false, existing));
    }

    let podium_size = AwardType::PODIUM.len() as i64;
    let winners = ledger_service::ranking(state, starts_at, ends_at, podium_size).await?;
    let now = Utc::now();
    let txn = state.orm.begin().await?;
    for entry in &winners {
        let Some(award_type) = AwardType::for_rank(entry.rank) else {
            continue;
        };
        insert_award(
            &txn,
            NewAward {
                user_id: entry.user_id,
                award_type,
                period_type: Some(period),
                period_start: Some(starts_at),
                period_end: Some(ends_at),
                title: format!(
                    "{} of the {} starting {}",
                    award_type.title(),
                    window_noun(period),
                    starts_at.format("%Y-%m-%d")
                ),
                description: None,
                co2_saved: entry.co2_saved,
                is_featured: award_type == AwardType::EcoChampion,
                is_public: true,
                awarded_by,
            },
            now,
        )
        .await?;
    }
    txn.commit().await?;

    tracing::info!(
        period = %period,
        starts_at = %starts_at,
        winners = winners.len(),
        "period winners awarded"
    );
    let awards = podium_for(state, period, starts_at).await?;
    Ok((!awards.is_empty(), awards))
}

/// Slot podium awards by type, everything else keeps its order.
pub fn arrange_hall_of_fame(
    period: PeriodType,
    starts_at: DateTime<Utc>,
    ends_at: DateTime<Utc>,
    awards: Vec<Award>,
) -> HallOfFame {
    let mut hall = HallOfFame {
        period,
        starts_at,
        ends_at,
        champion: None,
        runner_up: None,
        third: None,
        others: Vec::new(),
    };
    for award in awards {
        let slot = match award.award_type {
            AwardType::EcoChampion => &mut hall.champion,
            AwardType::EcoRunnerUp => &mut hall.runner_up,
            AwardType::EcoThird => &mut hall.third,
            _ => {
                hall.others.push(award);
                continue;
            }
        };
        if slot.is_none() {
            *slot = Some(award);
        } else {
            hall.others.push(award);
        }
    }
    hall
}

pub async fn hall_of_fame(state: &AppState, period: PeriodType) -> AppResult<HallOfFame> {
    let (starts_at, ends_at) = closed_window(state, period)?;
    hall_of_fame_for(state, period, starts_at, ends_at).await
}

/// Public awards whose own window lies inside `[starts_at, ends_at)`.
pub async fn hall_of_fame_for(
    state: &AppState,
    period: PeriodType,
    starts_at: DateTime<Utc>,
    ends_at: DateTime<Utc>,
) -> AppResult<HallOfFame> {
    let rows = Awards::find()
        .find_also_related(Users)
        .filter(AwardCol::IsPublic.eq(true))
        .filter(AwardCol::PeriodStart.gte(starts_at))
        .filter(AwardCol::PeriodEnd.lte(ends_at))
        .order_by_desc(AwardCol::IsFeatured)
        .order_by_desc(AwardCol::CreatedAt)
        .all(&state.orm)
        .await?;
    let awards = rows.into_iter().map(with_holder).collect();
    Ok(arrange_hall_of_fame(period, starts_at, ends_at, awards))
}

pub async fn user_awards(state: &AppState, user_id: Uuid) -> AppResult<Vec<Award>> {
    let rows = Awards::find()
        .filter(AwardCol::UserId.eq(user_id))
        .order_by_desc(AwardCol::CreatedAt)
        .all(&state.orm)
        .await?;
    Ok(rows.into_iter().map(Award::from).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn award(award_type: AwardType) -> Award {
        Award {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            display_name: None,
            award_type,
            period_type: Some(PeriodType::Monthly),
            period_start: None,
            period_end: None,
            title: award_type.title().to_string(),
            description: None,
            co2_saved: 0.0,
            is_featured: false,
            is_public: true,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn podium_ranks_map_to_award_types() {
        assert_eq!(AwardType::for_rank(1), Some(AwardType::EcoChampion));
        assert_eq!(AwardType::for_rank(3), Some(AwardType::EcoThird));
        assert_eq!(AwardType::for_rank(4), None);
        assert_eq!(AwardType::for_rank(0), None);
    }

    #[test]
    fn hall_of_fame_fills_podium_slots() {
        let start = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let hall = arrange_hall_of_fame(
            PeriodType::Monthly,
            start,
            end,
            vec![
                award(AwardType::Milestone),
                award(AwardType::EcoThird),
                award(AwardType::EcoChampion),
                award(AwardType::EcoChampion),
            ],
        );
        assert_eq!(hall.champion.map(|a| a.award_type), Some(AwardType::EcoChampion));
        assert!(hall.runner_up.is_none());
        assert_eq!(hall.third.map(|a| a.award_type), Some(AwardType::EcoThird));
        let others: Vec<_> = hall.others.iter().map(|a| a.award_type).collect();
        assert_eq!(others, vec![AwardType::Milestone, AwardType::EcoChampion]);
    }
}
