mod common;

use chrono::{DateTime, Duration, TimeZone, Utc};
use eco_marketplace_api::{
    dto::admin::CreateAwardRequest,
    error::AppError,
    middleware::auth::AuthUser,
    models::{AwardType, ImpactAction, PeriodType},
    routes::params::PeriodQuery,
    services::{
        admin_service, award_service, eco_service,
        ledger_service::{self, NewEntry},
    },
    state::AppState,
};
use sea_orm::TransactionTrait;
use uuid::Uuid;

/// A one-hour window somewhere in the past that no other run will touch.
fn isolated_window() -> (DateTime<Utc>, DateTime<Utc>) {
    let base = Utc.with_ymd_and_hms(1985, 1, 1, 0, 0, 0).unwrap();
    let offset = (Uuid::new_v4().as_u128() % 900_000_000) as i64;
    let start = base + Duration::seconds(offset);
    (start, start + Duration::hours(1))
}

async fn save(state: &AppState, user: &AuthUser, co2: f64, at: DateTime<Utc>) -> anyhow::Result<()> {
    let txn = state.orm.begin().await?;
    ledger_service::append(
        &txn,
        NewEntry::earn(user.user_id, ImpactAction::Purchase, 10).with_impact(co2, 100.0),
        at,
    )
    .await?;
    txn.commit().await?;
    Ok(())
}

fn manual_award(user_id: Uuid, award_type: AwardType) -> CreateAwardRequest {
    CreateAwardRequest {
        user_id,
        award_type,
        period_type: None,
        period_start: None,
        period_end: None,
        title: None,
        description: None,
        co2_saved: None,
        is_featured: false,
        is_public: true,
    }
}

#[tokio::test]
async fn closed_window_podium_is_awarded_once_and_shown() -> anyhow::Result<()> {
    let Some(ctx) = common::setup().await? else {
        return Ok(());
    };
    let state = ctx.state.clone();
    let admin = common::create_admin(&state).await?;
    let (start, end) = isolated_window();
    let during = start + Duration::minutes(10);

    let mut savers = Vec::new();
    for co2 in [5.0, 3.0, 1.0, 0.5] {
        let user = common::create_user(&state, "user").await?;
        save(&state, &user, co2, during).await?;
        savers.push(user);
    }
    // Saved after the window closed, so it does not count.
    save(&state, &savers[3], 50.0, end + Duration::minutes(1)).await?;

    let (granted, podium) =
        award_service::award_window_winners(&state, PeriodType::Weekly, start, end, Some(admin.user_id))
            .await?;
    assert!(granted);
    let holders: Vec<_> = podium.iter().map(|a| (a.award_type, a.user_id)).collect();
    assert_eq!(
        holders,
        vec![
            (AwardType::EcoChampion, savers[0].user_id),
            (AwardType::EcoRunnerUp, savers[1].user_id),
            (AwardType::EcoThird, savers[2].user_id),
        ]
    );
    assert!(podium[0].display_name.is_some());
    assert!((podium[0].co2_saved - 5.0).abs() < 1e-9);

    let (granted_again, same) =
        award_service::award_window_winners(&state, PeriodType::Weekly, start, end, None).await?;
    assert!(!granted_again);
    let ids: Vec<_> = same.iter().map(|a| a.id).collect();
    assert_eq!(ids, podium.iter().map(|a| a.id).collect::<Vec<_>>());

    let duplicate = CreateAwardRequest {
        period_type: Some(PeriodType::Weekly),
        period_start: Some(start),
        period_end: Some(end),
        ..manual_award(savers[3].user_id, AwardType::EcoChampion)
    };
    let err = admin_service::create_award(&state, &admin, duplicate)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::AwardAlreadyGranted));

    let private = CreateAwardRequest {
        period_start: Some(start),
        period_end: Some(end),
        is_public: false,
        ..manual_award(savers[3].user_id, AwardType::Milestone)
    };
    admin_service::create_award(&state, &admin, private).await?;

    let hall = award_service::hall_of_fame_for(&state, PeriodType::Weekly, start, end).await?;
    assert_eq!(hall.champion.map(|a| a.user_id), Some(savers[0].user_id));
    assert_eq!(hall.runner_up.map(|a| a.user_id), Some(savers[1].user_id));
    assert_eq!(hall.third.map(|a| a.user_id), Some(savers[2].user_id));
    assert!(hall.others.is_empty());

    let mine = eco_service::my_awards(&state, &savers[3])
        .await?
        .data
        .expect("awards");
    assert_eq!(mine.items.len(), 1);
    assert_eq!(mine.items[0].award_type, AwardType::Milestone);
    assert!(!mine.items[0].is_public);
    Ok(())
}

#[tokio::test]
async fn award_creation_is_admin_only_and_validated() -> anyhow::Result<()> {
    let Some(ctx) = common::setup().await? else {
        return Ok(());
    };
    let state = ctx.state.clone();
    let admin = common::create_admin(&state).await?;
    let user = common::create_user(&state, "user").await?;

    let err = admin_service::create_award(&state, &user, manual_award(user.user_id, AwardType::EcoLegend))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden));

    let err = admin_service::create_award(&state, &admin, manual_award(Uuid::new_v4(), AwardType::EcoLegend))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound));

    let (start, end) = isolated_window();
    let backwards = CreateAwardRequest {
        period_start: Some(end),
        period_end: Some(start),
        ..manual_award(user.user_id, AwardType::EcoLegend)
    };
    let err = admin_service::create_award(&state, &admin, backwards)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    let legend = admin_service::create_award(&state, &admin, manual_award(user.user_id, AwardType::EcoLegend))
        .await?
        .data
        .expect("award");
    assert_eq!(legend.title, "Eco Legend");

    let err = eco_service::hall_of_fame(
        &state,
        PeriodQuery {
            period: Some(PeriodType::AllTime),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));
    Ok(())
}
