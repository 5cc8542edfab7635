mod common;

use chrono::Utc;
use eco_marketplace_api::{
    dto::{admin::LedgerAdjustmentRequest, eco::RedeemRequest},
    entity::users::{ActiveModel as UserActive, Entity as Users},
    error::AppError,
    models::{ImpactAction, PeriodType, RewardType},
    routes::params::{Pagination, PeriodQuery},
    services::{
        admin_service, eco_service,
        ledger_service::{self, NewEntry},
    },
};
use sea_orm::{ActiveModelTrait, EntityTrait, Set, TransactionTrait};

#[tokio::test]
async fn concurrent_appends_keep_balance_consistent() -> anyhow::Result<()> {
    let Some(ctx) = common::setup().await? else {
        return Ok(());
    };
    let state = ctx.state.clone();
    let user = common::create_user(&state, "user").await?;

    let mut handles = Vec::new();
    for _ in 0..8 {
        let state = state.clone();
        let user_id = user.user_id;
        handles.push(tokio::spawn(async move {
            let txn = state.orm.begin().await?;
            ledger_service::append(
                &txn,
                NewEntry::earn(user_id, ImpactAction::ReviewBonus, 5).with_impact(0.5, 10.0),
                Utc::now(),
            )
            .await?;
            txn.commit().await?;
            Ok::<_, AppError>(())
        }));
    }
    for handle in handles {
        handle.await??;
    }

    let row = Users::find_by_id(user.user_id).one(&state.orm).await?.expect("user");
    assert_eq!(row.eco_credits, 40);
    assert!((row.total_co2_saved - 4.0).abs() < 1e-9);
    let totals = ledger_service::ledger_totals(&state, user.user_id).await?;
    assert_eq!((totals.credits, totals.entry_count), (40, 8));
    assert!(totals.matches(&row));

    let history = eco_service::history(&state, &user, Pagination::default())
        .await?
        .data
        .expect("history");
    assert_eq!(history.balance, 40);
    assert_eq!(history.items.len(), 8);
    let mut balances: Vec<i64> = history.items.iter().map(|e| e.resulting_balance).collect();
    balances.sort_unstable();
    assert_eq!(balances, vec![5, 10, 15, 20, 25, 30, 35, 40]);
    Ok(())
}

#[tokio::test]
async fn redemption_refuses_to_overdraw() -> anyhow::Result<()> {
    let Some(ctx) = common::setup().await? else {
        return Ok(());
    };
    let state = ctx.state.clone();
    let user = common::create_user(&state, "user").await?;
    let admin = common::create_admin(&state).await?;

    admin_service::adjust_ledger(
        &state,
        &admin,
        LedgerAdjustmentRequest {
            user_id: user.user_id,
            credits: 120,
            co2_saved: None,
            water_saved: None,
            reason: "Welcome gift".into(),
        },
    )
    .await?;

    let err = eco_service::redeem(
        &state,
        &user,
        RedeemRequest {
            reward_type: RewardType::Tree,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(
        err,
        AppError::InsufficientBalance {
            required: 300,
            balance: 120
        }
    ));

    let redeemed = eco_service::redeem(
        &state,
        &user,
        RedeemRequest {
            reward_type: RewardType::Boost24h,
        },
    )
    .await?
    .data
    .expect("redeem result");
    assert_eq!(redeemed.credits_spent, 100);
    assert_eq!(redeemed.new_balance, 20);

    let catalog = eco_service::rewards(&state, &user)
        .await?
        .data
        .expect("catalog");
    assert_eq!(catalog.balance, 20);
    assert!(catalog.items.iter().all(|r| !r.affordable));
    Ok(())
}

#[tokio::test]
async fn admin_debit_and_reconciliation() -> anyhow::Result<()> {
    let Some(ctx) = common::setup().await? else {
        return Ok(());
    };
    let state = ctx.state.clone();
    let user = common::create_user(&state, "user").await?;
    let admin = common::create_admin(&state).await?;

    let adjust = |credits: i64| LedgerAdjustmentRequest {
        user_id: user.user_id,
        credits,
        co2_saved: Some(1.5),
        water_saved: None,
        reason: "Manual correction".into(),
    };

    let err = admin_service::adjust_ledger(&state, &user, adjust(10))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden));

    admin_service::adjust_ledger(&state, &admin, adjust(50)).await?;
    let debit = admin_service::adjust_ledger(&state, &admin, adjust(-30))
        .await?
        .data
        .expect("adjustment");
    assert_eq!(debit.entry.credits_spent, 30);
    assert_eq!(debit.new_balance, 20);

    let err = admin_service::adjust_ledger(&state, &admin, adjust(-500))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InsufficientBalance { .. }));

    let report = admin_service::reconcile_balance(&state, &admin, user.user_id)
        .await?
        .data
        .expect("reconciliation");
    assert!(report.consistent);
    assert_eq!(report.ledger_balance, 20);
    assert!((report.ledger_co2_saved - 3.0).abs() < 1e-9);
    assert_eq!(report.entry_count, 2);

    // Credits still agree, but the cached CO2 no longer matches the ledger.
    let row = Users::find_by_id(user.user_id).one(&state.orm).await?.expect("user");
    let mut active: UserActive = row.into();
    active.total_co2_saved = Set(10.0);
    active.update(&state.orm).await?;

    let report = admin_service::reconcile_balance(&state, &admin, user.user_id)
        .await?
        .data
        .expect("reconciliation");
    assert_eq!(report.cached_balance, report.ledger_balance);
    assert!(!report.consistent);
    Ok(())
}

#[tokio::test]
async fn savers_appear_in_current_rankings() -> anyhow::Result<()> {
    let Some(ctx) = common::setup().await? else {
        return Ok(());
    };
    let state = ctx.state.clone();
    let user = common::create_user(&state, "user").await?;

    let txn = state.orm.begin().await?;
    ledger_service::append(
        &txn,
        NewEntry::earn(user.user_id, ImpactAction::Purchase, 10).with_impact(3.0, 50.0),
        Utc::now(),
    )
    .await?;
    txn.commit().await?;

    let rank = eco_service::my_rank(
        &state,
        &user,
        PeriodQuery {
            period: Some(PeriodType::Weekly),
        },
    )
    .await?
    .data
    .expect("rank");
    assert!(rank.rank.is_some());
    assert!((rank.co2_saved - 3.0).abs() < 1e-9);
    assert!(rank.participants >= 1);
    Ok(())
}
