#![allow(dead_code)]

use std::sync::{
    Arc, Mutex,
    atomic::{AtomicBool, Ordering},
};

use async_trait::async_trait;
use chrono::Utc;
use eco_marketplace_api::{
    config::{AppConfig, SettlementConfig},
    db::{create_pool, orm_from_pool, run_migrations},
    entity::{products::ActiveModel as ProductActive, users::ActiveModel as UserActive},
    middleware::auth::{ADMIN_ROLE, AuthUser},
    services::{
        gateway::{CheckoutSession, CheckoutSessionRequest, PaymentGateway, sign_payload},
        notification::{NotificationJob, NotificationQueue},
    },
    state::AppState,
};
use sea_orm::{ActiveModelTrait, Set};
use tokio::sync::mpsc;
use uuid::Uuid;

pub const WEBHOOK_SECRET: &str = "whsec_integration";

static MIGRATED: tokio::sync::Mutex<bool> = tokio::sync::Mutex::const_new(false);

/// Records every checkout request and hands out predictable sessions.
#[derive(Default)]
pub struct FakeGateway {
    pub requests: Mutex<Vec<CheckoutSessionRequest>>,
    pub fail: AtomicBool,
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn create_checkout_session(
        &self,
        request: &CheckoutSessionRequest,
    ) -> anyhow::Result<CheckoutSession> {
        if self.fail.load(Ordering::SeqCst) {
            anyhow::bail!("gateway offline");
        }
        self.requests.lock().unwrap().push(request.clone());
        let id = format!("cs_test_{}", Uuid::new_v4().simple());
        Ok(CheckoutSession {
            url: format!("https://checkout.test/{id}"),
            id,
        })
    }
}

pub struct TestContext {
    pub state: AppState,
    pub gateway: Arc<FakeGateway>,
    pub notifications: mpsc::Receiver<NotificationJob>,
}

impl TestContext {
    pub fn drain_notifications(&mut self) -> Vec<NotificationJob> {
        let mut jobs = Vec::new();
        while let Ok(job) = self.notifications.try_recv() {
            jobs.push(job);
        }
        jobs
    }
}

fn database_url() -> Option<String> {
    std::env::var("TEST_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .ok()
}

fn test_config(database_url: String) -> AppConfig {
    AppConfig {
        database_url,
        host: "127.0.0.1".into(),
        port: 0,
        max_connections: 8,
        jwt_secret: "integration-secret".into(),
        frontend_url: "http://frontend.test".into(),
        stripe_secret_key: "sk_test".into(),
        stripe_api_base: "http://stripe.invalid".into(),
        stripe_webhook_secret: WEBHOOK_SECRET.into(),
        notify_webhook_url: None,
        settlement: SettlementConfig::default(),
    }
}

/// `None` when no database is configured; callers return early.
pub async fn setup() -> anyhow::Result<Option<TestContext>> {
    let Some(url) = database_url() else {
        eprintln!("Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run integration tests.");
        return Ok(None);
    };

    let config = test_config(url);
    let pool = create_pool(&config.database_url, config.max_connections).await?;
    let orm = orm_from_pool(&pool);
    {
        let mut migrated = MIGRATED.lock().await;
        if !*migrated {
            run_migrations(&orm).await?;
            *migrated = true;
        }
    }

    let gateway = Arc::new(FakeGateway::default());
    let (queue, rx) = NotificationQueue::channel(64);
    let state = AppState::new(pool, orm, config, gateway.clone(), queue);
    Ok(Some(TestContext {
        state,
        gateway,
        notifications: rx,
    }))
}

pub async fn create_user(state: &AppState, role: &str) -> anyhow::Result<AuthUser> {
    let id = Uuid::new_v4();
    let now = Utc::now();
    UserActive {
        id: Set(id),
        email: Set(format!("{id}@example.test")),
        display_name: Set(format!("user-{}", &id.simple().to_string()[..8])),
        role: Set(role.to_string()),
        is_active: Set(true),
        eco_credits: Set(0),
        total_co2_saved: Set(0.0),
        total_water_saved: Set(0.0),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    }
    .insert(&state.orm)
    .await?;

    Ok(AuthUser {
        user_id: id,
        role: role.to_string(),
        is_active: true,
    })
}

pub async fn create_admin(state: &AppState) -> anyhow::Result<AuthUser> {
    create_user(state, ADMIN_ROLE).await
}

pub async fn create_listing(
    state: &AppState,
    seller: &AuthUser,
    price: i64,
    quantity: i32,
) -> anyhow::Result<eco_marketplace_api::entity::products::Model> {
    let id = Uuid::new_v4();
    let now = Utc::now();
    let listing = ProductActive {
        id: Set(id),
        seller_id: Set(seller.user_id),
        title: Set(format!("listing {id}")),
        description: Set(None),
        price: Set(price),
        quantity_available: Set(quantity),
        shipping_cost: Set(0),
        pickup_location_id: Set(None),
        pickup_address: Set(Some("Market Square 1".into())),
        pickup_instructions: Set(Some("Ring twice".into())),
        is_dutch_auction: Set(false),
        dutch_start_price: Set(None),
        dutch_decrease_amount: Set(None),
        dutch_decrease_hours: Set(None),
        dutch_min_price: Set(None),
        dutch_started_at: Set(None),
        co2_per_unit_kg: Set(None),
        water_per_unit_l: Set(None),
        is_active: Set(true),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    }
    .insert(&state.orm)
    .await?;
    Ok(listing)
}

/// Signed `checkout.session.completed` body and header for an order.
pub fn completed_event(order_id: Uuid, session_id: &str) -> (Vec<u8>, String) {
    signed_event("checkout.session.completed", order_id, session_id)
}

pub fn signed_event(event_type: &str, order_id: Uuid, session_id: &str) -> (Vec<u8>, String) {
    let body = serde_json::json!({
        "id": format!("evt_{}", Uuid::new_v4().simple()),
        "type": event_type,
        "data": {
            "object": {
                "id": session_id,
                "payment_intent": format!("pi_{}", Uuid::new_v4().simple()),
                "metadata": { "order_id": order_id.to_string() },
            }
        }
    });
    let payload = serde_json::to_vec(&body).unwrap();
    let header = sign_payload(&payload, WEBHOOK_SECRET, Utc::now().timestamp()).unwrap();
    (payload, header)
}
