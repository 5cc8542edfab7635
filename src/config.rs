use std::{env, str::FromStr};

use chrono::Duration;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub max_connections: u32,
    pub jwt_secret: String,
    pub frontend_url: String,
    pub stripe_secret_key: String,
    pub stripe_api_base: String,
    pub stripe_webhook_secret: String,
    pub notify_webhook_url: Option<String>,
    pub settlement: SettlementConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL")?;
        let jwt_secret = env::var("JWT_SECRET")?;
        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env_or("APP_PORT", 3000);
        let max_connections = env_or("DB_MAX_CONNECTIONS", 10);
        let frontend_url = env::var("FRONTEND_URL")
            .unwrap_or_else(|_| "http://localhost:5173".to_string())
            .trim_end_matches('/')
            .to_string();
        let stripe_secret_key = env::var("STRIPE_SECRET_KEY").unwrap_or_default();
        let stripe_api_base = env::var("STRIPE_API_BASE")
            .unwrap_or_else(|_| "https://api.stripe.com".to_string());
        let stripe_webhook_secret = env::var("STRIPE_WEBHOOK_SECRET").unwrap_or_default();
        if stripe_webhook_secret.is_empty() {
            tracing::warn!("STRIPE_WEBHOOK_SECRET is empty, every payment webhook will be rejected");
        }
        let notify_webhook_url = env::var("NOTIFY_WEBHOOK_URL")
            .ok()
            .filter(|url| !url.is_empty());

        Ok(Self {
            port,
            database_url,
            host,
            max_connections,
            jwt_secret,
            frontend_url,
            stripe_secret_key,
            stripe_api_base,
            stripe_webhook_secret,
            notify_webhook_url,
            settlement: SettlementConfig::from_env(),
        })
    }
}

/// Business constants for order settlement. Everything the services need to
/// price, schedule, and police an order comes from here.
#[derive(Debug, Clone)]
pub struct SettlementConfig {
    pub currency: String,
    /// Basis points of the order total kept by the platform.
    pub platform_fee_bps: i64,
    /// Basis points of the order total charged by the payment gateway.
    pub gateway_fee_bps: i64,
    /// Fixed gateway surcharge, minor units.
    pub gateway_fixed_fee: i64,
    /// Ordering is suspended once active strikes exceed this count.
    pub strike_threshold: u64,
    pub strike_ttl_days: i64,
    pub pickup_code_ttl_days: i64,
    pub pickup_deadline_days: i64,
    pub payout_delay_hours: i64,
    pub checkout_ttl_minutes: i64,
    pub dispute_response_hours: i64,
    pub dispute_review_hours: i64,
    pub dispute_min_text_len: usize,
    pub default_co2_per_unit_kg: f64,
    pub default_water_per_unit_l: f64,
    /// Credits per whole currency unit of the order total.
    pub buyer_credits_per_unit: i64,
    pub seller_credits_per_unit: i64,
    pub first_purchase_bonus: i64,
    pub first_sale_bonus: i64,
    pub pickup_bonus: i64,
    pub review_bonus: i64,
    /// Offset applied when computing weekly/monthly/yearly leaderboard windows.
    pub leaderboard_utc_offset_minutes: i32,
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self {
            currency: "eur".to_string(),
            platform_fee_bps: 1000,
            gateway_fee_bps: 140,
            gateway_fixed_fee: 25,
            strike_threshold: 2,
            strike_ttl_days: 180,
            pickup_code_ttl_days: 7,
            pickup_deadline_days: 7,
            payout_delay_hours: 48,
            checkout_ttl_minutes: 30,
            dispute_response_hours: 48,
            dispute_review_hours: 72,
            dispute_min_text_len: 50,
            default_co2_per_unit_kg: 2.0,
            default_water_per_unit_l: 500.0,
            buyer_credits_per_unit: 10,
            seller_credits_per_unit: 15,
            first_purchase_bonus: 50,
            first_sale_bonus: 50,
            pickup_bonus: 5,
            review_bonus: 5,
            leaderboard_utc_offset_minutes: 60,
        }
    }
}

impl SettlementConfig {
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            currency: env::var("SETTLEMENT_CURRENCY").unwrap_or(d.currency),
            platform_fee_bps: env_or("PLATFORM_FEE_BPS", d.platform_fee_bps),
            gateway_fee_bps: env_or("GATEWAY_FEE_BPS", d.gateway_fee_bps),
            gateway_fixed_fee: env_or("GATEWAY_FIXED_FEE", d.gateway_fixed_fee),
            strike_threshold: env_or("STRIKE_THRESHOLD", d.strike_threshold),
            strike_ttl_days: env_or("STRIKE_TTL_DAYS", d.strike_ttl_days),
            pickup_code_ttl_days: env_or("PICKUP_CODE_TTL_DAYS", d.pickup_code_ttl_days),
            pickup_deadline_days: env_or("PICKUP_DEADLINE_DAYS", d.pickup_deadline_days),
            payout_delay_hours: env_or("PAYOUT_DELAY_HOURS", d.payout_delay_hours),
            checkout_ttl_minutes: env_or("CHECKOUT_TTL_MINUTES", d.checkout_ttl_minutes),
            dispute_response_hours: env_or("DISPUTE_RESPONSE_HOURS", d.dispute_response_hours),
            dispute_review_hours: env_or("DISPUTE_REVIEW_HOURS", d.dispute_review_hours),
            dispute_min_text_len: env_or("DISPUTE_MIN_TEXT_LEN", d.dispute_min_text_len),
            default_co2_per_unit_kg: env_or("DEFAULT_CO2_PER_UNIT_KG", d.default_co2_per_unit_kg),
            default_water_per_unit_l: env_or("DEFAULT_WATER_PER_UNIT_L", d.default_water_per_unit_l),
            buyer_credits_per_unit: env_or("BUYER_CREDITS_PER_UNIT", d.buyer_credits_per_unit),
            seller_credits_per_unit: env_or("SELLER_CREDITS_PER_UNIT", d.seller_credits_per_unit),
            first_purchase_bonus: env_or("FIRST_PURCHASE_BONUS", d.first_purchase_bonus),
            first_sale_bonus: env_or("FIRST_SALE_BONUS", d.first_sale_bonus),
            pickup_bonus: env_or("PICKUP_BONUS", d.pickup_bonus),
            review_bonus: env_or("REVIEW_BONUS", d.review_bonus),
            leaderboard_utc_offset_minutes: env_or(
                "LEADERBOARD_UTC_OFFSET_MINUTES",
                d.leaderboard_utc_offset_minutes,
            ),
        }
    }

    pub fn pickup_code_ttl(&self) -> Duration {
        Duration::days(self.pickup_code_ttl_days)
    }

    pub fn pickup_deadline(&self) -> Duration {
        Duration::days(self.pickup_deadline_days)
    }

    pub fn payout_delay(&self) -> Duration {
        Duration::hours(self.payout_delay_hours)
    }

    pub fn checkout_ttl(&self) -> Duration {
        Duration::minutes(self.checkout_ttl_minutes)
    }

    pub fn dispute_response_window(&self) -> Duration {
        Duration::hours(self.dispute_response_hours)
    }

    pub fn dispute_review_window(&self) -> Duration {
        Duration::hours(self.dispute_review_hours)
    }

    pub fn strike_ttl(&self) -> Duration {
        Duration::days(self.strike_ttl_days)
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}
