//! Pricing engine: Dutch-auction unit price, fee split, and the impact
//! snapshot frozen on an order at creation. Everything here is pure and takes
//! the clock as an argument.

use chrono::{DateTime, Utc};

use crate::config::SettlementConfig;

pub const DEFAULT_DECREASE_AMOUNT: i64 = 100;
pub const DEFAULT_DECREASE_HOURS: i64 = 24;
pub const DEFAULT_FLOOR_PRICE: i64 = 0;

const BPS_DENOMINATOR: i64 = 10_000;
const MINOR_UNITS_PER_UNIT: i64 = 100;

/// Auction parameters as stored on a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DutchAuction {
    pub start_price: Option<i64>,
    pub decrease_amount: Option<i64>,
    pub decrease_hours: Option<i32>,
    pub min_price: Option<i64>,
    pub started_at: Option<DateTime<Utc>>,
}

/// Effective unit price at `now`. Falls back to the listing price when the
/// auction is off or missing its start price or start time.
pub fn current_unit_price(
    listing_price: i64,
    auction: Option<&DutchAuction>,
    now: DateTime<Utc>,
) -> i64 {
    let Some(auction) = auction else {
        return listing_price;
    };
    let (Some(start_price), Some(started_at)) = (auction.start_price, auction.started_at) else {
        return listing_price;
    };

    let interval_hours = auction
        .decrease_hours
        .map(i64::from)
        .filter(|h| *h > 0)
        .unwrap_or(DEFAULT_DECREASE_HOURS);
    let decrease = auction
        .decrease_amount
        .filter(|d| *d >= 0)
        .unwrap_or(DEFAULT_DECREASE_AMOUNT);
    let floor = auction.min_price.unwrap_or(DEFAULT_FLOOR_PRICE);

    let elapsed_hours = (now - started_at).num_hours().max(0);
    let intervals = elapsed_hours / interval_hours;
    let price = start_price.saturating_sub(intervals.saturating_mul(decrease));

    price.max(floor)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeBreakdown {
    pub platform_fee: i64,
    pub gateway_fee: i64,
    pub seller_payout: i64,
}

fn bps_round_half_up(amount: i64, bps: i64) -> i64 {
    (amount * bps + BPS_DENOMINATOR / 2) / BPS_DENOMINATOR
}

/// Split `total` into platform fee, gateway fee and seller payout. The three
/// parts always sum to `total`.
pub fn compute_fees(total: i64, cfg: &SettlementConfig) -> FeeBreakdown {
    if total <= 0 {
        return FeeBreakdown {
            platform_fee: 0,
            gateway_fee: 0,
            seller_payout: 0,
        };
    }

    let platform_fee = bps_round_half_up(total, cfg.platform_fee_bps).min(total);
    let gateway_fee = (bps_round_half_up(total, cfg.gateway_fee_bps) + cfg.gateway_fixed_fee)
        .min(total - platform_fee);

    FeeBreakdown {
        platform_fee,
        gateway_fee,
        seller_payout: total - platform_fee - gateway_fee,
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImpactSnapshot {
    pub co2_saved: f64,
    pub water_saved: f64,
    pub buyer_credits: i64,
    pub seller_credits: i64,
}

/// Impact frozen on the order at creation. Per-unit overrides come from the
/// listing, the rest from settlement defaults.
pub fn impact_snapshot(
    co2_per_unit: Option<f64>,
    water_per_unit: Option<f64>,
    quantity: i32,
    total: i64,
    cfg: &SettlementConfig,
) -> ImpactSnapshot {
    let qty = f64::from(quantity.max(0));
    let co2 = co2_per_unit.unwrap_or(cfg.default_co2_per_unit_kg);
    let water = water_per_unit.unwrap_or(cfg.default_water_per_unit_l);

    ImpactSnapshot {
        co2_saved: co2 * qty,
        water_saved: water * qty,
        buyer_credits: total.max(0) * cfg.buyer_credits_per_unit / MINOR_UNITS_PER_UNIT,
        seller_credits: total.max(0) * cfg.seller_credits_per_unit / MINOR_UNITS_PER_UNIT,
    }
}
