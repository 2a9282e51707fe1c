mod cache;
mod store;

pub use cache::*;
pub use store::*;

use crate::{Asset, Symbol};
use fxhash::FxHashMap;
use rust_decimal::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One notional band of a pair's margin schedule.
///
/// Stored as plain JSON numbers in the tier cache file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeverageTier {
    #[serde(with = "rust_decimal::serde::float")]
    pub min_notional: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub max_notional: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub maintenance_margin_rate: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub max_leverage: Decimal,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub maint_amt: Option<Decimal>,
}

/// Tier as the exchange reports it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketTier {
    pub tier: u32,
    pub currency: Asset,
    pub min_notional: Decimal,
    pub max_notional: Decimal,
    pub maintenance_margin_rate: Decimal,
    pub max_leverage: Decimal,
    #[serde(default)]
    pub info: serde_json::Value,
}

impl From<MarketTier> for LeverageTier {
    fn from(tier: MarketTier) -> Self {
        LeverageTier {
            min_notional: tier.min_notional,
            max_notional: tier.max_notional,
            maintenance_margin_rate: tier.maintenance_margin_rate,
            max_leverage: tier.max_leverage,
            maint_amt: None,
        }
    }
}

/// Normalize a pair's raw tiers, ordered by notional.
pub fn normalize_tiers(raw: Vec<MarketTier>) -> Vec<LeverageTier> {
    let mut tiers: Vec<LeverageTier> = raw.into_iter().map(LeverageTier::from).collect();
    tiers.sort_by(|a, b| a.min_notional.cmp(&b.min_notional));
    tiers
}

pub type LeverageTiers = FxHashMap<Symbol, Vec<LeverageTier>>;

/// Largest stake a position may take.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StakeLimit {
    Unbounded,
    Limited(Decimal),
}

impl StakeLimit {
    /// Ceiling implied by a pair's tiers at the given leverage.
    /// No tiers means no ceiling.
    pub fn from_tiers(tiers: &[LeverageTier], leverage: Decimal) -> Self {
        let last = match tiers.last() {
            Some(last) => last,
            None => return StakeLimit::Unbounded,
        };
        let leverage = if leverage <= Decimal::ZERO {
            log::warn!("Leverage {} is not positive, using 1.", leverage);
            Decimal::ONE
        } else {
            leverage
        };
        StakeLimit::Limited(last.max_notional / leverage)
    }

    pub fn limit(&self) -> Option<Decimal> {
        match self {
            StakeLimit::Unbounded => None,
            StakeLimit::Limited(limit) => Some(*limit),
        }
    }
}

impl fmt::Display for StakeLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StakeLimit::Unbounded => f.write_str("unbounded"),
            StakeLimit::Limited(limit) => write!(f, "{}", limit),
        }
    }
}
