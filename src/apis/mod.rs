mod mock;

pub use mock::*;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fxhash::FxHashMap;
use rust_decimal::Decimal;
use thiserror::Error;

use crate::{
    leverage::MarketTier, Candle, CandleKey, HistoricCandles, Markets, Order, PriceType, Symbol,
    Timeframe,
};

/// The exchange client this crate builds on.
///
/// Implementations talk to the exchange and nothing else: no retries, no
/// caching, no gap handling. Those live in the layers above.
#[async_trait]
pub trait Api: Send + Sync {
    const NAME: &'static str;
    /// Whether the tiers of every pair come back from one request.
    const BULK_LEVERAGE_TIERS: bool;

    /// Fetch up to `limit` candles starting at `since`.
    async fn fetch_candles(
        &self,
        market: Symbol,
        timeframe: Timeframe,
        since: DateTime<Utc>,
        limit: usize,
        price: PriceType,
    ) -> Result<Vec<Candle>, ApiError>;

    /// Fetch all candles between `since` and `until` (or now), paging
    /// through the exchange with `limit` candles per request.
    async fn fetch_historic_candles(
        &self,
        key: CandleKey,
        since: DateTime<Utc>,
        until: Option<DateTime<Utc>>,
        limit: usize,
    ) -> Result<HistoricCandles, ApiError>;

    /// Fetch orders created within `[since, until)`. The exchange bounds how
    /// wide that window may be.
    async fn fetch_orders_window(
        &self,
        market: Symbol,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<Order>, ApiError>;

    async fn fetch_order(&self, id: &str, market: Symbol) -> Result<Order, ApiError>;

    /// Tiers of every market in one request.
    async fn fetch_leverage_tiers(&self) -> Result<FxHashMap<Symbol, Vec<MarketTier>>, ApiError> {
        Err(ApiError::NotSupported("fetch_leverage_tiers"))
    }

    async fn fetch_market_leverage_tiers(&self, market: Symbol)
        -> Result<Vec<MarketTier>, ApiError>;

    /// Update the current state of the markets.
    async fn update_markets(&self, markets: &mut Markets) -> Result<(), ApiError>;

    /// Funding paid (negative) or received on a position since it opened.
    async fn fetch_funding_fees(
        &self,
        market: Symbol,
        amount: Decimal,
        is_short: bool,
        open_date: DateTime<Utc>,
    ) -> Result<Decimal, ApiError>;
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    #[error("Could not connect to the API: {0}")]
    Network(String),
    #[error("Rate limit exceeded.")]
    RateLimited,
    #[error("Exchange error: {0}")]
    Exchange(String),
    #[error("`{0}` is not supported by this exchange.")]
    NotSupported(&'static str),
}
