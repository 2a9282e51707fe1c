use crate::{
    apis::{Api, ApiError},
    leverage::{LeverageTier, LeverageTierCache, StakeLimit, TierStore},
    CandleError, CandleKey, CandleType, Clock, CurrentCandle, HistoricCandles, Order,
    OrderHistory, Settings, SettingsError, Symbol, SystemClock, Timeframe, TradingMode,
};

use chrono::{DateTime, Duration, Utc};
use rust_decimal::prelude::*;
use std::sync::Arc;

/// Candle limit for recent history and for requests without a start.
const CANDLE_LIMIT: usize = 1000;
/// Candle limit once the start lies further back than `RECENT_HISTORY_DAYS`.
const CANDLE_LIMIT_HISTORIC: usize = 200;
const CANDLE_LIMIT_FUNDING_RATE: usize = 100;
const RECENT_HISTORY_DAYS: i64 = 30;

/// Client-side view of an exchange: candles that reach the present, order
/// history beyond the exchange's query window and the leverage tiers that
/// bound position sizes.
pub struct Exchange<A: Api> {
    api: Arc<A>,
    settings: Settings,
    clock: Arc<dyn Clock>,
    candles: CurrentCandle<A>,
    orders: OrderHistory<A>,
    tiers: LeverageTierCache,
}

impl<A: Api> Exchange<A> {
    /// Create an exchange layer using the specified API.
    pub async fn new(api: A, settings: Settings) -> Result<Self, SettingsError> {
        Exchange::with_clock(api, settings, Arc::new(SystemClock)).await
    }

    /// Fails on invalid settings before anything is fetched.
    pub async fn with_clock(
        api: A,
        settings: Settings,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, SettingsError> {
        settings.validate()?;
        let api = Arc::new(api);
        let candles = CurrentCandle::new(api.clone(), settings.aggregation.clone(), clock.clone());
        let orders = OrderHistory::new(
            api.clone(),
            settings.order_window,
            clock.clone(),
            settings.order_window_live_end,
        );
        let tiers = LeverageTierCache::open(
            TierStore::for_stake(&settings.data_dir, settings.stake_currency),
            settings.leverage_tiers_max_age,
            settings.leverage_tiers_retry,
            clock.clone(),
        )
        .await;

        let exchange = Exchange {
            api,
            settings,
            clock,
            candles,
            orders,
            tiers,
        };
        exchange.load_leverage_tiers().await;
        Ok(exchange)
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn leverage_tiers(&self) -> &LeverageTierCache {
        &self.tiers
    }

    /// Candles per request for the given series.
    pub fn ohlcv_candle_limit(
        &self,
        _timeframe: Timeframe,
        candle_type: CandleType,
        since: Option<DateTime<Utc>>,
    ) -> usize {
        if candle_type == CandleType::FundingRate {
            return CANDLE_LIMIT_FUNDING_RATE;
        }
        match since {
            Some(since) if since < self.clock.now() - Duration::days(RECENT_HISTORY_DAYS) => {
                CANDLE_LIMIT_HISTORIC
            }
            _ => CANDLE_LIMIT,
        }
    }

    /// Historic candles of a series from `since`, reaching up to the
    /// interval that is currently open.
    pub async fn get_historic_candles(
        &self,
        market: Symbol,
        timeframe: Timeframe,
        since: DateTime<Utc>,
        candle_type: CandleType,
        until: Option<DateTime<Utc>>,
    ) -> Result<HistoricCandles, CandleError> {
        let key = CandleKey {
            market,
            timeframe,
            candle_type,
        };
        let limit = self.ohlcv_candle_limit(timeframe, candle_type, Some(since));
        self.candles
            .get_historic_candles(key, since, until, limit)
            .await
    }

    /// All orders of `market` created since `since`. Empty in dry runs.
    pub async fn fetch_orders(
        &self,
        market: Symbol,
        since: DateTime<Utc>,
    ) -> Result<Vec<Order>, ApiError> {
        if self.settings.dry_run {
            return Ok(Vec::new());
        }
        self.orders.fetch_orders(market, since).await
    }

    pub async fn fetch_order(&self, id: &str, market: Symbol) -> Result<Order, ApiError> {
        self.orders.fetch_order(id, market).await
    }

    /// Largest stake for `market` at `leverage`. Spot markets and pairs
    /// without tiers are unbounded.
    pub fn get_max_pair_stake(
        &self,
        market: Symbol,
        _price: Decimal,
        leverage: Decimal,
    ) -> StakeLimit {
        if self.settings.trading_mode == TradingMode::Spot {
            return StakeLimit::Unbounded;
        }
        self.tiers.max_stake(market, leverage)
    }

    /// Tiers of `market`, refreshing the table first if it is outdated.
    pub async fn get_leverage_tiers(&self, market: Symbol) -> Option<Vec<LeverageTier>> {
        self.load_leverage_tiers().await;
        self.tiers.get(market)
    }

    /// Refresh outdated leverage tiers. Futures only.
    pub async fn load_leverage_tiers(&self) -> bool {
        if self.settings.trading_mode != TradingMode::Futures {
            return false;
        }
        self.tiers
            .refresh_if_stale(self.api.as_ref(), self.settings.stake_currency)
            .await
    }

    /// Funding fees of a position. Zero for spot and when the exchange
    /// cannot tell.
    pub async fn get_funding_fees(
        &self,
        market: Symbol,
        amount: Decimal,
        is_short: bool,
        open_date: DateTime<Utc>,
    ) -> Decimal {
        if self.settings.trading_mode != TradingMode::Futures {
            return Decimal::ZERO;
        }
        match self
            .api
            .fetch_funding_fees(market, amount, is_short, open_date)
            .await
        {
            Ok(fees) => fees,
            Err(err) => {
                log::warn!("Could not update funding fees for {}: {}", market, err);
                Decimal::ZERO
            }
        }
    }
}
