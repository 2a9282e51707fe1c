use super::{Api, ApiError};
use crate::{
    leverage::MarketTier, Candle, CandleKey, HistoricCandles, MarketInfo, Markets, Order,
    PriceType, Symbol, Timeframe,
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fxhash::FxHashMap;
use rust_decimal::Decimal;
use std::sync::Mutex;

type Handler<Args, Out> = Box<dyn Fn(Args) -> Result<Out, ApiError> + Send + Sync>;

/// A call received by [`ScriptedApi`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Candles {
        market: Symbol,
        timeframe: Timeframe,
        since: DateTime<Utc>,
        limit: usize,
        price: PriceType,
    },
    HistoricCandles {
        key: CandleKey,
        since: DateTime<Utc>,
        until: Option<DateTime<Utc>>,
        limit: usize,
    },
    OrdersWindow {
        market: Symbol,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    },
    Order {
        id: String,
        market: Symbol,
    },
    LeverageTiers,
    MarketLeverageTiers(Symbol),
    Markets,
    FundingFees(Symbol),
}

/// Scripted exchange. Every endpoint answers through a replaceable handler
/// and every call is recorded.
///
/// `BULK` selects whether leverage tiers are served by one bulk request.
/// Use it through [`Mock`] or [`BulkMock`].
pub struct ScriptedApi<const BULK: bool> {
    candles: Handler<(Symbol, Timeframe, DateTime<Utc>, usize, PriceType), Vec<Candle>>,
    historic: Handler<(CandleKey, DateTime<Utc>, Option<DateTime<Utc>>), Vec<Candle>>,
    orders: Handler<(Symbol, DateTime<Utc>, DateTime<Utc>), Vec<Order>>,
    order: Handler<(String, Symbol), Order>,
    leverage_tiers: Handler<(), FxHashMap<Symbol, Vec<MarketTier>>>,
    market_leverage_tiers: Handler<Symbol, Vec<MarketTier>>,
    funding_fees: Handler<(Symbol, Decimal, bool, DateTime<Utc>), Decimal>,
    markets: Vec<MarketInfo>,
    calls: Mutex<Vec<Call>>,
}

pub type Mock = ScriptedApi<false>;
pub type BulkMock = ScriptedApi<true>;

impl<const BULK: bool> ScriptedApi<BULK> {
    pub fn new() -> Self {
        ScriptedApi {
            candles: Box::new(|_| Ok(Vec::new())),
            historic: Box::new(|_| Ok(Vec::new())),
            orders: Box::new(|_| Ok(Vec::new())),
            order: Box::new(|(id, _)| Err(ApiError::Exchange(format!("order {} not found", id)))),
            leverage_tiers: Box::new(|_| Err(ApiError::NotSupported("fetch_leverage_tiers"))),
            market_leverage_tiers: Box::new(|_| Ok(Vec::new())),
            funding_fees: Box::new(|_| Ok(Decimal::ZERO)),
            markets: Vec::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_candles<F>(mut self, handler: F) -> Self
    where
        F: Fn(Symbol, Timeframe, DateTime<Utc>, usize, PriceType) -> Result<Vec<Candle>, ApiError>
            + Send
            + Sync
            + 'static,
    {
        self.candles = Box::new(move |(market, timeframe, since, limit, price)| {
            handler(market, timeframe, since, limit, price)
        });
        self
    }

    /// Candles answered by the generic historic fetch.
    pub fn with_history<F>(mut self, handler: F) -> Self
    where
        F: Fn(CandleKey, DateTime<Utc>, Option<DateTime<Utc>>) -> Result<Vec<Candle>, ApiError>
            + Send
            + Sync
            + 'static,
    {
        self.historic = Box::new(move |(key, since, until)| handler(key, since, until));
        self
    }

    pub fn with_orders<F>(mut self, handler: F) -> Self
    where
        F: Fn(Symbol, DateTime<Utc>, DateTime<Utc>) -> Result<Vec<Order>, ApiError>
            + Send
            + Sync
            + 'static,
    {
        self.orders = Box::new(move |(market, since, until)| handler(market, since, until));
        self
    }

    pub fn with_order<F>(mut self, handler: F) -> Self
    where
        F: Fn(&str, Symbol) -> Result<Order, ApiError> + Send + Sync + 'static,
    {
        self.order = Box::new(move |(id, market)| handler(&id, market));
        self
    }

    pub fn with_leverage_tiers<F>(mut self, handler: F) -> Self
    where
        F: Fn() -> Result<FxHashMap<Symbol, Vec<MarketTier>>, ApiError> + Send + Sync + 'static,
    {
        self.leverage_tiers = Box::new(move |()| handler());
        self
    }

    pub fn with_market_leverage_tiers<F>(mut self, handler: F) -> Self
    where
        F: Fn(Symbol) -> Result<Vec<MarketTier>, ApiError> + Send + Sync + 'static,
    {
        self.market_leverage_tiers = Box::new(handler);
        self
    }

    pub fn with_funding_fees<F>(mut self, handler: F) -> Self
    where
        F: Fn(Symbol, Decimal, bool, DateTime<Utc>) -> Result<Decimal, ApiError>
            + Send
            + Sync
            + 'static,
    {
        self.funding_fees = Box::new(move |(market, amount, is_short, open_date)| {
            handler(market, amount, is_short, open_date)
        });
        self
    }

    pub fn with_markets(mut self, markets: Vec<MarketInfo>) -> Self {
        self.markets = markets;
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn count_calls<P: Fn(&Call) -> bool>(&self, predicate: P) -> usize {
        self.calls().iter().filter(|call| predicate(call)).count()
    }

    pub fn reset_calls(&self) {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clear();
    }

    fn record(&self, call: Call) {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(call);
    }
}

impl<const BULK: bool> Default for ScriptedApi<BULK> {
    fn default() -> Self {
        ScriptedApi::new()
    }
}

#[async_trait]
impl<const BULK: bool> Api for ScriptedApi<BULK> {
    const NAME: &'static str = "Mock";
    const BULK_LEVERAGE_TIERS: bool = BULK;

    async fn fetch_candles(
        &self,
        market: Symbol,
        timeframe: Timeframe,
        since: DateTime<Utc>,
        limit: usize,
        price: PriceType,
    ) -> Result<Vec<Candle>, ApiError> {
        self.record(Call::Candles {
            market,
            timeframe,
            since,
            limit,
            price,
        });
        let mut candles = (self.candles)((market, timeframe, since, limit, price))?;
        candles.truncate(limit);
        Ok(candles)
    }

    async fn fetch_historic_candles(
        &self,
        key: CandleKey,
        since: DateTime<Utc>,
        until: Option<DateTime<Utc>>,
        limit: usize,
    ) -> Result<HistoricCandles, ApiError> {
        self.record(Call::HistoricCandles {
            key,
            since,
            until,
            limit,
        });
        let candles = (self.historic)((key, since, until))?;
        Ok(HistoricCandles {
            key,
            candles,
            partial: false,
        })
    }

    async fn fetch_orders_window(
        &self,
        market: Symbol,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<Order>, ApiError> {
        self.record(Call::OrdersWindow {
            market,
            since,
            until,
        });
        (self.orders)((market, since, until))
    }

    async fn fetch_order(&self, id: &str, market: Symbol) -> Result<Order, ApiError> {
        self.record(Call::Order {
            id: id.to_owned(),
            market,
        });
        (self.order)((id.to_owned(), market))
    }

    async fn fetch_leverage_tiers(&self) -> Result<FxHashMap<Symbol, Vec<MarketTier>>, ApiError> {
        self.record(Call::LeverageTiers);
        (self.leverage_tiers)(())
    }

    async fn fetch_market_leverage_tiers(
        &self,
        market: Symbol,
    ) -> Result<Vec<MarketTier>, ApiError> {
        self.record(Call::MarketLeverageTiers(market));
        (self.market_leverage_tiers)(market)
    }

    async fn update_markets(&self, markets: &mut Markets) -> Result<(), ApiError> {
        self.record(Call::Markets);
        *markets = Markets::new();
        for info in &self.markets {
            markets.insert(*info);
        }
        Ok(())
    }

    async fn fetch_funding_fees(
        &self,
        market: Symbol,
        amount: Decimal,
        is_short: bool,
        open_date: DateTime<Utc>,
    ) -> Result<Decimal, ApiError> {
        self.record(Call::FundingFees(market));
        (self.funding_fees)((market, amount, is_short, open_date))
    }
}
