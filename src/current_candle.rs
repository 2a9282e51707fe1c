use crate::{apis::Api, ApiError, Candle, CandleKey, CandleType, Clock, HistoricCandles, Timeframe};

use chrono::{DateTime, Utc};
use fxhash::FxHashMap;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CandleError {
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("No smaller timeframe is configured to estimate {0} candles.")]
    UnsupportedTimeframe(Timeframe),
}

/// Smaller timeframe used to estimate a candle, and how many of those
/// candles make up one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Aggregation {
    pub timeframe: Timeframe,
    pub count: usize,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AggregationTable {
    entries: FxHashMap<Timeframe, Aggregation>,
}

impl AggregationTable {
    pub fn empty() -> Self {
        AggregationTable {
            entries: FxHashMap::default(),
        }
    }

    pub fn insert(&mut self, timeframe: Timeframe, smaller: Timeframe, count: usize) {
        self.entries.insert(
            timeframe,
            Aggregation {
                timeframe: smaller,
                count,
            },
        );
    }

    pub fn get(&self, timeframe: Timeframe) -> Option<Aggregation> {
        self.entries.get(&timeframe).copied()
    }
}

impl Default for AggregationTable {
    fn default() -> Self {
        let mut table = AggregationTable::empty();
        table.insert(Timeframe::minutes(5), Timeframe::minutes(1), 5);
        table.insert(Timeframe::minutes(15), Timeframe::minutes(3), 5);
        table.insert(Timeframe::minutes(30), Timeframe::minutes(5), 6);
        table.insert(Timeframe::hours(1), Timeframe::minutes(15), 4);
        table.insert(Timeframe::hours(4), Timeframe::hours(1), 4);
        table.insert(Timeframe::hours(6), Timeframe::hours(1), 6);
        table.insert(Timeframe::hours(12), Timeframe::hours(3), 4);
        table.insert(Timeframe::days(1), Timeframe::hours(6), 4);
        table.insert(Timeframe::weeks(1), Timeframe::days(1), 7);
        table.insert(Timeframe::months(1), Timeframe::weeks(1), 4);
        table
    }
}

/// How the newest interval of a series was settled.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Completion {
    /// Funding rates follow their own cadence and are left alone.
    Exempt,
    /// The series already reached the current interval.
    Current,
    /// The exchange served the current candle.
    Fetched,
    /// The current candle was built from smaller candles.
    Synthesized,
    /// Nothing was available; the series ends one interval short.
    Missing,
}

/// Makes sure historic candle series reach the interval that is currently
/// open, even when the exchange has not published it yet.
pub struct CurrentCandle<A>
where
    A: Api,
{
    api: Arc<A>,
    aggregation: AggregationTable,
    clock: Arc<dyn Clock>,
}

impl<A> CurrentCandle<A>
where
    A: Api,
{
    pub fn new(api: Arc<A>, aggregation: AggregationTable, clock: Arc<dyn Clock>) -> Self {
        CurrentCandle {
            api,
            aggregation,
            clock,
        }
    }

    /// Generic historic fetch, followed by [`CurrentCandle::complete`].
    pub async fn get_historic_candles(
        &self,
        key: CandleKey,
        since: DateTime<Utc>,
        until: Option<DateTime<Utc>>,
        limit: usize,
    ) -> Result<HistoricCandles, CandleError> {
        let result = async {
            let mut historic = self
                .api
                .fetch_historic_candles(key, since, until, limit)
                .await?;
            let now = self.clock.now();
            self.complete(key, &mut historic.candles, now).await?;
            Ok::<_, CandleError>(historic)
        }
        .await;

        if let Err(err) = &result {
            log::error!(
                "Fetching candles failed for {}, {}, {}, {:?}: {}",
                key.market,
                key.timeframe,
                since,
                key.candle_type,
                err
            );
        }
        result
    }

    /// Append the candle of the interval containing `now` if `candles`
    /// stops short of it.
    pub async fn complete(
        &self,
        key: CandleKey,
        candles: &mut Vec<Candle>,
        now: DateTime<Utc>,
    ) -> Result<Completion, CandleError> {
        if key.candle_type == CandleType::FundingRate {
            return Ok(Completion::Exempt);
        }

        let timeframe = key.timeframe;
        let is_current = candles
            .last()
            .map_or(false, |last| now - last.time < timeframe.duration());
        if is_current {
            return Ok(Completion::Current);
        }

        let start = timeframe.floor(now);
        let price = key.candle_type.price_type();
        let latest = self
            .api
            .fetch_candles(key.market, timeframe, start, 1, price)
            .await?;
        // Some exchanges ignore `since` and answer with the last closed candle.
        if let Some(candle) = latest.into_iter().find(|candle| candle.time == start) {
            log::debug!(
                "Added current {} candle for {} at {}.",
                timeframe,
                key.market,
                candle.time
            );
            candles.push(candle);
            return Ok(Completion::Fetched);
        }

        match self.estimate(key, start).await? {
            Some(candle) => {
                log::debug!(
                    "Added estimated {} candle for {} at {}.",
                    timeframe,
                    key.market,
                    candle.time
                );
                candles.push(candle);
                Ok(Completion::Synthesized)
            }
            None => {
                log::warn!(
                    "Could not estimate the current {} candle for {}.",
                    timeframe,
                    key.market
                );
                Ok(Completion::Missing)
            }
        }
    }

    /// Build the candle starting at `start` from smaller candles.
    async fn estimate(
        &self,
        key: CandleKey,
        start: DateTime<Utc>,
    ) -> Result<Option<Candle>, CandleError> {
        let aggregation = self
            .aggregation
            .get(key.timeframe)
            .ok_or(CandleError::UnsupportedTimeframe(key.timeframe))?;

        let end = start + key.timeframe.duration();
        let smaller: Vec<Candle> = self
            .api
            .fetch_candles(
                key.market,
                aggregation.timeframe,
                start,
                aggregation.count,
                key.candle_type.price_type(),
            )
            .await?
            .into_iter()
            .filter(|candle| candle.time >= start && candle.time < end)
            .collect();

        if smaller.is_empty() {
            log::warn!(
                "No {} candles available for {}.",
                aggregation.timeframe,
                key.market
            );
        }
        Ok(Candle::aggregate(start, &smaller))
    }
}
