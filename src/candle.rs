use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{Symbol, Timeframe};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Candle {
    pub time: DateTime<Utc>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
    /// Built locally from smaller candles rather than served by the exchange.
    pub synthesized: bool,
}

impl Candle {
    pub fn new(
        time: DateTime<Utc>,
        open: Decimal,
        high: Decimal,
        low: Decimal,
        close: Decimal,
        volume: Decimal,
    ) -> Self {
        Candle {
            time,
            open,
            high,
            low,
            close,
            volume,
            synthesized: false,
        }
    }

    /// Fold consecutive candles into one candle starting at `time`.
    /// Returns `None` for an empty slice.
    pub fn aggregate(time: DateTime<Utc>, candles: &[Candle]) -> Option<Candle> {
        let first = candles.first()?;
        let last = candles.last()?;
        let (high, low, volume) = candles.iter().skip(1).fold(
            (first.high, first.low, first.volume),
            |(high, low, volume), candle| {
                (
                    high.max(candle.high),
                    low.min(candle.low),
                    volume + candle.volume,
                )
            },
        );

        Some(Candle {
            time,
            open: first.open,
            high,
            low,
            close: last.close,
            volume,
            synthesized: true,
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandleType {
    Spot,
    Futures,
    Mark,
    Index,
    PremiumIndex,
    FundingRate,
}

impl CandleType {
    /// Price series to request from the exchange for this candle type.
    pub fn price_type(&self) -> PriceType {
        match self {
            CandleType::Mark => PriceType::Mark,
            CandleType::Index => PriceType::Index,
            _ => PriceType::Last,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceType {
    Last,
    Mark,
    Index,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CandleKey {
    pub market: Symbol,
    pub timeframe: Timeframe,
    pub candle_type: CandleType,
}

/// Answer of a historic candle fetch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HistoricCandles {
    pub key: CandleKey,
    pub candles: Vec<Candle>,
    /// The last candle may still be forming.
    pub partial: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    #[test]
    fn aggregate_empty() {
        assert_eq!(Candle::aggregate(Utc::now(), &[]), None);
    }

    #[test]
    fn aggregate_single() {
        let time = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let candle = Candle::new(time, dec!(1), dec!(3), dec!(0.5), dec!(2), dec!(10));
        let aggregated = Candle::aggregate(time, &[candle]).unwrap();
        assert!(aggregated.synthesized);
        assert_eq!(
            Candle {
                synthesized: false,
                ..aggregated
            },
            candle
        );
    }

    #[test]
    fn price_type_follows_candle_type() {
        assert_eq!(CandleType::Mark.price_type(), PriceType::Mark);
        assert_eq!(CandleType::Index.price_type(), PriceType::Index);
        assert_eq!(CandleType::Futures.price_type(), PriceType::Last);
        assert_eq!(CandleType::Spot.price_type(), PriceType::Last);
    }
}
