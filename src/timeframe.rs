use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::{fmt, str::FromStr};
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum TimeframeError {
    #[error("Timeframe `{0}` is not understood.")]
    Invalid(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TimeframeUnit {
    Minute,
    Hour,
    Day,
    Week,
    /// Thirty days, as exchanges count it.
    Month,
}

impl TimeframeUnit {
    fn suffix(self) -> char {
        match self {
            TimeframeUnit::Minute => 'm',
            TimeframeUnit::Hour => 'h',
            TimeframeUnit::Day => 'd',
            TimeframeUnit::Week => 'w',
            TimeframeUnit::Month => 'M',
        }
    }

    fn millis(self) -> i64 {
        const MINUTE: i64 = 60_000;
        match self {
            TimeframeUnit::Minute => MINUTE,
            TimeframeUnit::Hour => 60 * MINUTE,
            TimeframeUnit::Day => 24 * 60 * MINUTE,
            TimeframeUnit::Week => 7 * 24 * 60 * MINUTE,
            TimeframeUnit::Month => 30 * 24 * 60 * MINUTE,
        }
    }
}

/// A candle interval such as `5m`, `4h` or `1w`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Timeframe {
    amount: u32,
    unit: TimeframeUnit,
}

impl Timeframe {
    pub const fn new(amount: u32, unit: TimeframeUnit) -> Self {
        Timeframe { amount, unit }
    }

    pub const fn minutes(amount: u32) -> Self {
        Timeframe::new(amount, TimeframeUnit::Minute)
    }

    pub const fn hours(amount: u32) -> Self {
        Timeframe::new(amount, TimeframeUnit::Hour)
    }

    pub const fn days(amount: u32) -> Self {
        Timeframe::new(amount, TimeframeUnit::Day)
    }

    pub const fn weeks(amount: u32) -> Self {
        Timeframe::new(amount, TimeframeUnit::Week)
    }

    pub const fn months(amount: u32) -> Self {
        Timeframe::new(amount, TimeframeUnit::Month)
    }

    pub fn as_millis(&self) -> i64 {
        i64::from(self.amount) * self.unit.millis()
    }

    pub fn duration(&self) -> Duration {
        Duration::milliseconds(self.as_millis())
    }

    /// Start of the interval containing `time`, aligned to epoch multiples
    /// of this timeframe.
    pub fn floor(&self, time: DateTime<Utc>) -> DateTime<Utc> {
        let millis = time.timestamp_millis();
        let start = millis - millis.rem_euclid(self.as_millis());
        Utc.timestamp_millis_opt(start).single().unwrap_or(time)
    }
}

impl FromStr for Timeframe {
    type Err = TimeframeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || TimeframeError::Invalid(s.to_owned());
        let unit = match s.chars().last().ok_or_else(invalid)? {
            'm' => TimeframeUnit::Minute,
            'h' => TimeframeUnit::Hour,
            'd' => TimeframeUnit::Day,
            'w' => TimeframeUnit::Week,
            'M' => TimeframeUnit::Month,
            _ => return Err(invalid()),
        };
        let amount: u32 = s[..s.len() - 1].parse().map_err(|_| invalid())?;
        if amount == 0 {
            return Err(invalid());
        }
        Ok(Timeframe { amount, unit })
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.amount, self.unit.suffix())
    }
}

impl Serialize for Timeframe {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Timeframe {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}
