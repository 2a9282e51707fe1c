use crate::Asset;
use fxhash::FxHashMap;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::{fmt, str::FromStr};
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SymbolError {
    #[error("Symbol `{0}` is not of the form BASE/QUOTE or BASE/QUOTE:SETTLE.")]
    Malformed(String),
}

/// A pair in unified notation: `BTC/USDT` for spot markets and
/// `BTC/USDT:USDT` for derivatives settled in `USDT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Symbol {
    pub base: Asset,
    pub quote: Asset,
    pub settle: Option<Asset>,
}

impl Symbol {
    pub fn spot<T: AsRef<str>>(base: T, quote: T) -> Self {
        Symbol {
            base: Asset::new(base),
            quote: Asset::new(quote),
            settle: None,
        }
    }

    /// Linear perpetual, settled in the quote asset.
    pub fn perp<T: AsRef<str>>(base: T, quote: T) -> Self {
        let quote = Asset::new(quote);
        Symbol {
            base: Asset::new(base),
            quote,
            settle: Some(quote),
        }
    }

    pub fn is_derivative(&self) -> bool {
        self.settle.is_some()
    }
}

impl FromStr for Symbol {
    type Err = SymbolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || SymbolError::Malformed(s.to_owned());
        let (pair, settle) = match s.split_once(':') {
            Some((pair, settle)) if !settle.is_empty() => (pair, Some(Asset::new(settle))),
            Some(_) => return Err(malformed()),
            None => (s, None),
        };
        match pair.split_once('/') {
            Some((base, quote)) if !base.is_empty() && !quote.is_empty() => Ok(Symbol {
                base: Asset::new(base),
                quote: Asset::new(quote),
                settle,
            }),
            _ => Err(malformed()),
        }
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.settle {
            None => write!(f, "{}/{}", self.base, self.quote),
            Some(settle) => write!(f, "{}/{}:{}", self.base, self.quote, settle),
        }
    }
}

impl Serialize for Symbol {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Symbol {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradingMode {
    Spot,
    Futures,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarginMode {
    Isolated,
    Cross,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MarketInfo {
    pub symbol: Symbol,
    pub active: bool,
}

#[derive(Default, Debug, Clone)]
pub struct Markets {
    pub(crate) markets: FxHashMap<Symbol, MarketInfo>,
}

impl Markets {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn insert(&mut self, info: MarketInfo) {
        self.markets.insert(info.symbol, info);
    }

    pub fn market(&self, symbol: Symbol) -> Option<&MarketInfo> {
        self.markets.get(&symbol)
    }

    pub fn markets(&self) -> impl Iterator<Item = (&Symbol, &MarketInfo)> {
        self.markets.iter()
    }

    /// Active derivative pairs settled in `stake`, sorted.
    pub fn derivative_pairs(&self, stake: Asset) -> Vec<Symbol> {
        let mut pairs: Vec<Symbol> = self
            .markets
            .values()
            .filter(|info| info.active && info.symbol.settle == Some(stake))
            .map(|info| info.symbol)
            .collect();
        pairs.sort();
        pairs
    }
}
