use super::{
    normalize_tiers, CacheError, LeverageTier, LeverageTiers, StakeLimit, TierCacheRecord,
    TierStore,
};
use crate::{apis::Api, ApiError, Asset, Clock, Markets, Symbol};

use chrono::{DateTime, Duration, Utc};
use futures_util::lock::Mutex;
use rust_decimal::Decimal;
use std::sync::{Arc, RwLock};

/// Per-pair leverage tiers, mirrored from the exchange and kept on disk.
///
/// Readers work on an immutable snapshot. A refresh builds a complete new
/// table and swaps it in only once the exchange answered.
pub struct LeverageTierCache {
    store: TierStore,
    max_age: Duration,
    retry_after: Duration,
    clock: Arc<dyn Clock>,
    record: RwLock<Option<Arc<TierCacheRecord>>>,
    // Held while refreshing; remembers the last failed attempt.
    refresh: Mutex<Option<DateTime<Utc>>>,
}

impl LeverageTierCache {
    /// Open the cache and load whatever the store holds.
    pub async fn open(
        store: TierStore,
        max_age: Duration,
        retry_after: Duration,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let cache = LeverageTierCache {
            store,
            max_age,
            retry_after,
            clock,
            record: RwLock::new(None),
            refresh: Mutex::new(None),
        };
        if let Err(err) = cache.load().await {
            log::warn!(
                "Could not read leverage tiers from {}, starting empty: {}",
                cache.store.path().display(),
                err
            );
        }
        cache
    }

    /// Replace the in-memory table with the stored one.
    /// Returns whether anything was stored.
    pub async fn load(&self) -> Result<bool, CacheError> {
        match self.store.load().await? {
            Some(record) => {
                log::info!(
                    "Loaded leverage tiers for {} pairs fetched at {}.",
                    record.data.len(),
                    record.fetched_at
                );
                self.swap(record);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Write the in-memory table to the store.
    pub async fn persist(&self) -> Result<(), CacheError> {
        match self.snapshot() {
            Some(record) => self.store.save(&record).await,
            None => Ok(()),
        }
    }

    pub fn get(&self, pair: Symbol) -> Option<Vec<LeverageTier>> {
        self.snapshot()?.data.get(&pair).cloned()
    }

    pub fn fetched_at(&self) -> Option<DateTime<Utc>> {
        self.snapshot().map(|record| record.fetched_at)
    }

    pub fn is_stale(&self) -> bool {
        match self.fetched_at() {
            Some(fetched_at) => self.clock.now() - fetched_at > self.max_age,
            None => true,
        }
    }

    pub fn max_stake(&self, pair: Symbol, leverage: Decimal) -> StakeLimit {
        match self.snapshot() {
            Some(record) => match record.data.get(&pair) {
                Some(tiers) => StakeLimit::from_tiers(tiers, leverage),
                None => StakeLimit::Unbounded,
            },
            None => StakeLimit::Unbounded,
        }
    }

    /// Fetch a new table from the exchange if the current one is too old.
    /// Returns whether the table was replaced.
    ///
    /// A failed refresh keeps the current table and is not retried before
    /// `retry_after` has passed.
    pub async fn refresh_if_stale<A: Api>(&self, api: &A, stake: Asset) -> bool {
        if !self.is_stale() {
            return false;
        }
        let mut last_failure = self.refresh.lock().await;
        // Someone else may have refreshed while we waited.
        if !self.is_stale() {
            return false;
        }
        let now = self.clock.now();
        if let Some(failed_at) = *last_failure {
            if now - failed_at < self.retry_after {
                log::debug!("Leverage tier refresh failed at {}, not retrying yet.", failed_at);
                return false;
            }
        }
        if self.fetched_at().is_some() {
            log::info!("Cached leverage tiers are outdated. Will update.");
        }

        match self.fetch(api, stake).await {
            Ok(data) => {
                log::info!("Fetched leverage tiers for {} pairs.", data.len());
                self.swap(TierCacheRecord {
                    fetched_at: now,
                    data,
                });
                *last_failure = None;
                if let Err(err) = self.persist().await {
                    log::warn!("Could not store leverage tiers: {}", err);
                }
                true
            }
            Err(err) => {
                log::warn!("Refreshing leverage tiers failed, keeping the cached ones: {}", err);
                *last_failure = Some(now);
                false
            }
        }
    }

    async fn fetch<A: Api>(&self, api: &A, stake: Asset) -> Result<LeverageTiers, ApiError> {
        if A::BULK_LEVERAGE_TIERS {
            let data: LeverageTiers = api
                .fetch_leverage_tiers()
                .await?
                .into_iter()
                .filter(|(pair, _)| pair.settle == Some(stake))
                .map(|(pair, raw)| (pair, normalize_tiers(raw)))
                .collect();
            if data.is_empty() {
                return Err(ApiError::Exchange(format!(
                    "no leverage tiers settled in {}",
                    stake
                )));
            }
            return Ok(data);
        }

        let mut markets = Markets::new();
        api.update_markets(&mut markets).await?;
        let pairs = markets.derivative_pairs(stake);
        if pairs.is_empty() {
            return Err(ApiError::Exchange(format!(
                "no derivative markets settled in {}",
                stake
            )));
        }

        let previous = self.snapshot();
        let mut data = LeverageTiers::default();
        let mut fetched = 0;
        let mut last_error = None;
        for pair in pairs {
            match api.fetch_market_leverage_tiers(pair).await {
                Ok(raw) => {
                    data.insert(pair, normalize_tiers(raw));
                    fetched += 1;
                }
                Err(err) => {
                    log::warn!("Could not fetch leverage tiers for {}: {}", pair, err);
                    if let Some(tiers) = previous.as_ref().and_then(|record| record.data.get(&pair)) {
                        data.insert(pair, tiers.clone());
                    }
                    last_error = Some(err);
                }
            }
        }

        match last_error {
            Some(err) if fetched == 0 => Err(err),
            _ => Ok(data),
        }
    }

    fn snapshot(&self) -> Option<Arc<TierCacheRecord>> {
        self.record
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn swap(&self, record: TierCacheRecord) {
        *self
            .record
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(Arc::new(record));
    }
}
