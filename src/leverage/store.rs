use super::LeverageTiers;
use crate::Asset;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Leverage tier cache I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("Leverage tier cache is malformed: {0}")]
    Json(#[from] serde_json::Error),
}

/// Leverage tiers together with the time they were fetched.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TierCacheRecord {
    #[serde(rename = "fetchedAt", alias = "updated")]
    pub fetched_at: DateTime<Utc>,
    pub data: LeverageTiers,
}

/// The Store keeps fetched leverage tiers in a JSON file, one per stake
/// currency, so restarts do not have to ask the exchange again.
#[derive(Clone, Debug)]
pub struct TierStore {
    path: PathBuf,
}

impl TierStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        TierStore { path: path.into() }
    }

    /// `{data_dir}/futures/leverage_tiers_{stake}.json`
    pub fn for_stake<P: AsRef<Path>>(data_dir: P, stake: Asset) -> Self {
        TierStore::new(
            data_dir
                .as_ref()
                .join("futures")
                .join(format!("leverage_tiers_{}.json", stake)),
        )
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `None` when nothing was stored yet.
    pub async fn load(&self) -> Result<Option<TierCacheRecord>, CacheError> {
        let raw = match tokio::fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        Ok(Some(serde_json::from_slice(&raw)?))
    }

    /// Write to a sibling file first and rename it over the old one, so a
    /// crash never leaves a half written cache behind.
    pub async fn save(&self, record: &TierCacheRecord) -> Result<(), CacheError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let raw = serde_json::to_vec_pretty(record)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, raw).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        log::debug!("Stored leverage tiers in {}.", self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        leverage::{normalize_tiers, tests::ada_tiers},
        Symbol,
    };
    use chrono::TimeZone;

    fn record() -> TierCacheRecord {
        let mut data = LeverageTiers::default();
        data.insert(Symbol::perp("ADA", "USDT"), normalize_tiers(ada_tiers()));
        TierCacheRecord {
            fetched_at: Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap(),
            data,
        }
    }

    #[test]
    fn path_per_stake_currency() {
        let store = TierStore::for_stake("/data", Asset::new("usdt"));
        assert_eq!(
            store.path(),
            Path::new("/data/futures/leverage_tiers_USDT.json")
        );
    }

    #[tokio::test]
    async fn missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = TierStore::for_stake(dir.path(), Asset::new("USDT"));
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = TierStore::for_stake(dir.path(), Asset::new("USDT"));
        store.save(&record()).await.unwrap();
        assert!(store.path().is_file());
        assert_eq!(store.load().await.unwrap(), Some(record()));
    }

    #[tokio::test]
    async fn reads_numeric_tiers_and_updated_alias() {
        let dir = tempfile::tempdir().unwrap();
        let store = TierStore::for_stake(dir.path(), Asset::new("USDT"));
        tokio::fs::create_dir_all(dir.path().join("futures"))
            .await
            .unwrap();
        let raw = r#"{
            "updated": "2024-05-01T08:00:00Z",
            "data": {
                "ADA/USDT:USDT": [
                    {"minNotional": 0, "maxNotional": 500, "maintenanceMarginRate": 0.02, "maxLeverage": 75, "maintAmt": null},
                    {"minNotional": 501, "maxNotional": 1000, "maintenanceMarginRate": 0.025, "maxLeverage": 50, "maintAmt": null},
                    {"minNotional": 1001, "maxNotional": 2000, "maintenanceMarginRate": 0.03, "maxLeverage": 20, "maintAmt": null}
                ]
            }
        }"#;
        tokio::fs::write(store.path(), raw).await.unwrap();
        assert_eq!(store.load().await.unwrap(), Some(record()));
    }

    #[tokio::test]
    async fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = TierStore::for_stake(dir.path(), Asset::new("USDT"));
        tokio::fs::create_dir_all(dir.path().join("futures"))
            .await
            .unwrap();
        tokio::fs::write(store.path(), "not json").await.unwrap();
        assert!(matches!(store.load().await, Err(CacheError::Json(_))));
    }
}
