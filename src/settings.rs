use crate::{
    order_history::default_order_window, AggregationTable, Asset, MarginMode, TradingMode,
};

use chrono::Duration;
use std::{env, path::PathBuf};
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SettingsError {
    #[error("Invalid value `{value}` for {name}.")]
    Invalid { name: &'static str, value: String },
    #[error("{0} must be positive.")]
    NotPositive(&'static str),
}

#[derive(Clone, Debug)]
pub struct Settings {
    pub trading_mode: TradingMode,
    pub margin_mode: Option<MarginMode>,
    pub stake_currency: Asset,
    /// Root of the data directory; leverage tiers are cached below it.
    pub data_dir: PathBuf,
    /// No account data is fetched in dry runs.
    pub dry_run: bool,
    /// Age after which cached leverage tiers are fetched again.
    pub leverage_tiers_max_age: Duration,
    /// Pause after a failed leverage tier refresh.
    pub leverage_tiers_retry: Duration,
    /// Widest window of a single order history request.
    pub order_window: Duration,
    /// Keep extending the order history range to the current time while
    /// paging instead of stopping at the time of the call.
    pub order_window_live_end: bool,
    pub aggregation: AggregationTable,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            trading_mode: TradingMode::Spot,
            margin_mode: None,
            stake_currency: Asset::new("USDT"),
            data_dir: PathBuf::from("./user_data/data"),
            dry_run: true,
            leverage_tiers_max_age: Duration::weeks(4),
            leverage_tiers_retry: Duration::hours(1),
            order_window: default_order_window(),
            order_window_live_end: false,
            aggregation: AggregationTable::default(),
        }
    }
}

impl Settings {
    /// Defaults, overridden by `MARKETVIEW_*` environment variables.
    pub fn from_env() -> Result<Self, SettingsError> {
        let mut settings = Settings::default();

        if let Ok(mode) = env::var("MARKETVIEW_TRADING_MODE") {
            settings.trading_mode = match mode.to_ascii_lowercase().as_str() {
                "spot" => TradingMode::Spot,
                "futures" => TradingMode::Futures,
                _ => return Err(invalid("MARKETVIEW_TRADING_MODE", mode)),
            };
        }
        if let Ok(mode) = env::var("MARKETVIEW_MARGIN_MODE") {
            settings.margin_mode = match mode.to_ascii_lowercase().as_str() {
                "" => None,
                "isolated" => Some(MarginMode::Isolated),
                "cross" => Some(MarginMode::Cross),
                _ => return Err(invalid("MARKETVIEW_MARGIN_MODE", mode)),
            };
        }
        if let Ok(stake) = env::var("MARKETVIEW_STAKE_CURRENCY") {
            if stake.trim().is_empty() {
                return Err(invalid("MARKETVIEW_STAKE_CURRENCY", stake));
            }
            settings.stake_currency = Asset::new(stake);
        }
        if let Ok(dir) = env::var("MARKETVIEW_DATA_DIR") {
            settings.data_dir = PathBuf::from(dir);
        }
        if let Ok(dry_run) = env::var("MARKETVIEW_DRY_RUN") {
            settings.dry_run = parse_bool(&dry_run)
                .ok_or_else(|| invalid("MARKETVIEW_DRY_RUN", dry_run.clone()))?;
        }

        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.order_window <= Duration::zero() {
            return Err(SettingsError::NotPositive("order_window"));
        }
        if self.leverage_tiers_max_age <= Duration::zero() {
            return Err(SettingsError::NotPositive("leverage_tiers_max_age"));
        }
        Ok(())
    }
}

fn invalid(name: &'static str, value: String) -> SettingsError {
    SettingsError::Invalid { name, value }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "y" | "on" => Some(true),
        "0" | "false" | "no" | "n" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let settings = Settings::default();
        assert_eq!(settings.validate(), Ok(()));
        assert_eq!(
            settings.order_window,
            Duration::days(7) - Duration::minutes(1)
        );
        assert_eq!(settings.leverage_tiers_max_age, Duration::weeks(4));
        assert!(settings.dry_run);
    }

    #[test]
    fn non_positive_window_is_rejected() {
        let settings = Settings {
            order_window: Duration::zero(),
            ..Settings::default()
        };
        assert_eq!(
            settings.validate(),
            Err(SettingsError::NotPositive("order_window"))
        );
    }

    #[test]
    fn bool_values() {
        assert_eq!(parse_bool("Yes"), Some(true));
        assert_eq!(parse_bool(" 0 "), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }

    // The only test touching the process environment.
    #[test]
    fn environment_overrides() {
        env::set_var("MARKETVIEW_TRADING_MODE", "futures");
        env::set_var("MARKETVIEW_MARGIN_MODE", "isolated");
        env::set_var("MARKETVIEW_STAKE_CURRENCY", "usdc");
        env::set_var("MARKETVIEW_DRY_RUN", "false");
        let settings = Settings::from_env().unwrap();
        assert_eq!(settings.trading_mode, TradingMode::Futures);
        assert_eq!(settings.margin_mode, Some(MarginMode::Isolated));
        assert_eq!(settings.stake_currency, Asset::new("USDC"));
        assert!(!settings.dry_run);

        env::set_var("MARKETVIEW_TRADING_MODE", "margin");
        assert_eq!(
            Settings::from_env().unwrap_err(),
            SettingsError::Invalid {
                name: "MARKETVIEW_TRADING_MODE",
                value: "margin".to_owned()
            }
        );

        for name in [
            "MARKETVIEW_TRADING_MODE",
            "MARKETVIEW_MARGIN_MODE",
            "MARKETVIEW_STAKE_CURRENCY",
            "MARKETVIEW_DRY_RUN",
        ] {
            env::remove_var(name);
        }
    }
}
