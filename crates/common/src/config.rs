use std::collections::HashSet;
use std::env;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::watch;
use tracing::info;

use crate::models::Market;

const DEFAULT_QUOTE_BASE_URL: &str = "https://query1.finance.yahoo.com";
const DEFAULT_BINANCE_REST_URL: &str = "https://api.binance.com";
const DEFAULT_BINANCE_WS_URL: &str = "wss://stream.binance.com:9443/stream?streams=";
const DEFAULT_STREAM_SYMBOLS: &str = "btcusdt,ethusdt,solusdt,xrpusdt,bnbusdt";
const DEFAULT_WATCHLIST: &str = "AAPL,NVDA,TSLA,MSFT,005930.KS,000660.KS,035720.KQ";
const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 10;
const DEFAULT_WHALE_THRESHOLD_USD: f64 = 100_000.0;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value}")]
    Parse { key: &'static str, value: String },
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Runtime-tunable limits.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub whale_usd: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            whale_usd: DEFAULT_WHALE_THRESHOLD_USD,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WatchlistEntry {
    pub symbol: String,
    pub market: Market,
}

/// The fixed set of non-crypto symbols refreshed on every batch tick.
#[derive(Debug, Clone, PartialEq)]
pub struct Watchlist {
    entries: Vec<WatchlistEntry>,
}

impl Watchlist {
    pub fn new<S: AsRef<str>>(symbols: &[S]) -> Result<Self, ConfigError> {
        let mut seen = HashSet::new();
        let mut entries = Vec::with_capacity(symbols.len());

        for symbol in symbols {
            let symbol = symbol.as_ref().trim().to_uppercase();
            if symbol.is_empty() || !seen.insert(symbol.clone()) {
                continue;
            }
            let market = Market::classify(&symbol);
            if market.is_crypto() {
                return Err(ConfigError::Validation(format!(
                    "watchlist symbol {} is a crypto pair; crypto is stream-owned",
                    symbol
                )));
            }
            entries.push(WatchlistEntry { symbol, market });
        }

        if entries.is_empty() {
            return Err(ConfigError::Validation("watchlist is empty".to_string()));
        }
        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[WatchlistEntry] {
        &self.entries
    }

    pub fn symbols(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.symbol.clone()).collect()
    }

    /// Uppercased symbol set used by the merge partition.
    pub fn canonical_symbols(&self) -> HashSet<String> {
        self.entries.iter().map(|e| e.symbol.clone()).collect()
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub quote_base_url: String,
    pub binance_rest_url: String,
    pub binance_ws_url: String,
    pub stream_symbols: Vec<String>,
    pub watchlist: Watchlist,
    pub refresh_interval: Duration,
    pub thresholds: Thresholds,
}

impl Settings {
    /// Reads settings from the process environment. Call `dotenvy::dotenv()`
    /// first if a `.env` file should be honored.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let refresh_secs = parse_var(
            "REFRESH_INTERVAL_SECS",
            lookup("REFRESH_INTERVAL_SECS"),
            DEFAULT_REFRESH_INTERVAL_SECS,
        )?;
        if refresh_secs == 0 {
            return Err(ConfigError::Validation(
                "REFRESH_INTERVAL_SECS must be positive".to_string(),
            ));
        }

        let whale_usd = parse_var(
            "WHALE_THRESHOLD_USD",
            lookup("WHALE_THRESHOLD_USD"),
            DEFAULT_WHALE_THRESHOLD_USD,
        )?;
        validate_threshold(whale_usd)?;

        let stream_symbols: Vec<String> = split_list(&get("STREAM_SYMBOLS", DEFAULT_STREAM_SYMBOLS))
            .into_iter()
            .map(|s| s.to_lowercase())
            .collect();
        if stream_symbols.is_empty() {
            return Err(ConfigError::Validation("STREAM_SYMBOLS is empty".to_string()));
        }

        let watchlist = Watchlist::new(&split_list(&get("WATCHLIST", DEFAULT_WATCHLIST)))?;

        let settings = Self {
            quote_base_url: get("QUOTE_BASE_URL", DEFAULT_QUOTE_BASE_URL),
            binance_rest_url: get("BINANCE_REST_URL", DEFAULT_BINANCE_REST_URL),
            binance_ws_url: get("BINANCE_WS_URL", DEFAULT_BINANCE_WS_URL),
            stream_symbols,
            watchlist,
            refresh_interval: Duration::from_secs(refresh_secs),
            thresholds: Thresholds { whale_usd },
        };

        info!(
            "Loaded settings: {} watchlist symbols, {} stream symbols, refresh every {:?}, whale threshold ${}",
            settings.watchlist.entries().len(),
            settings.stream_symbols.len(),
            settings.refresh_interval,
            settings.thresholds.whale_usd
        );
        Ok(settings)
    }
}

/// Shared, mutable thresholds. Subscribers are only woken when a value
/// actually changes.
#[derive(Debug, Clone)]
pub struct ThresholdsHandle {
    tx: std::sync::Arc<watch::Sender<Thresholds>>,
}

impl ThresholdsHandle {
    pub fn new(initial: Thresholds) -> Self {
        let (tx, _) = watch::channel(initial);
        Self {
            tx: std::sync::Arc::new(tx),
        }
    }

    pub fn current(&self) -> Thresholds {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<Thresholds> {
        self.tx.subscribe()
    }

    /// Returns whether the value changed.
    pub fn set_whale_usd(&self, whale_usd: f64) -> Result<bool, ConfigError> {
        validate_threshold(whale_usd)?;
        Ok(self.tx.send_if_modified(|t| {
            if t.whale_usd == whale_usd {
                false
            } else {
                t.whale_usd = whale_usd;
                true
            }
        }))
    }
}

fn validate_threshold(whale_usd: f64) -> Result<(), ConfigError> {
    if !whale_usd.is_finite() || whale_usd < 0.0 {
        return Err(ConfigError::Validation(format!(
            "whale threshold must be a non-negative number, got {}",
            whale_usd
        )));
    }
    Ok(())
}

fn parse_var<T: std::str::FromStr>(
    key: &'static str,
    raw: Option<String>,
    default: T,
) -> Result<T, ConfigError> {
    match raw {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::Parse { key, value }),
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::from_lookup(lookup(&[])).unwrap();
        assert_eq!(settings.refresh_interval, Duration::from_secs(10));
        assert_eq!(settings.thresholds.whale_usd, 100_000.0);
        assert_eq!(settings.stream_symbols[0], "btcusdt");
        assert!(settings.watchlist.canonical_symbols().contains("005930.KS"));
    }

    #[test]
    fn test_watchlist_normalizes_and_dedups() {
        let settings =
            Settings::from_lookup(lookup(&[("WATCHLIST", "aapl, AAPL ,000660.ks,,brk.b")])).unwrap();
        let entries = settings.watchlist.entries();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].symbol, "AAPL");
        assert_eq!(entries[1].market, Market::Kospi);
        assert_eq!(entries[2].market, Market::Nyse);
    }

    #[test]
    fn test_crypto_in_watchlist_is_rejected() {
        let err = Settings::from_lookup(lookup(&[("WATCHLIST", "AAPL,BTCUSDT")])).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn test_bad_numbers_are_rejected() {
        let err = Settings::from_lookup(lookup(&[("REFRESH_INTERVAL_SECS", "soon")])).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { key: "REFRESH_INTERVAL_SECS", .. }));

        let err = Settings::from_lookup(lookup(&[("REFRESH_INTERVAL_SECS", "0")])).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));

        let err = Settings::from_lookup(lookup(&[("WHALE_THRESHOLD_USD", "-1")])).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn test_thresholds_handle_notifies_only_on_change() {
        let handle = ThresholdsHandle::new(Thresholds::default());
        let mut rx = handle.subscribe();

        assert!(!handle.set_whale_usd(100_000.0).unwrap());
        assert!(!rx.has_changed().unwrap());

        assert!(handle.set_whale_usd(250_000.0).unwrap());
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().whale_usd, 250_000.0);
        assert_eq!(handle.current().whale_usd, 250_000.0);

        assert!(handle.set_whale_usd(f64::NAN).is_err());
    }
}
