use std::fmt;
use std::str::FromStr;

use common::models::Signal;

use crate::error::RegistryError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Filter {
    #[default]
    All,
    Crypto,
    Kr,
    Global,
    Whale,
}

impl Filter {
    pub fn as_str(&self) -> &'static str {
        match self {
            Filter::All => "ALL",
            Filter::Crypto => "CRYPTO",
            Filter::Kr => "KR",
            Filter::Global => "GLOBAL",
            Filter::Whale => "WHALE",
        }
    }

    pub fn keeps(&self, signal: &Signal) -> bool {
        match self {
            Filter::All => true,
            Filter::Crypto => signal.market.is_crypto(),
            Filter::Kr => signal.market.is_korean(),
            Filter::Global => !signal.market.is_crypto() && !signal.market.is_korean(),
            Filter::Whale => !signal.whale_signals.is_empty(),
        }
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Filter {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "ALL" => Ok(Filter::All),
            "CRYPTO" => Ok(Filter::Crypto),
            "KR" => Ok(Filter::Kr),
            "GLOBAL" => Ok(Filter::Global),
            "WHALE" => Ok(Filter::Whale),
            other => Err(RegistryError::UnknownFilter(other.to_string())),
        }
    }
}

/// Signals to display under `filter`, in registry order. The selected signal
/// is always kept.
pub fn select(signals: &[Signal], filter: Filter, selected_id: Option<&str>) -> Vec<Signal> {
    signals
        .iter()
        .filter(|s| selected_id == Some(s.id.as_str()) || filter.keeps(s))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::models::{Market, WhaleSignal};

    fn signal(symbol: &str) -> Signal {
        Signal::new(symbol, Market::classify(symbol), 1.0, 0.0, 0.0, vec![])
    }

    fn fixture() -> Vec<Signal> {
        let mut whale = signal("ETHUSDT");
        whale.push_whale_signal(WhaleSignal::large_order("Executed BUY $500,000".into(), 0.5));
        vec![
            signal("BTCUSDT"),
            whale,
            signal("005930.KS"),
            signal("035720.KQ"),
            signal("AAPL"),
            signal("BRK.B"),
        ]
    }

    fn symbols(signals: &[Signal]) -> Vec<&str> {
        signals.iter().map(|s| s.symbol.as_str()).collect()
    }

    #[test]
    fn test_filters() {
        let signals = fixture();
        assert_eq!(select(&signals, Filter::All, None).len(), 6);
        assert_eq!(symbols(&select(&signals, Filter::Crypto, None)), ["BTCUSDT", "ETHUSDT"]);
        assert_eq!(symbols(&select(&signals, Filter::Kr, None)), ["005930.KS", "035720.KQ"]);
        assert_eq!(symbols(&select(&signals, Filter::Global, None)), ["AAPL", "BRK.B"]);
        assert_eq!(symbols(&select(&signals, Filter::Whale, None)), ["ETHUSDT"]);
    }

    #[test]
    fn test_selected_signal_survives_filter() {
        let signals = fixture();
        let btc_id = signals[0].id.clone();

        let view = select(&signals, Filter::Kr, Some(&btc_id));

        // Registry order is kept, the selected crypto signal comes first
        assert_eq!(symbols(&view), ["BTCUSDT", "005930.KS", "035720.KQ"]);
    }

    #[test]
    fn test_dangling_selection_is_ignored() {
        let signals = fixture();
        let view = select(&signals, Filter::Global, Some("gone"));
        assert_eq!(symbols(&view), ["AAPL", "BRK.B"]);
    }

    #[test]
    fn test_filter_parsing() {
        assert_eq!("kr".parse::<Filter>().unwrap(), Filter::Kr);
        assert_eq!(" WHALE ".parse::<Filter>().unwrap(), Filter::Whale);
        assert!("stocks".parse::<Filter>().is_err());
    }
}
