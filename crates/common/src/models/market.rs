use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Market {
    Crypto,
    Nasdaq,
    Nyse,
    Kospi,
    Kosdaq,
}

impl Market {
    /// Classifies a ticker by its shape. Checks run in order, so
    /// `BTCUSDT.KS` is still crypto.
    pub fn classify(symbol: &str) -> Self {
        let upper = symbol.to_uppercase();
        if upper.contains("USDT") {
            Market::Crypto
        } else if upper.ends_with(".KS") {
            Market::Kospi
        } else if upper.ends_with(".KQ") {
            Market::Kosdaq
        } else if !upper.contains('.') {
            Market::Nasdaq
        } else {
            Market::Nyse
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Market::Crypto => "CRYPTO",
            Market::Nasdaq => "NASDAQ",
            Market::Nyse => "NYSE",
            Market::Kospi => "KOSPI",
            Market::Kosdaq => "KOSDAQ",
        }
    }

    pub fn is_crypto(&self) -> bool {
        matches!(self, Market::Crypto)
    }

    /// KOSPI and KOSDAQ.
    pub fn is_korean(&self) -> bool {
        self.as_str().contains("KOS")
    }
}

impl fmt::Display for Market {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Market {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "CRYPTO" => Ok(Market::Crypto),
            "NASDAQ" => Ok(Market::Nasdaq),
            "NYSE" => Ok(Market::Nyse),
            "KOSPI" => Ok(Market::Kospi),
            "KOSDAQ" => Ok(Market::Kosdaq),
            other => Err(format!("unknown market: {}", other)),
        }
    }
}
