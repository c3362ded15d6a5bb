use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        }
    }

    /// Binance reports the aggressor through `m`: a maker buyer means the
    /// taker sold.
    pub fn from_buyer_maker(is_buyer_maker: bool) -> Self {
        if is_buyer_maker { Side::Sell } else { Side::Buy }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ticker update for a streamed crypto symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeUpdate {
    pub symbol: String,
    pub price: f64,
    pub change_rate: f64,
    pub volume: f64,
    pub score: f64,
}

/// Large-order candidate, not yet checked against the whale threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WhaleEvent {
    pub symbol: String,
    pub side: Side,
    pub value_usd: f64,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Trade(TradeUpdate),
    Whale(WhaleEvent),
}
