use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::market::Market;
use super::stream::TradeUpdate;
use super::whale::WhaleSignal;

pub const REASON_SEARCH: &str = "Added via Global Search";
pub const REASON_PRICE_UNAVAILABLE: &str = "Price data unavailable";
pub const REASON_WATCHLIST: &str = "Watchlist refresh";
pub const REASON_STREAM: &str = "Binance live stream";

/// Per-instrument whale annotations kept on a signal.
pub const MAX_WHALE_SIGNALS: usize = 20;

/// Tracked state of one instrument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Signal {
    pub id: String,
    pub symbol: String,
    pub market: Market,
    pub price: f64,
    pub change_rate: f64,
    pub volume: f64,
    pub score: f64,
    pub reasons: Vec<String>,
    pub whale_signals: VecDeque<WhaleSignal>,
}

impl Signal {
    pub fn new(
        symbol: impl Into<String>,
        market: Market,
        price: f64,
        change_rate: f64,
        volume: f64,
        reasons: Vec<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            symbol: symbol.into(),
            market,
            price,
            change_rate,
            volume,
            score: momentum_score(change_rate),
            reasons,
            whale_signals: VecDeque::with_capacity(MAX_WHALE_SIGNALS),
        }
    }

    /// First sighting of a streamed symbol.
    pub fn from_trade(update: &TradeUpdate) -> Self {
        Self {
            score: update.score,
            ..Self::new(
                update.symbol.clone(),
                Market::Crypto,
                update.price,
                update.change_rate,
                update.volume,
                vec![REASON_STREAM.to_string()],
            )
        }
    }

    /// Overwrites the numeric fields only. Identity, reasons and whale
    /// annotations stay as they are.
    pub fn apply_trade(&mut self, update: &TradeUpdate) {
        self.price = update.price;
        self.change_rate = update.change_rate;
        self.volume = update.volume;
        self.score = update.score;
    }

    pub fn matches_symbol(&self, symbol: &str) -> bool {
        self.symbol.eq_ignore_ascii_case(symbol)
    }

    pub fn push_whale_signal(&mut self, whale_signal: WhaleSignal) {
        super::push_bounded(&mut self.whale_signals, whale_signal, MAX_WHALE_SIGNALS);
    }
}

/// 0..=100 score centered on 50, five points per percent of change.
pub fn momentum_score(change_rate: f64) -> f64 {
    if !change_rate.is_finite() {
        return 50.0;
    }
    let raw = (50.0 + change_rate * 5.0).clamp(0.0, 100.0);
    (raw * 10.0).round() / 10.0
}
