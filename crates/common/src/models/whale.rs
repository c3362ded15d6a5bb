use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::market::Market;
use super::stream::{Side, WhaleEvent};

/// Size of the global alert log.
pub const MAX_WHALE_ALERTS: usize = 50;

/// Notional at which intensity saturates.
const FULL_INTENSITY_USD: f64 = 1_000_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WhaleKind {
    LargeOrder,
}

/// Global whale log entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WhaleAlert {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub symbol: String,
    pub market: Market,
    #[serde(rename = "type")]
    pub kind: WhaleKind,
    pub side: Side,
    pub amount_usd: f64,
    pub description: String,
}

impl WhaleAlert {
    pub fn from_event(event: &WhaleEvent) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            symbol: event.symbol.clone(),
            market: Market::Crypto,
            kind: WhaleKind::LargeOrder,
            side: event.side,
            amount_usd: event.value_usd,
            description: event.description.clone(),
        }
    }
}

/// Projection of a whale alert onto the signal it concerns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WhaleSignal {
    #[serde(rename = "type")]
    pub kind: WhaleKind,
    pub description: String,
    pub intensity: f64,
}

impl WhaleSignal {
    pub fn large_order(description: String, intensity: f64) -> Self {
        Self {
            kind: WhaleKind::LargeOrder,
            description,
            intensity,
        }
    }

    pub fn from_event(event: &WhaleEvent) -> Self {
        Self::large_order(
            format!(
                "Executed {} ${}",
                event.side,
                group_thousands(event.value_usd.floor())
            ),
            intensity(event.value_usd),
        )
    }
}

pub fn intensity(amount_usd: f64) -> f64 {
    (amount_usd / FULL_INTENSITY_USD).clamp(0.0, 1.0)
}

/// `1234567.0` -> `"1,234,567"`.
pub fn group_thousands(value: f64) -> String {
    let digits = format!("{:.0}", value.abs());
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if value < 0.0 {
        grouped.push('-');
    }
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    grouped
}
