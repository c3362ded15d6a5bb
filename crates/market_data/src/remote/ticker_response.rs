use serde::Deserialize;

use common::models::TradeUpdate;
use common::models::signal::momentum_score;

use crate::traits::RemoteResponse;

/// `<symbol>@ticker` payload, rolling 24h window.
#[derive(Deserialize, Debug)]
pub struct TickerEvent {
    #[serde(rename(deserialize = "s"))]
    pub symbol: String,
    #[serde(rename(deserialize = "c"))]
    pub last_price: String,
    #[serde(rename(deserialize = "P"))]
    pub price_change_percent: String,
    #[serde(rename(deserialize = "q"))]
    pub quote_volume: String,
}

impl RemoteResponse<TradeUpdate> for TickerEvent {
    fn to_domain(&self) -> anyhow::Result<TradeUpdate> {
        let change_rate = self.parse_decimal("P", &self.price_change_percent)?;

        Ok(TradeUpdate {
            symbol: self.symbol.to_uppercase(),
            price: self.parse_decimal("c", &self.last_price)?,
            change_rate,
            volume: self.parse_decimal("q", &self.quote_volume)?,
            score: momentum_score(change_rate),
        })
    }
}
