use serde::Deserialize;

use common::models::{Side, WhaleEvent};

use crate::traits::RemoteResponse;

#[derive(Deserialize, Debug)]
pub struct AggTradeEvent {
    #[serde(rename(deserialize = "s"))]
    pub symbol: String,
    #[serde(rename(deserialize = "p"))]
    pub price: String,
    #[serde(rename(deserialize = "q"))]
    pub quantity: String,
    #[serde(rename(deserialize = "m"))]
    pub is_buyer_maker: bool,
}

/// Every aggregated trade is a whale candidate. The detector decides.
impl RemoteResponse<WhaleEvent> for AggTradeEvent {
    fn to_domain(&self) -> anyhow::Result<WhaleEvent> {
        let price = self.parse_decimal("p", &self.price)?;
        let quantity = self.parse_decimal("q", &self.quantity)?;
        let side = Side::from_buyer_maker(self.is_buyer_maker);
        let symbol = self.symbol.to_uppercase();

        Ok(WhaleEvent {
            description: format!("{} {} {} @ {}", side, self.quantity, symbol, self.price),
            symbol,
            side,
            value_usd: price * quantity,
        })
    }
}
