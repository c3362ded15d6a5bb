use serde::Deserialize;

use common::models::Quote;

use crate::traits::RemoteResponse;

/// Body of Yahoo's `v7/finance/quote`.
#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct YahooQuoteEnvelope {
    pub quote_response: YahooQuoteResponse,
}

#[derive(Deserialize, Debug)]
pub struct YahooQuoteResponse {
    #[serde(default)]
    pub result: Vec<YahooQuote>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct YahooQuote {
    pub symbol: String,
    pub regular_market_price: Option<f64>,
    pub regular_market_change_percent: Option<f64>,
}

impl YahooQuoteEnvelope {
    /// Entries without a market price are skipped, same as unknown symbols.
    pub fn into_quotes(self) -> Vec<Quote> {
        self.quote_response
            .result
            .into_iter()
            .filter_map(|q| {
                let price = q.regular_market_price?;
                Some(Quote::new(
                    q.symbol,
                    price,
                    q.regular_market_change_percent.unwrap_or(0.0),
                ))
            })
            .collect()
    }
}

/// Body of Binance's `api/v3/ticker/24hr` for a single symbol.
#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct BinanceTicker24h {
    pub symbol: String,
    pub last_price: String,
    pub price_change_percent: String,
}

impl RemoteResponse<Quote> for BinanceTicker24h {
    fn to_domain(&self) -> anyhow::Result<Quote> {
        Ok(Quote::new(
            self.symbol.clone(),
            self.parse_decimal("lastPrice", &self.last_price)?,
            self.parse_decimal("priceChangePercent", &self.price_change_percent)?,
        ))
    }
}
