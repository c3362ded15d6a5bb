pub mod aggtrade_response;
pub mod quote_client;
pub mod quote_response;
pub mod ticker_response;

pub use aggtrade_response::AggTradeEvent;
pub use quote_client::HttpQuoteSource;
pub use quote_response::{BinanceTicker24h, YahooQuoteEnvelope};
pub use ticker_response::TickerEvent;

/// Combined-stream URL subscribing each symbol to its ticker and aggTrade
/// channels.
pub fn combined_stream_url(ws_base_url: &str, symbols: &[String]) -> String {
    let streams: Vec<String> = symbols
        .iter()
        .map(|s| format!("{sl}@ticker/{sl}@aggTrade", sl = s.to_lowercase()))
        .collect();

    format!("{}{}", ws_base_url, streams.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_combined_stream_url() {
        let url = combined_stream_url(
            "wss://stream.binance.com:9443/stream?streams=",
            &["BTCUSDT".to_string(), "ethusdt".to_string()],
        );

        assert_eq!(
            url,
            "wss://stream.binance.com:9443/stream?streams=btcusdt@ticker/btcusdt@aggTrade/ethusdt@ticker/ethusdt@aggTrade"
        );
    }
}
