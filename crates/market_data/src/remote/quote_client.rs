use std::time::Duration;

use anyhow::{Context, bail};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tokio::time::sleep;
use tracing::{debug, warn};
use url::Url;

use common::models::{Market, Quote};
use common::sources::QuoteSource;

use crate::remote::{BinanceTicker24h, YahooQuoteEnvelope};
use crate::traits::RemoteResponse;

/// Yahoo rejects very long symbol lists.
const YAHOO_BATCH_SIZE: usize = 40;

/// Quotes over HTTP. Crypto symbols go to the Binance spot REST API; all
/// other symbols go to Yahoo Finance.
pub struct HttpQuoteSource {
    client: Client,
    yahoo_quote_url: Url,
    binance_ticker_url: Url,
    request_delay_ms: u64,
}

impl HttpQuoteSource {
    pub fn new(quote_base_url: &str, binance_rest_url: &str) -> anyhow::Result<Self> {
        let client = Client::builder()
            .user_agent("signal_monitor/0.1.0")
            .timeout(Duration::from_secs(10))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            yahoo_quote_url: endpoint(quote_base_url, "v7/finance/quote")?,
            binance_ticker_url: endpoint(binance_rest_url, "api/v3/ticker/24hr")?,
            request_delay_ms: 100,
        })
    }

    fn yahoo_url(&self, symbols: &[String]) -> Url {
        let mut url = self.yahoo_quote_url.clone();
        url.query_pairs_mut().append_pair("symbols", &symbols.join(","));
        url
    }

    fn binance_url(&self, symbol: &str) -> Url {
        let mut url = self.binance_ticker_url.clone();
        url.query_pairs_mut().append_pair("symbol", symbol);
        url
    }

    /// `Ok(None)` when the endpoint answers 404.
    async fn fetch_yahoo(&self, symbols: &[String]) -> anyhow::Result<Option<Vec<Quote>>> {
        let response = self
            .client
            .get(self.yahoo_url(symbols))
            .send()
            .await
            .context("Failed to send quote request")?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if status == StatusCode::TOO_MANY_REQUESTS {
            bail!("HTTP 429: Too Many Requests");
        }
        if !status.is_success() {
            bail!("Quote backend answered HTTP {}", status);
        }

        let envelope = response
            .json::<YahooQuoteEnvelope>()
            .await
            .context("Failed to parse quote response")?;
        Ok(Some(envelope.into_quotes()))
    }

    async fn fetch_binance(&self, symbol: &str) -> anyhow::Result<Option<Quote>> {
        let response = self
            .client
            .get(self.binance_url(symbol))
            .send()
            .await
            .context("Failed to send ticker request")?;

        let status = response.status();
        // Binance answers unknown symbols with 400 / code -1121
        if status == StatusCode::BAD_REQUEST || status == StatusCode::NOT_FOUND {
            debug!("Binance does not list {}", symbol);
            return Ok(None);
        }
        if status == StatusCode::TOO_MANY_REQUESTS || status.as_u16() == 418 {
            bail!("HTTP {}: rate limited by Binance", status.as_u16());
        }
        if !status.is_success() {
            bail!("Binance answered HTTP {}", status);
        }

        if let Some(used_weight) = response.headers().get("x-mbx-used-weight-1m") {
            let used_weight: u32 = used_weight
                .to_str()
                .context("Invalid weight header")?
                .parse()
                .context("Failed to parse weight")?;

            if used_weight > 1000 {
                warn!("High API weight usage: {}", used_weight);
            }
        }

        let ticker = response
            .json::<BinanceTicker24h>()
            .await
            .context("Failed to parse ticker response")?;
        Ok(Some(ticker.to_domain()?))
    }
}

#[async_trait]
impl QuoteSource for HttpQuoteSource {
    async fn fetch_batch(&self, symbols: &[String]) -> anyhow::Result<Vec<Quote>> {
        let mut quotes = Vec::with_capacity(symbols.len());

        for (i, chunk) in symbols.chunks(YAHOO_BATCH_SIZE).enumerate() {
            if i > 0 {
                sleep(Duration::from_millis(self.request_delay_ms)).await;
            }
            // A batch 404 is a broken endpoint, not a set of unknown symbols
            match self.fetch_yahoo(chunk).await? {
                Some(chunk_quotes) => quotes.extend(chunk_quotes),
                None => bail!("Quote backend answered HTTP 404 for a batch of {}", chunk.len()),
            }
        }

        debug!("Fetched {}/{} quotes", quotes.len(), symbols.len());
        Ok(quotes)
    }

    async fn fetch_single(&self, query: &str) -> anyhow::Result<Option<Quote>> {
        let symbol = query.trim().to_uppercase();

        if Market::classify(&symbol).is_crypto() {
            return self.fetch_binance(&symbol).await;
        }

        let quotes = self
            .fetch_yahoo(std::slice::from_ref(&symbol))
            .await?
            .unwrap_or_default();
        Ok(quotes
            .into_iter()
            .find(|q| q.symbol.eq_ignore_ascii_case(&symbol)))
    }
}

/// Joins `path` onto `base` keeping any path prefix the base already has.
fn endpoint(base: &str, path: &str) -> anyhow::Result<Url> {
    let base = if base.ends_with('/') {
        base.to_string()
    } else {
        format!("{}/", base)
    };

    Url::parse(&base)
        .and_then(|url| url.join(path))
        .with_context(|| format!("Invalid base URL: {}", base))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Answers every connection with the same canned HTTP response.
    async fn canned_server(status_line: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                let mut buf = [0u8; 4096];
                let _ = socket.read(&mut buf).await;
                let response = format!(
                    "{}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status_line,
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_batch_not_found_is_an_error() {
        let base = canned_server("HTTP/1.1 404 Not Found", "").await;
        let source = HttpQuoteSource::new(&base, &base).unwrap();

        let result = source
            .fetch_batch(&["AAPL".to_string(), "NVDA".to_string()])
            .await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_single_not_found_is_absent() {
        let base = canned_server("HTTP/1.1 404 Not Found", "").await;
        let source = HttpQuoteSource::new(&base, &base).unwrap();

        assert_eq!(source.fetch_single("AAPL").await.unwrap(), None);
        assert_eq!(source.fetch_single("btcusdt").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_batch_server_error_is_an_error() {
        let base = canned_server("HTTP/1.1 503 Service Unavailable", "").await;
        let source = HttpQuoteSource::new(&base, &base).unwrap();

        assert!(source.fetch_batch(&["AAPL".to_string()]).await.is_err());
    }

    #[tokio::test]
    async fn test_batch_parses_quotes() {
        let base = canned_server(
            "HTTP/1.1 200 OK",
            r#"{"quoteResponse":{"result":[{"symbol":"AAPL","regularMarketPrice":191.5,"regularMarketChangePercent":1.25}],"error":null}}"#,
        )
        .await;
        let source = HttpQuoteSource::new(&base, &base).unwrap();

        let quotes = source
            .fetch_batch(&["AAPL".to_string(), "NVDA".to_string()])
            .await
            .unwrap();

        assert_eq!(quotes, vec![Quote::new("AAPL", 191.5, 1.25)]);
    }

    #[test]
    fn test_endpoint_keeps_prefix() {
        let url = endpoint("http://localhost:8080/proxy", "v7/finance/quote").unwrap();
        assert_eq!(url.as_str(), "http://localhost:8080/proxy/v7/finance/quote");
    }

    #[test]
    fn test_request_urls() {
        let source =
            HttpQuoteSource::new("https://query1.finance.yahoo.com", "https://api.binance.com").unwrap();

        let yahoo = source.yahoo_url(&["AAPL".to_string(), "005930.KS".to_string()]);
        assert_eq!(
            yahoo.as_str(),
            "https://query1.finance.yahoo.com/v7/finance/quote?symbols=AAPL%2C005930.KS"
        );

        let binance = source.binance_url("BTCUSDT");
        assert_eq!(
            binance.as_str(),
            "https://api.binance.com/api/v3/ticker/24hr?symbol=BTCUSDT"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(HttpQuoteSource::new("not a url", "https://api.binance.com").is_err());
    }
}
