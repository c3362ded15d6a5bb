use std::time::Duration;

use anyhow::bail;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::Value;
use tokio::{sync::mpsc, task::JoinHandle, time};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

use common::models::StreamEvent;
use common::sources::StreamSource;

use crate::remote::{AggTradeEvent, TickerEvent, combined_stream_url};
use crate::traits::RemoteResponse;

const RECONNECT_DELAY: Duration = Duration::from_secs(2);

#[derive(Deserialize)]
struct RawStreamEvent {
    stream: String,
    data: Value,
}

/// Binance combined websocket feed of `@ticker` and `@aggTrade` channels.
#[derive(Debug, Clone)]
pub struct BinanceStream {
    url: String,
}

impl BinanceStream {
    pub fn new(ws_base_url: &str, symbols: &[String]) -> Self {
        Self {
            url: combined_stream_url(ws_base_url, symbols),
        }
    }

    /// Runs until the receiving side of `events_tx` goes away.
    async fn pump(url: String, events_tx: mpsc::Sender<StreamEvent>) {
        info!("Connecting to: {}", url);

        loop {
            match tokio_tungstenite::connect_async(&url).await {
                Ok((ws_stream, _)) => {
                    info!("Stream connected");
                    let (mut write, mut read) = ws_stream.split();

                    while let Some(msg) = read.next().await {
                        match msg {
                            Ok(Message::Text(text)) => match Self::parse_websocket_message(&text) {
                                Ok(event) => {
                                    if events_tx.send(event).await.is_err() {
                                        debug!("Stream receiver dropped, closing feed");
                                        return;
                                    }
                                }
                                Err(e) => {
                                    warn!("Unknown socket response: {:#}", e);
                                }
                            },
                            Ok(Message::Ping(payload)) => {
                                if let Err(e) = write.send(Message::Pong(payload)).await {
                                    error!("Failed to answer ping: {}", e);
                                    break;
                                }
                                debug!("Ping - Pong message sent to websocket.");
                            }
                            Ok(Message::Close(_)) => {
                                debug!("Close message received");
                                break;
                            }
                            Ok(_) => {}
                            Err(e) => {
                                error!("WebSocket error: {}", e);
                                break;
                            }
                        }
                    }
                }
                Err(e) => {
                    error!("Connection failed: {}", e);
                }
            }

            if events_tx.is_closed() {
                return;
            }
            info!("Reconnecting in {}s...", RECONNECT_DELAY.as_secs());
            time::sleep(RECONNECT_DELAY).await;
        }
    }

    pub fn parse_websocket_message(json_input: &str) -> anyhow::Result<StreamEvent> {
        let raw_event: RawStreamEvent = serde_json::from_str(json_input)?;

        if raw_event.stream.ends_with("@aggTrade") {
            let trade = serde_json::from_value::<AggTradeEvent>(raw_event.data)?;
            Ok(StreamEvent::Whale(trade.to_domain()?))
        } else if raw_event.stream.ends_with("@ticker") {
            let ticker = serde_json::from_value::<TickerEvent>(raw_event.data)?;
            Ok(StreamEvent::Trade(ticker.to_domain()?))
        } else {
            bail!("Unknown stream: {}", raw_event.stream);
        }
    }
}

impl StreamSource for BinanceStream {
    fn start(&self, events_tx: mpsc::Sender<StreamEvent>) -> JoinHandle<()> {
        tokio::spawn(Self::pump(self.url.clone(), events_tx))
    }
}
