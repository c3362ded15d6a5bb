use dotenvy::dotenv;
use std::io::BufRead;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info};

use common::actors::ActorType;
use common::config::{Settings, ThresholdsHandle};
use common::logger;
use common::sources::{QuoteSource, StreamSource};
use market_data::remote::HttpQuoteSource;
use market_data::services::{BinanceStream, QuoteRefreshActor, StreamActor};
use registry::{SearchResolver, SignalRegistry, WhaleDetector};

use crate::actors::supervisor::Supervisor;
use crate::console::Console;

mod actors;
mod console;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    logger::setup_logger();
    debug!("System starting up...");

    let settings = Settings::from_env()?;

    let registry = SignalRegistry::new();
    let detector = WhaleDetector::new(registry.clone());
    let thresholds = ThresholdsHandle::new(settings.thresholds);

    let quotes: Arc<dyn QuoteSource> = Arc::new(HttpQuoteSource::new(
        &settings.quote_base_url,
        &settings.binance_rest_url,
    )?);
    let stream: Arc<dyn StreamSource> = Arc::new(BinanceStream::new(
        &settings.binance_ws_url,
        &settings.stream_symbols,
    ));
    let resolver = SearchResolver::new(registry.clone(), quotes.clone());

    let mut supervisor = Supervisor::new();

    let quotes_for_refresh = quotes.clone();
    let registry_for_refresh = registry.clone();
    let watchlist = settings.watchlist.clone();
    let refresh_interval = settings.refresh_interval;
    supervisor.register_actor(
        ActorType::QuoteRefreshActor,
        Box::new(move || {
            Box::new(QuoteRefreshActor::new(
                quotes_for_refresh.clone(),
                registry_for_refresh.clone(),
                watchlist.clone(),
                refresh_interval,
            ))
        }),
    );

    let registry_for_stream = registry.clone();
    let detector_for_stream = detector.clone();
    let thresholds_for_stream = thresholds.clone();
    supervisor.register_actor(
        ActorType::StreamActor,
        Box::new(move || {
            Box::new(StreamActor::new(
                stream.clone(),
                registry_for_stream.clone(),
                detector_for_stream.clone(),
                thresholds_for_stream.subscribe(),
            ))
        }),
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let supervisor_handle = tokio::spawn(async move { supervisor.start(shutdown_rx).await });

    // Blocking stdin reads stay off the runtime so shutdown never waits on them
    let (lines_tx, lines_rx) = mpsc::channel::<String>(16);
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if lines_tx.blocking_send(line).is_err() {
                break;
            }
        }
    });

    let mut console = Console::new(registry, detector, resolver, thresholds);
    tokio::select! {
        _ = console.run(lines_rx) => {}
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted");
        }
    }

    info!("Shutting down...");
    let _ = shutdown_tx.send(true);
    supervisor_handle.await?;
    Ok(())
}
