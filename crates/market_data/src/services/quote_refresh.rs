use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::time::{self, MissedTickBehavior};
use tracing::{error, info};
use uuid::Uuid;

use common::actors::{Actor, ActorType, ControlMessage};
use common::config::Watchlist;
use common::sources::QuoteSource;
use registry::{MergeSummary, SignalRegistry, fresh_watchlist_signals};

/// Periodically re-quotes the watchlist and merges it into the registry.
pub struct QuoteRefreshActor {
    id: Uuid,
    quotes: Arc<dyn QuoteSource>,
    registry: SignalRegistry,
    watchlist: Watchlist,
    canonical: HashSet<String>,
    refresh_interval: Duration,
}

#[async_trait]
impl Actor for QuoteRefreshActor {
    fn id(&self) -> Uuid {
        self.id
    }

    fn name(&self) -> ActorType {
        ActorType::QuoteRefreshActor
    }

    async fn run(&mut self, supervisor_tx: mpsc::Sender<ControlMessage>) -> anyhow::Result<()> {
        let _heartbeat = self.spawn_heartbeat(supervisor_tx.clone());

        info!(
            "Starting quote refresh for {} symbols every {}s",
            self.watchlist.entries().len(),
            self.refresh_interval.as_secs_f64()
        );

        // First tick completes immediately
        let mut ticker = time::interval(self.refresh_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;

            if let Err(e) = self.refresh_once().await {
                error!("Quote refresh failed: {:#}", e);
                supervisor_tx
                    .send(ControlMessage::Error(
                        self.id,
                        format!("{:?}: quote refresh failed: {}", self.name(), e),
                    ))
                    .await?;
            }
        }
    }
}

impl QuoteRefreshActor {
    pub fn new(
        quotes: Arc<dyn QuoteSource>,
        registry: SignalRegistry,
        watchlist: Watchlist,
        refresh_interval: Duration,
    ) -> Self {
        let canonical = watchlist.canonical_symbols();
        Self {
            id: Uuid::new_v4(),
            quotes,
            registry,
            watchlist,
            canonical,
            refresh_interval,
        }
    }

    /// One batch fetch and merge. A failed fetch leaves the registry as it
    /// was.
    pub async fn refresh_once(&self) -> anyhow::Result<MergeSummary> {
        let quotes = self.quotes.fetch_batch(&self.watchlist.symbols()).await?;
        let fresh = fresh_watchlist_signals(&self.watchlist, &quotes);
        Ok(self.registry.merge_batch(fresh, &self.canonical).await)
    }
}
