use async_trait::async_trait;
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::debug;

use crate::models::{Quote, StreamEvent};

/// Price lookups consumed by the batch refresh and by search resolution.
#[async_trait]
pub trait QuoteSource: Send + Sync {
    /// Quotes for as many of `symbols` as the backend knows. Missing symbols
    /// are simply absent from the result.
    async fn fetch_batch(&self, symbols: &[String]) -> anyhow::Result<Vec<Quote>>;

    /// `Ok(None)` when the backend does not know the symbol.
    async fn fetch_single(&self, query: &str) -> anyhow::Result<Option<Quote>>;
}

/// Push feed of trade updates and whale candidates.
pub trait StreamSource: Send + Sync {
    /// Spawns the feed task. It delivers into `events_tx` until aborted.
    fn start(&self, events_tx: mpsc::Sender<StreamEvent>) -> JoinHandle<()>;
}

/// A running feed task. Dropping it aborts the task; `stop` also waits for
/// the task to finish so nothing from it can be delivered afterwards.
pub struct StreamSubscription {
    handle: Option<JoinHandle<()>>,
}

impl StreamSubscription {
    pub fn start(source: &dyn StreamSource, events_tx: mpsc::Sender<StreamEvent>) -> Self {
        Self {
            handle: Some(source.start(events_tx)),
        }
    }

    pub async fn stop(mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            if let Err(e) = handle.await {
                if !e.is_cancelled() {
                    debug!("Stream task ended with error: {}", e);
                }
            }
        }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(|h| h.is_finished())
    }
}

impl Drop for StreamSubscription {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}
