use std::collections::VecDeque;
use std::sync::Arc;

use common::models::whale::MAX_WHALE_ALERTS;
use common::models::{WhaleAlert, WhaleEvent, WhaleSignal, push_bounded};
use tokio::sync::Mutex;
use tracing::{debug, info, trace};

use crate::registry::SignalRegistry;

/// Turns large-order candidates into whale alerts.
///
/// Accepted events land in two places: the global alert log kept here, and
/// the whale annotations of the matching signal in the registry.
#[derive(Clone)]
pub struct WhaleDetector {
    registry: SignalRegistry,
    alerts: Arc<Mutex<VecDeque<WhaleAlert>>>,
}

impl WhaleDetector {
    pub fn new(registry: SignalRegistry) -> Self {
        Self {
            registry,
            alerts: Arc::new(Mutex::new(VecDeque::with_capacity(MAX_WHALE_ALERTS))),
        }
    }

    /// Returns the recorded alert, or `None` when the event is below
    /// `threshold_usd`. A value equal to the threshold is accepted.
    pub async fn ingest(&self, event: &WhaleEvent, threshold_usd: f64) -> Option<WhaleAlert> {
        if event.value_usd < threshold_usd {
            trace!(
                "Dropping {} {} ${:.0} below threshold ${:.0}",
                event.symbol, event.side, event.value_usd, threshold_usd
            );
            return None;
        }

        let alert = WhaleAlert::from_event(event);
        {
            let mut alerts = self.alerts.lock().await;
            push_bounded(&mut *alerts, alert.clone(), MAX_WHALE_ALERTS);
        }
        info!("Whale {} {} ${:.0}", alert.symbol, alert.side, alert.amount_usd);

        let attached = self
            .registry
            .attach_whale_signal(&event.symbol, WhaleSignal::from_event(event))
            .await;
        if !attached {
            debug!("No tracked signal for whale symbol {}", event.symbol);
        }

        Some(alert)
    }

    /// Newest first.
    pub async fn alerts(&self) -> Vec<WhaleAlert> {
        self.alerts.lock().await.iter().cloned().collect()
    }
}
