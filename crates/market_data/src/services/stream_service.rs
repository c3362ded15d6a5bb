use std::sync::Arc;

use anyhow::bail;
use async_trait::async_trait;
use tokio::sync::{mpsc, watch};
use tracing::{info, trace, warn};
use uuid::Uuid;

use common::actors::{Actor, ActorType, ControlMessage};
use common::config::Thresholds;
use common::models::StreamEvent;
use common::sources::{StreamSource, StreamSubscription};
use registry::{SignalRegistry, UpsertOutcome, WhaleDetector};

const EVENT_CHANNEL_CAPACITY: usize = 2000;

/// Applies live stream events to the registry and the whale detector.
///
/// A change of whale threshold restarts the subscription: the old feed task
/// is stopped and awaited before the new one starts, and anything it queued
/// is discarded with its channel.
pub struct StreamActor {
    id: Uuid,
    source: Arc<dyn StreamSource>,
    registry: SignalRegistry,
    detector: WhaleDetector,
    thresholds_rx: watch::Receiver<Thresholds>,
}

#[async_trait]
impl Actor for StreamActor {
    fn id(&self) -> Uuid {
        self.id
    }

    fn name(&self) -> ActorType {
        ActorType::StreamActor
    }

    async fn run(&mut self, supervisor_tx: mpsc::Sender<ControlMessage>) -> anyhow::Result<()> {
        let _heartbeat = self.spawn_heartbeat(supervisor_tx.clone());

        let mut threshold = self.thresholds_rx.borrow_and_update().whale_usd;
        let (mut subscription, mut events_rx) = self.subscribe();
        info!("Stream subscription started, whale threshold ${:.0}", threshold);

        loop {
            tokio::select! {
                event = events_rx.recv() => match event {
                    Some(event) => self.apply(event, threshold).await,
                    None => {
                        warn!("Stream feed task ended unexpectedly");
                        supervisor_tx
                            .send(ControlMessage::Error(
                                self.id,
                                format!("{:?}: stream feed ended", self.name()),
                            ))
                            .await?;
                        bail!("Stream feed ended");
                    }
                },

                changed = self.thresholds_rx.changed() => {
                    if changed.is_err() {
                        subscription.stop().await;
                        bail!("Thresholds channel closed");
                    }

                    let next = self.thresholds_rx.borrow_and_update().whale_usd;
                    if next == threshold {
                        continue;
                    }

                    info!("Whale threshold ${:.0} -> ${:.0}, restarting stream", threshold, next);
                    subscription.stop().await;
                    threshold = next;
                    // Events still queued from the old feed go with its receiver
                    (subscription, events_rx) = self.subscribe();
                }
            }
        }
    }
}

impl StreamActor {
    pub fn new(
        source: Arc<dyn StreamSource>,
        registry: SignalRegistry,
        detector: WhaleDetector,
        thresholds_rx: watch::Receiver<Thresholds>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            source,
            registry,
            detector,
            thresholds_rx,
        }
    }

    fn subscribe(&self) -> (StreamSubscription, mpsc::Receiver<StreamEvent>) {
        let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        (StreamSubscription::start(self.source.as_ref(), events_tx), events_rx)
    }

    async fn apply(&self, event: StreamEvent, threshold: f64) {
        match event {
            StreamEvent::Trade(update) => {
                if self.registry.upsert(&update).await == UpsertOutcome::Inserted {
                    info!("Tracking new stream symbol {}", update.symbol);
                } else {
                    trace!("{} @ {}", update.symbol, update.price);
                }
            }
            StreamEvent::Whale(event) => {
                self.detector.ingest(&event, threshold).await;
            }
        }
    }
}
