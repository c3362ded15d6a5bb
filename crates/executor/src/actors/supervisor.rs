use std::{collections::HashMap, time::Duration};
use tracing::{debug, error, info, warn};

use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
    time::{self, Instant},
};
use uuid::Uuid;

use common::actors::{Actor, ActorType, ControlMessage};

pub type ActorFactory = Box<dyn Fn() -> Box<dyn Actor> + Send + Sync>;

struct RunningActor {
    id: Uuid,
    handle: JoinHandle<()>,
    last_pulse: Instant,
}

/// Keeps every registered actor alive. An actor that stops sending
/// heartbeats or whose task finished is aborted, awaited and rebuilt from
/// its factory.
pub struct Supervisor {
    actor_factories: HashMap<ActorType, ActorFactory>,
    running: HashMap<ActorType, RunningActor>,
    check_every: Duration,
    heartbeat_timeout: Duration,
}

impl Supervisor {
    pub fn new() -> Self {
        Self {
            actor_factories: HashMap::new(),
            running: HashMap::new(),
            check_every: Duration::from_secs(1),
            heartbeat_timeout: Duration::from_secs(3),
        }
    }

    pub fn register_actor(&mut self, actor_type: ActorType, factory: ActorFactory) {
        self.actor_factories.insert(actor_type, factory);
    }

    /// Runs until `shutdown_rx` flips to `true` or its sender is dropped,
    /// then stops every actor.
    pub async fn start(&mut self, mut shutdown_rx: watch::Receiver<bool>) {
        let mut check_interval = time::interval(self.check_every);
        let (supervisor_tx, mut supervisor_rx) = mpsc::channel::<ControlMessage>(512);

        let actors: Vec<ActorType> = self.actor_factories.keys().copied().collect();
        for actor_type in actors {
            self.spawn_actor(actor_type, supervisor_tx.clone());
        }

        loop {
            tokio::select! {
                Some(msg) = supervisor_rx.recv() => self.handle_message(msg).await,

                _ = check_interval.tick() => {
                    for actor_type in self.stale_actors(Instant::now()) {
                        warn!("{:?} is unresponsive, restarting", actor_type);
                        self.stop_actor(actor_type).await;
                        self.spawn_actor(actor_type, supervisor_tx.clone());
                    }
                }

                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                }
            }
        }

        self.shutdown().await;
    }

    async fn handle_message(&mut self, msg: ControlMessage) {
        match msg {
            ControlMessage::Heartbeat(id) => {
                // Beats from a replaced instance are ignored
                if let Some(actor) = self.running.values_mut().find(|a| a.id == id) {
                    actor.last_pulse = Instant::now();
                }
            }
            ControlMessage::Shutdown(id) => {
                if let Some(actor_type) = self.actor_type_of(id) {
                    warn!("{:?} is shutting down gracefully.", actor_type);
                    self.stop_actor(actor_type).await;
                }
            }
            ControlMessage::Error(id, error_msg) => match self.actor_type_of(id) {
                Some(actor_type) => error!("Actor {:?} reported error: {}", actor_type, error_msg),
                None => debug!("Stale actor {} reported error: {}", id, error_msg),
            },
        }
    }

    fn actor_type_of(&self, id: Uuid) -> Option<ActorType> {
        self.running
            .iter()
            .find(|(_, a)| a.id == id)
            .map(|(actor_type, _)| *actor_type)
    }

    fn stale_actors(&self, now: Instant) -> Vec<ActorType> {
        self.running
            .iter()
            .filter(|(_, a)| a.handle.is_finished() || now - a.last_pulse > self.heartbeat_timeout)
            .map(|(actor_type, _)| *actor_type)
            .collect()
    }

    /// Aborts the actor and waits for its task to unwind, so nothing it
    /// owns outlives this call.
    async fn stop_actor(&mut self, actor_type: ActorType) {
        if let Some(actor) = self.running.remove(&actor_type) {
            actor.handle.abort();
            if let Err(e) = actor.handle.await {
                if !e.is_cancelled() {
                    error!("Actor {:?} panicked: {}", actor_type, e);
                }
            }
        }
    }

    pub async fn shutdown(&mut self) {
        let actors: Vec<ActorType> = self.running.keys().copied().collect();
        for actor_type in actors {
            self.stop_actor(actor_type).await;
        }
        info!("All actors stopped");
    }

    fn spawn_actor(&mut self, actor_type: ActorType, tx: mpsc::Sender<ControlMessage>) {
        let Some(factory) = self.actor_factories.get(&actor_type) else {
            return;
        };
        let mut new_actor = factory();
        let id = new_actor.id();
        let handle = tokio::spawn(async move {
            if let Err(e) = new_actor.run(tx).await {
                error!("Actor {:?} crashed: {:#}", actor_type, e);
            }
        });

        debug!("Spawned {:?} ({})", actor_type, id);
        self.running.insert(
            actor_type,
            RunningActor {
                id,
                handle,
                last_pulse: Instant::now(),
            },
        );
    }
}

impl Default for Supervisor {
    fn default() -> Self {
        Self::new()
    }
}
