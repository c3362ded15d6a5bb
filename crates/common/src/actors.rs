use std::time::Duration;

use async_trait::async_trait;
use tokio::{sync::mpsc, task::JoinHandle};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActorType {
    QuoteRefreshActor,
    StreamActor,
    Dynamic,
}

/// Messages sent from Actors to the Supervisor
pub enum ControlMessage {
    Heartbeat(Uuid),
    Shutdown(Uuid),
    Error(Uuid, String),
}

impl std::fmt::Debug for ControlMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Heartbeat(id) => write!(f, "Heartbeat({:?})", id),
            Self::Shutdown(id) => write!(f, "Shutdown({:?})", id),
            Self::Error(id, err) => write!(f, "Error({:?}, {})", id, err),
        }
    }
}

/// Stops the heartbeat task when dropped, so an actor that returns or gets
/// aborted goes silent and the supervisor notices.
pub struct Heartbeat {
    handle: JoinHandle<()>,
}

impl Drop for Heartbeat {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// The trait that all restartable services must implement
#[async_trait]
pub trait Actor: Send + Sync {
    fn name(&self) -> ActorType;

    fn id(&self) -> Uuid;

    /// The main loop of the actor.
    /// It must keep the `Heartbeat` from `spawn_heartbeat` alive while running.
    async fn run(&mut self, supervisor_tx: mpsc::Sender<ControlMessage>) -> anyhow::Result<()>;

    fn spawn_heartbeat(&self, supervisor_tx: mpsc::Sender<ControlMessage>) -> Heartbeat {
        let id = self.id();
        let handle = tokio::spawn(async move {
            loop {
                if supervisor_tx
                    .send(ControlMessage::Heartbeat(id))
                    .await
                    .is_err()
                {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(500)).await;
            }
        });
        Heartbeat { handle }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Idle {
        id: Uuid,
    }

    #[async_trait]
    impl Actor for Idle {
        fn name(&self) -> ActorType {
            ActorType::Dynamic
        }

        fn id(&self) -> Uuid {
            self.id
        }

        async fn run(&mut self, _supervisor_tx: mpsc::Sender<ControlMessage>) -> anyhow::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_heartbeat_stops_on_drop() {
        let actor = Idle { id: Uuid::new_v4() };
        let (tx, mut rx) = mpsc::channel(4);

        let heartbeat = actor.spawn_heartbeat(tx);
        match rx.recv().await {
            Some(ControlMessage::Heartbeat(id)) => assert_eq!(id, actor.id),
            other => panic!("expected heartbeat, got {:?}", other),
        }

        drop(heartbeat);
        // Once the task is gone the only sender is dropped with it
        while rx.recv().await.is_some() {}
    }
}
