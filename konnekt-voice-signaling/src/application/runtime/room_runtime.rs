use crate::application::coordinator::SignalingCoordinator;
use crate::application::events::RoomEvent;
use crate::domain::{PeerId, RoomId, SessionState};
use crate::infrastructure::error::{Result, SignalingError};
use crate::infrastructure::media_transport::MediaTransport;
use crate::infrastructure::signal_transport::SignalTransport;
use serde::Serialize;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot, watch};

/// Room status (read-only, cheap to clone)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoomSnapshot {
    pub local_peer_id: PeerId,
    pub room: RoomId,
    /// Every surfaced session, sorted by peer
    pub peers: Vec<(PeerId, SessionState)>,
    pub connected_peers: Vec<PeerId>,
    pub microphone_enabled: bool,
    pub shut_down: bool,
}

impl RoomSnapshot {
    fn of<S: SignalTransport, M: MediaTransport>(coordinator: &SignalingCoordinator<S, M>) -> Self {
        Self {
            local_peer_id: coordinator.local_id().clone(),
            room: coordinator.room().clone(),
            peers: coordinator.peer_states(),
            connected_peers: coordinator.connected_peers(),
            microphone_enabled: coordinator.microphone_enabled(),
            shut_down: coordinator.is_shut_down(),
        }
    }

    /// "N peers connected"
    pub fn peer_count(&self) -> usize {
        self.connected_peers.len()
    }

    pub fn state_of(&self, peer: &PeerId) -> Option<SessionState> {
        self.peers
            .iter()
            .find(|(id, _)| id == peer)
            .map(|(_, state)| *state)
    }
}

/// Requests handled by the runtime task
#[derive(Debug)]
pub enum RoomCommand {
    Initiate {
        peer: PeerId,
        reply: oneshot::Sender<Result<()>>,
    },
    Close {
        peer: PeerId,
        reply: oneshot::Sender<bool>,
    },
    SetMicrophone {
        enabled: bool,
        reply: oneshot::Sender<Result<()>>,
    },
    Shutdown,
}

/// Background runtime owning one coordinator
///
/// The task is the only code touching the coordinator, so every input
/// (commands, inbound envelopes, media events) is applied in one sequence.
pub struct RoomRuntime {
    cmd_tx: mpsc::Sender<RoomCommand>,
    state_rx: watch::Receiver<RoomSnapshot>,
    event_tx: broadcast::Sender<RoomEvent>,
    task_handle: tokio::task::JoinHandle<()>,
}

impl RoomRuntime {
    /// Spawn the polling task; must be called inside a tokio runtime
    pub fn spawn<S, M>(mut coordinator: SignalingCoordinator<S, M>) -> Self
    where
        S: SignalTransport + Send + 'static,
        M: MediaTransport + Send + 'static,
    {
        let (cmd_tx, mut cmd_rx) = mpsc::channel::<RoomCommand>(100);
        let (state_tx, state_rx) = watch::channel(RoomSnapshot::of(&coordinator));
        let (event_tx, _) = broadcast::channel::<RoomEvent>(256);
        let events = event_tx.clone();
        let poll_interval = Duration::from_millis(coordinator.config().poll_interval_ms.max(1));

        let task_handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(poll_interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            tracing::info!(
                "RoomRuntime started for {} in room {}",
                coordinator.local_id(),
                coordinator.room()
            );

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        let processed = coordinator.poll();
                        if processed > 0 {
                            tracing::debug!("RoomRuntime processed {} inputs", processed);
                        }
                    }
                    cmd = cmd_rx.recv() => match cmd {
                        Some(RoomCommand::Shutdown) | None => {
                            coordinator.shutdown();
                            publish(&mut coordinator, &events, &state_tx);
                            break;
                        }
                        Some(cmd) => apply_command(&mut coordinator, cmd),
                    },
                }

                publish(&mut coordinator, &events, &state_tx);
            }

            tracing::info!("RoomRuntime for {} stopped", coordinator.local_id());
        });

        Self {
            cmd_tx,
            state_rx,
            event_tx,
            task_handle,
        }
    }

    pub async fn initiate(&self, peer: PeerId) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.request(RoomCommand::Initiate { peer, reply }).await?;
        rx.await.map_err(|_| SignalingError::ShutDown)?
    }

    /// Returns false when there was no session to close
    pub async fn close(&self, peer: PeerId) -> Result<bool> {
        let (reply, rx) = oneshot::channel();
        self.request(RoomCommand::Close { peer, reply }).await?;
        rx.await.map_err(|_| SignalingError::ShutDown)
    }

    pub async fn set_microphone_enabled(&self, enabled: bool) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.request(RoomCommand::SetMicrophone { enabled, reply })
            .await?;
        rx.await.map_err(|_| SignalingError::ShutDown)?
    }

    /// Get latest room snapshot (never blocks)
    pub fn snapshot(&self) -> RoomSnapshot {
        self.state_rx.borrow().clone()
    }

    /// Subscribe to snapshot changes
    pub fn subscribe(&self) -> watch::Receiver<RoomSnapshot> {
        self.state_rx.clone()
    }

    /// Receive room events emitted after this call
    pub fn events(&self) -> broadcast::Receiver<RoomEvent> {
        self.event_tx.subscribe()
    }

    /// Leave the room: close every session, then stop the task
    pub async fn shutdown(self) {
        if self.cmd_tx.send(RoomCommand::Shutdown).await.is_err() {
            tracing::debug!("RoomRuntime already stopped");
        }
        if let Err(e) = self.task_handle.await {
            tracing::error!("RoomRuntime task ended abnormally: {}", e);
        }
    }

    async fn request(&self, cmd: RoomCommand) -> Result<()> {
        self.cmd_tx
            .send(cmd)
            .await
            .map_err(|_| SignalingError::ShutDown)
    }
}

fn apply_command<S: SignalTransport, M: MediaTransport>(
    coordinator: &mut SignalingCoordinator<S, M>,
    cmd: RoomCommand,
) {
    match cmd {
        RoomCommand::Initiate { peer, reply } => {
            let _ = reply.send(coordinator.initiate(peer));
        }
        RoomCommand::Close { peer, reply } => {
            let _ = reply.send(coordinator.close(&peer));
        }
        RoomCommand::SetMicrophone { enabled, reply } => {
            let _ = reply.send(coordinator.set_microphone_enabled(enabled));
        }
        RoomCommand::Shutdown => coordinator.shutdown(),
    }
}

fn publish<S: SignalTransport, M: MediaTransport>(
    coordinator: &mut SignalingCoordinator<S, M>,
    events: &broadcast::Sender<RoomEvent>,
    state_tx: &watch::Sender<RoomSnapshot>,
) {
    for event in coordinator.drain_events() {
        // No subscribers is fine
        let _ = events.send(event);
    }

    let snapshot = RoomSnapshot::of(coordinator);
    state_tx.send_if_modified(|current| {
        if *current == snapshot {
            false
        } else {
            *current = snapshot;
            true
        }
    });
}
