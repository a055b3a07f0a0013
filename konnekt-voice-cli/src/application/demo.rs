use crate::infrastructure::error::{CliError, Result};
use konnekt_voice_signaling::{
    CoordinatorBuilder, CoordinatorConfig, PeerId, RoomEvent, RoomId, RoomRuntime, RoomSnapshot,
    SignalRelay, SimulatedMedia,
};
use serde::Serialize;
use std::time::{Duration, Instant};
use tokio::sync::broadcast::{self, error::TryRecvError};

/// Parameters of a simulated room
#[derive(Debug, Clone)]
pub struct DemoOptions {
    pub peers: usize,
    /// How many of the peers join without a microphone (taken from the end)
    pub listeners: usize,
    pub room: String,
    pub signal_ttl: Duration,
    pub handshake_timeout: Duration,
    /// Give up waiting for a full mesh after this long
    pub timeout: Duration,
    pub turn_server: Option<String>,
    pub turn_username: Option<String>,
    pub turn_credential: Option<String>,
}

impl Default for DemoOptions {
    fn default() -> Self {
        Self {
            peers: 3,
            listeners: 0,
            room: RoomId::DEFAULT.to_string(),
            signal_ttl: Duration::from_secs(60),
            handshake_timeout: Duration::from_secs(30),
            timeout: Duration::from_secs(10),
            turn_server: None,
            turn_username: None,
            turn_credential: None,
        }
    }
}

impl DemoOptions {
    pub fn coordinator_config(&self) -> Result<CoordinatorConfig> {
        if self.peers < 2 {
            return Err(CliError::InvalidConfig(
                "a room needs at least two peers".to_string(),
            ));
        }
        if self.listeners > self.peers {
            return Err(CliError::InvalidConfig(format!(
                "{} listeners requested but only {} peers",
                self.listeners, self.peers
            )));
        }

        let room = RoomId::parse(&self.room)?;
        let mut config = CoordinatorConfig::new(room)
            .with_signal_ttl(self.signal_ttl)
            .with_handshake_timeout(self.handshake_timeout)
            .with_poll_interval(10);

        if let Some(turn_url) = &self.turn_server {
            match (&self.turn_username, &self.turn_credential) {
                (Some(username), Some(credential)) => {
                    tracing::info!("Using TURN server: {}", turn_url);
                    config = config.with_turn_server(turn_url, username, credential);
                }
                _ => {
                    return Err(CliError::InvalidConfig(
                        "TURN server requires both username and credential".to_string(),
                    ));
                }
            }
        }

        config.validate()?;
        Ok(config)
    }

    fn peer_id(index: usize) -> PeerId {
        PeerId::new(format!("peer-{}", index + 1))
    }
}

/// Final state of every participant
#[derive(Debug, Clone, Serialize)]
pub struct DemoReport {
    pub room: RoomId,
    pub converged: bool,
    pub elapsed_ms: u128,
    pub snapshots: Vec<RoomSnapshot>,
}

impl DemoReport {
    /// Connected sessions summed over all participants
    pub fn total_connections(&self) -> usize {
        self.snapshots.iter().map(RoomSnapshot::peer_count).sum()
    }
}

/// Run a full-mesh room over an in-process relay with simulated media
///
/// Every joiner offers to the peers already present, like a participant
/// entering a live room. `on_event` sees each room event as it happens.
pub async fn run_demo<F>(options: &DemoOptions, mut on_event: F) -> Result<DemoReport>
where
    F: FnMut(&PeerId, &RoomEvent),
{
    let config = options.coordinator_config()?;
    let relay = SignalRelay::new();
    let started = Instant::now();

    let mut runtimes = Vec::with_capacity(options.peers);
    let mut receivers: Vec<(PeerId, broadcast::Receiver<RoomEvent>)> =
        Vec::with_capacity(options.peers);
    let first_listener = options.peers - options.listeners;

    for index in 0..options.peers {
        let id = DemoOptions::peer_id(index);
        let builder = CoordinatorBuilder::new(id.clone()).config(config.clone());
        let builder = if index >= first_listener {
            builder.listen_only()
        } else {
            builder
        };
        let coordinator = builder.join_relay(&relay, SimulatedMedia::new().with_auto_connect())?;
        let runtime = RoomRuntime::spawn(coordinator);
        receivers.push((id.clone(), runtime.events()));

        for existing in 0..index {
            runtime.initiate(DemoOptions::peer_id(existing)).await?;
        }
        runtimes.push(runtime);
    }

    tracing::info!(
        "🚪 {} peers joined room {}, waiting for the mesh",
        options.peers,
        config.room
    );

    let expected = options.peers - 1;
    let converged = tokio::time::timeout(options.timeout, async {
        loop {
            drain_events(&mut receivers, &mut on_event);
            if runtimes.iter().all(|r| r.snapshot().peer_count() == expected) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .is_ok();
    // Events published between the last drain and the snapshot check
    drain_events(&mut receivers, &mut on_event);

    if converged {
        tracing::info!("✅ Room {} converged", config.room);
    } else {
        tracing::warn!("⏱️ Room {} did not converge in {:?}", config.room, options.timeout);
    }

    let snapshots = runtimes.iter().map(RoomRuntime::snapshot).collect();
    for runtime in runtimes {
        runtime.shutdown().await;
    }

    Ok(DemoReport {
        room: config.room,
        converged,
        elapsed_ms: started.elapsed().as_millis(),
        snapshots,
    })
}

fn drain_events<F>(receivers: &mut [(PeerId, broadcast::Receiver<RoomEvent>)], on_event: &mut F)
where
    F: FnMut(&PeerId, &RoomEvent),
{
    for (peer, rx) in receivers.iter_mut() {
        loop {
            match rx.try_recv() {
                Ok(event) => on_event(peer, &event),
                Err(TryRecvError::Lagged(skipped)) => {
                    tracing::warn!("⚠️ {} missed {} room events", peer, skipped);
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            }
        }
    }
}
