use crate::application::config::CoordinatorConfig;
use crate::application::coordinator::SignalingCoordinator;
use crate::domain::{PeerId, RoomId};
use crate::infrastructure::error::{Result, SignalingError};
use crate::infrastructure::media_transport::MediaTransport;
use crate::infrastructure::signal_transport::SignalTransport;

#[cfg(feature = "native")]
use crate::infrastructure::relay::{RelaySignalTransport, SignalRelay};

/// Builder for joining a room
///
/// Joining acquires the microphone up front: without it no session can
/// proceed, so a capture failure is returned to the caller instead of
/// surfacing later per peer.
pub struct CoordinatorBuilder {
    local_id: PeerId,
    config: CoordinatorConfig,
    listen_only: bool,
}

impl CoordinatorBuilder {
    pub fn new(local_id: PeerId) -> Self {
        Self {
            local_id,
            config: CoordinatorConfig::default(),
            listen_only: false,
        }
    }

    pub fn config(mut self, config: CoordinatorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn room(mut self, room: RoomId) -> Self {
        self.config.room = room;
        self
    }

    /// Join without a microphone; sessions are receive-only
    pub fn listen_only(mut self) -> Self {
        self.listen_only = true;
        self
    }

    pub fn join<S, M>(self, signal: S, mut media: M) -> Result<SignalingCoordinator<S, M>>
    where
        S: SignalTransport,
        M: MediaTransport,
    {
        self.config.validate()?;

        let local_media = if self.listen_only {
            None
        } else {
            let opened = media.open_local_media(&self.config.audio).map_err(|e| match e {
                SignalingError::LocalMediaUnavailable(reason) => {
                    SignalingError::LocalMediaUnavailable(reason)
                }
                other => SignalingError::LocalMediaUnavailable(other.to_string()),
            });
            match opened {
                Ok(local) => Some(local),
                Err(e) => {
                    tracing::error!(
                        "❌ {} cannot join room {}: {}",
                        self.local_id,
                        self.config.room,
                        e
                    );
                    return Err(e);
                }
            }
        };

        tracing::info!("🚪 {} joined room {}", self.local_id, self.config.room);
        Ok(SignalingCoordinator::new(
            self.local_id,
            self.config,
            signal,
            media,
            local_media,
        ))
    }

    /// Subscribe to `relay` for the configured room and join
    #[cfg(feature = "native")]
    pub fn join_relay<M>(
        self,
        relay: &SignalRelay,
        media: M,
    ) -> Result<SignalingCoordinator<RelaySignalTransport, M>>
    where
        M: MediaTransport,
    {
        self.config.validate()?;
        let signal = relay.connect(self.config.room.clone(), self.local_id.clone());
        self.join(signal, media)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SignalEnvelope;
    use crate::infrastructure::simulated_media::SimulatedMedia;

    struct NullSignal;

    impl SignalTransport for NullSignal {
        fn send(&mut self, _envelope: SignalEnvelope) -> Result<()> {
            Ok(())
        }

        fn try_recv(&mut self) -> Option<SignalEnvelope> {
            None
        }

        fn unsubscribe(&mut self) {}
    }

    #[test]
    fn test_join_opens_microphone() {
        let media = SimulatedMedia::new();
        let coordinator = CoordinatorBuilder::new(PeerId::from("alice"))
            .room(RoomId::new("standup"))
            .join(NullSignal, media.clone())
            .unwrap();

        assert!(coordinator.has_local_media());
        assert_eq!(coordinator.room().as_str(), "standup");
        assert_eq!(media.local_media_enabled(), Some(true));
    }

    #[test]
    fn test_join_fails_without_microphone() {
        let result = CoordinatorBuilder::new(PeerId::from("alice"))
            .join(NullSignal, SimulatedMedia::new().failing_local_media());

        assert!(matches!(
            result,
            Err(SignalingError::LocalMediaUnavailable(_))
        ));
    }

    #[test]
    fn test_listen_only_skips_microphone() {
        let media = SimulatedMedia::new().failing_local_media();
        let coordinator = CoordinatorBuilder::new(PeerId::from("alice"))
            .listen_only()
            .join(NullSignal, media)
            .unwrap();

        assert!(!coordinator.has_local_media());
        assert!(!coordinator.microphone_enabled());
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = CoordinatorConfig::default().with_batch_size(0);
        let result = CoordinatorBuilder::new(PeerId::from("alice"))
            .config(config)
            .join(NullSignal, SimulatedMedia::new());

        assert!(matches!(result, Err(SignalingError::InvalidConfig(_))));
    }
}
