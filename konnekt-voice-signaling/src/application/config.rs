use crate::domain::{IceServer, RoomId};
use crate::infrastructure::error::{Result, SignalingError};
use crate::infrastructure::media_transport::AudioConstraints;
use instant::Duration;

/// Configuration for a signaling coordinator
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Room every envelope is scoped to
    pub room: RoomId,

    /// STUN/TURN servers handed to each new media session
    pub ice_servers: Vec<IceServer>,

    /// Capture settings for the local microphone
    pub audio: AudioConstraints,

    /// Validity window stamped on outbound envelopes
    pub signal_ttl: Duration,

    /// Offering/Answering sessions without progress for this long are failed
    pub handshake_timeout: Duration,

    /// Candidate-only placeholders are dropped after this long
    pub idle_timeout: Duration,

    /// Per-peer cap on candidates waiting for a remote description
    pub max_pending_candidates: usize,

    /// Max inputs processed per poll
    pub batch_size: usize,

    /// Capacity of the serialized inbound queue
    pub queue_size: usize,

    /// Polling interval in milliseconds (async runtime only)
    pub poll_interval_ms: u64,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            room: RoomId::default(),
            ice_servers: IceServer::default_stun_servers(),
            audio: AudioConstraints::default(),
            signal_ttl: Duration::from_secs(60),
            handshake_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(60),
            max_pending_candidates: 32,
            batch_size: 32,
            queue_size: 256,
            poll_interval_ms: 50,
        }
    }
}

impl CoordinatorConfig {
    pub fn new(room: RoomId) -> Self {
        Self {
            room,
            ..Default::default()
        }
    }

    pub fn with_room(mut self, room: RoomId) -> Self {
        self.room = room;
        self
    }

    /// Replace the ICE server list entirely
    pub fn with_ice_servers(mut self, servers: Vec<IceServer>) -> Self {
        self.ice_servers = servers;
        self
    }

    pub fn with_turn_server(
        mut self,
        url: impl Into<String>,
        username: impl Into<String>,
        credential: impl Into<String>,
    ) -> Self {
        self.ice_servers
            .push(IceServer::turn(url, username, credential));
        self
    }

    pub fn with_audio(mut self, audio: AudioConstraints) -> Self {
        self.audio = audio;
        self
    }

    pub fn with_signal_ttl(mut self, ttl: Duration) -> Self {
        self.signal_ttl = ttl;
        self
    }

    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    pub fn with_max_pending_candidates(mut self, max: usize) -> Self {
        self.max_pending_candidates = max;
        self
    }

    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size;
        self
    }

    pub fn with_queue_size(mut self, size: usize) -> Self {
        self.queue_size = size;
        self
    }

    pub fn with_poll_interval(mut self, ms: u64) -> Self {
        self.poll_interval_ms = ms;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.signal_ttl.is_zero() {
            return Err(SignalingError::InvalidConfig(
                "signal TTL must be positive".to_string(),
            ));
        }
        if self.batch_size == 0 || self.queue_size == 0 {
            return Err(SignalingError::InvalidConfig(
                "batch size and queue size must be positive".to_string(),
            ));
        }
        if self.max_pending_candidates == 0 {
            return Err(SignalingError::InvalidConfig(
                "pending candidate cap must be positive".to_string(),
            ));
        }
        for server in &self.ice_servers {
            server.validate()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CoordinatorConfig::default();
        assert_eq!(config.room.as_str(), "general");
        assert_eq!(config.ice_servers.len(), 2);
        assert_eq!(config.signal_ttl, Duration::from_secs(60));
        assert_eq!(config.handshake_timeout, Duration::from_secs(30));
        assert_eq!(config.max_pending_candidates, 32);
        assert!(config.audio.echo_cancellation);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_with_turn_server() {
        let config = CoordinatorConfig::default().with_turn_server(
            "turn:turn.example.org:3478",
            "user",
            "secret",
        );
        assert_eq!(config.ice_servers.len(), 3);
        assert!(config.ice_servers[2].is_turn());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_zero_ttl() {
        let config = CoordinatorConfig::default().with_signal_ttl(Duration::ZERO);
        assert!(matches!(
            config.validate(),
            Err(SignalingError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_rejects_bad_ice_url() {
        let config = CoordinatorConfig::default()
            .with_ice_servers(vec![IceServer::stun("https://example.org")]);
        assert!(config.validate().is_err());
    }
}
