use crate::infrastructure::error::{Result, SignalingError};
use serde::{Deserialize, Serialize};

/// ICE server handed to the media transport when a peer session is created
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceServer {
    /// Server URLs (can have multiple for failover)
    pub urls: Vec<String>,
    /// Username for authentication (TURN only)
    pub username: Option<String>,
    /// Credential for authentication (TURN only)
    pub credential: Option<String>,
}

const SCHEMES: [&str; 4] = ["stun:", "stuns:", "turn:", "turns:"];

impl IceServer {
    pub fn stun(url: impl Into<String>) -> Self {
        Self {
            urls: vec![url.into()],
            username: None,
            credential: None,
        }
    }

    pub fn turn(
        url: impl Into<String>,
        username: impl Into<String>,
        credential: impl Into<String>,
    ) -> Self {
        Self {
            urls: vec![url.into()],
            username: Some(username.into()),
            credential: Some(credential.into()),
        }
    }

    /// Public STUN servers used when nothing else is configured
    pub fn default_stun_servers() -> Vec<Self> {
        vec![
            Self::stun("stun:stun.l.google.com:19302"),
            Self::stun("stun:stun1.l.google.com:19302"),
        ]
    }

    pub fn is_turn(&self) -> bool {
        self.urls
            .iter()
            .any(|url| url.starts_with("turn:") || url.starts_with("turns:"))
    }

    /// Check URL schemes and that TURN entries carry credentials
    pub fn validate(&self) -> Result<()> {
        if self.urls.is_empty() {
            return Err(SignalingError::InvalidConfig(
                "ICE server without URLs".to_string(),
            ));
        }

        if let Some(url) = self
            .urls
            .iter()
            .find(|url| !SCHEMES.iter().any(|scheme| url.starts_with(scheme)))
        {
            return Err(SignalingError::InvalidConfig(format!(
                "unsupported ICE server URL: {}",
                url
            )));
        }

        if self.is_turn() && (self.username.is_none() || self.credential.is_none()) {
            return Err(SignalingError::InvalidConfig(format!(
                "TURN server {} requires username and credential",
                self.urls.join(",")
            )));
        }

        Ok(())
    }
}
