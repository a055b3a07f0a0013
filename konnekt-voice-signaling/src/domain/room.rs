use crate::infrastructure::error::{Result, SignalingError};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Domain entity: scope a signaling envelope belongs to
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct RoomId(String);

impl RoomId {
    /// The room every participant lands in unless told otherwise
    pub const DEFAULT: &'static str = "general";

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Parse a room ID from a string
    pub fn parse(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(SignalingError::InvalidRoom(
                "room id must not be empty".to_string(),
            ));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RoomId {
    fn default() -> Self {
        Self::new(Self::DEFAULT)
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
