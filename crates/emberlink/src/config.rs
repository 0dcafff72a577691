//! Client configuration, loadable from JSON.

use std::time::Duration;

use emberlink_protocol::Guid;
use emberlink_session::MultiplexerConfig;
use emberlink_systems::ChatCooldowns;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::EmberlinkError;

/// Everything needed to wire a [`Client`](crate::Client) onto a transport.
///
/// Missing JSON fields fall back to [`Default`]. Cooldowns are in
/// milliseconds.
///
/// ```json
/// { "player": 66, "say_cooldown_ms": 1500 }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Raw GUID of the local player.
    pub player: u64,
    /// Buffer of each subsystem's event channel.
    pub event_capacity: usize,
    /// Payloads buffered per opcode in the multiplexer.
    pub channel_capacity: usize,
    pub say_cooldown_ms: u64,
    pub yell_cooldown_ms: u64,
    /// Whisper, party, guild, channel and every other chat type.
    pub other_cooldown_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        let cooldowns = ChatCooldowns::default();
        Self {
            player: 0,
            event_capacity: emberlink_systems::DEFAULT_EVENT_CAPACITY,
            channel_capacity: MultiplexerConfig::default().channel_capacity,
            say_cooldown_ms: millis(cooldowns.say),
            yell_cooldown_ms: millis(cooldowns.yell),
            other_cooldown_ms: millis(cooldowns.other),
        }
    }
}

impl ClientConfig {
    /// Upper bound for `event_capacity`.
    pub const MAX_EVENT_CAPACITY: usize = 65_536;

    /// Parses a config from JSON and clamps it.
    pub fn from_json(json: &str) -> Result<Self, EmberlinkError> {
        let config: Self = serde_json::from_str(json)?;
        Ok(config.validated())
    }

    /// Clamps capacities to their accepted ranges and cooldowns to
    /// [`ChatCooldowns::MAX`].
    pub fn validated(mut self) -> Self {
        let event_capacity = self.event_capacity.clamp(1, Self::MAX_EVENT_CAPACITY);
        if event_capacity != self.event_capacity {
            warn!(
                requested = self.event_capacity,
                clamped = event_capacity,
                "event_capacity out of range, clamping"
            );
            self.event_capacity = event_capacity;
        }
        self.channel_capacity = self.multiplexer().validated().channel_capacity;

        let cooldowns = self.chat_cooldowns().validated();
        self.say_cooldown_ms = millis(cooldowns.say);
        self.yell_cooldown_ms = millis(cooldowns.yell);
        self.other_cooldown_ms = millis(cooldowns.other);
        self
    }

    pub fn player_guid(&self) -> Guid {
        Guid(self.player)
    }

    pub fn multiplexer(&self) -> MultiplexerConfig {
        MultiplexerConfig {
            channel_capacity: self.channel_capacity,
        }
    }

    pub fn chat_cooldowns(&self) -> ChatCooldowns {
        ChatCooldowns {
            say: Duration::from_millis(self.say_cooldown_ms),
            yell: Duration::from_millis(self.yell_cooldown_ms),
            other: Duration::from_millis(self.other_cooldown_ms),
        }
    }

    /// Serializes the config as pretty JSON.
    pub fn to_json(&self) -> Result<String, EmberlinkError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

pub(crate) fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_matches_chat_cooldowns() {
        let config = ClientConfig::default();
        assert_eq!(config.chat_cooldowns(), ChatCooldowns::default());
        assert_eq!(config.say_cooldown_ms, 1000);
        assert_eq!(config.yell_cooldown_ms, 2000);
        assert_eq!(config.other_cooldown_ms, 500);
    }

    #[test]
    fn test_from_json_partial_uses_defaults() {
        let config = ClientConfig::from_json(r#"{ "player": 66, "say_cooldown_ms": 1500 }"#).unwrap();
        assert_eq!(config.player_guid(), Guid(66));
        assert_eq!(config.say_cooldown_ms, 1500);
        assert_eq!(config.yell_cooldown_ms, 2000);
        assert_eq!(config.event_capacity, emberlink_systems::DEFAULT_EVENT_CAPACITY);
    }

    #[test]
    fn test_from_json_rejects_garbage() {
        let err = ClientConfig::from_json("{ player: }").unwrap_err();
        assert!(matches!(err, EmberlinkError::Config(_)));
    }

    #[test]
    fn test_from_json_rejects_wrong_type() {
        assert!(ClientConfig::from_json(r#"{ "player": "bob" }"#).is_err());
    }

    #[test]
    fn test_validated_clamps_capacities() {
        let config = ClientConfig {
            event_capacity: 0,
            channel_capacity: usize::MAX,
            ..ClientConfig::default()
        }
        .validated();
        assert_eq!(config.event_capacity, 1);
        assert_eq!(config.channel_capacity, MultiplexerConfig::MAX_CHANNEL_CAPACITY);
    }

    #[test]
    fn test_validated_clamps_cooldowns() {
        let config = ClientConfig {
            yell_cooldown_ms: 60_000,
            ..ClientConfig::default()
        }
        .validated();
        assert_eq!(Duration::from_millis(config.yell_cooldown_ms), ChatCooldowns::MAX);
        assert_eq!(config.say_cooldown_ms, 1000);
    }

    #[test]
    fn test_to_json_reads_back() {
        let config = ClientConfig {
            player: 7,
            ..ClientConfig::default()
        };
        let json = config.to_json().unwrap();
        assert_eq!(ClientConfig::from_json(&json).unwrap(), config);
    }
}
