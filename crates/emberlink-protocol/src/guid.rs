//! 64-bit entity identifiers.

use std::fmt;

/// A unique identifier for an entity (player, creature, game object, item).
///
/// The high 16 bits carry the entity kind; a GUID whose high half is zero
/// belongs to a player.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Guid(pub u64);

impl Guid {
    /// The empty GUID, used on the wire for "no target".
    pub const EMPTY: Guid = Guid(0);

    /// Returns `true` for the empty GUID.
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Lower 32 bits (the per-kind counter).
    pub fn low(self) -> u32 {
        (self.0 & 0xFFFF_FFFF) as u32
    }

    /// Upper 16 bits (the entity kind).
    pub fn high(self) -> u16 {
        (self.0 >> 48) as u16
    }

    /// Returns `true` if this identifies a player character.
    pub fn is_player(self) -> bool {
        !self.is_empty() && self.high() == 0
    }

    /// Returns `None` for the empty GUID.
    pub fn non_empty(self) -> Option<Guid> {
        if self.is_empty() { None } else { Some(self) }
    }
}

impl From<u64> for Guid {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:016X}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guid_display() {
        assert_eq!(Guid(0x1234).to_string(), "0x0000000000001234");
    }

    #[test]
    fn test_guid_parts() {
        let guid = Guid(0xF130_0000_0000_002A);
        assert_eq!(guid.high(), 0xF130);
        assert_eq!(guid.low(), 0x2A);
        assert!(!guid.is_player());
        assert!(Guid(7).is_player());
        assert!(!Guid::EMPTY.is_player());
    }

    #[test]
    fn test_non_empty() {
        assert_eq!(Guid::EMPTY.non_empty(), None);
        assert_eq!(Guid(3).non_empty(), Some(Guid(3)));
    }
}
