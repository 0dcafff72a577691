//! World object interaction.

use crate::opcodes::CMSG_GAMEOBJ_USE;
use crate::packet::guid_client_packet;

guid_client_packet! {
    /// Uses a game object (mailbox, chest, door).
    UseGameObject => CMSG_GAMEOBJ_USE
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::ClientPacket;
    use crate::Guid;

    #[test]
    fn test_use_game_object_layout() {
        let bytes = UseGameObject(Guid(0xF110_0000_0000_0001)).encode().unwrap();
        assert_eq!(bytes.as_ref(), &[1, 0, 0, 0, 0, 0, 0x10, 0xF1]);
    }
}
