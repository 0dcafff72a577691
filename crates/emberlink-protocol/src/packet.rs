//! Packet traits.

use bytes::Bytes;
use emberlink_transport::Opcode;

use crate::wire::{Decoded, WireReader, WireWriter};
use crate::ProtocolError;

/// A command the client sends.
///
/// `write` validates its arguments before producing any bytes, so an
/// `Err` means nothing should reach the transport.
pub trait ClientPacket {
    const OPCODE: Opcode;

    fn write(&self, w: &mut WireWriter) -> Result<(), ProtocolError>;

    fn encode(&self) -> Result<Bytes, ProtocolError> {
        let mut w = WireWriter::new();
        self.write(&mut w)?;
        Ok(w.finish())
    }
}

/// A record the server sends, with a fixed opcode.
///
/// `read` is total: it consumes as much of the layout as the reader holds
/// and leaves defaults for the rest. `write` produces the server's layout;
/// it backs test fixtures and proxies.
pub trait ServerPacket: Sized {
    const OPCODE: Opcode;

    fn read(r: &mut WireReader<'_>) -> Self;

    fn write(&self, w: &mut WireWriter);

    fn decode(bytes: &[u8]) -> Decoded<Self> {
        let mut r = WireReader::new(bytes);
        let value = Self::read(&mut r);
        r.finish(value)
    }

    fn encode(&self) -> Bytes {
        let mut w = WireWriter::new();
        self.write(&mut w);
        w.finish()
    }
}

/// Declares a payload-less [`ClientPacket`].
macro_rules! empty_client_packet {
    ($(#[$meta:meta])* $name:ident => $opcode:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
        pub struct $name;

        impl $crate::packet::ClientPacket for $name {
            const OPCODE: ::emberlink_transport::Opcode = $opcode;

            fn write(&self, _w: &mut $crate::wire::WireWriter) -> Result<(), $crate::ProtocolError> {
                Ok(())
            }
        }
    };
}

/// Declares a [`ClientPacket`] that carries one GUID.
macro_rules! guid_client_packet {
    ($(#[$meta:meta])* $name:ident => $opcode:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub struct $name(pub $crate::Guid);

        impl $crate::packet::ClientPacket for $name {
            const OPCODE: ::emberlink_transport::Opcode = $opcode;

            fn write(&self, w: &mut $crate::wire::WireWriter) -> Result<(), $crate::ProtocolError> {
                w.guid(self.0);
                Ok(())
            }
        }
    };
}

/// Declares a wire enumeration with an `Other` arm for values this client
/// doesn't name. `from_raw` always maps a named value to its variant.
macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident: $repr:ty {
            $($(#[$vmeta:meta])* $variant:ident = $value:literal),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($(#[$vmeta])* $variant,)*
            /// A value without a name here.
            Other($repr),
        }

        impl $name {
            pub fn from_raw(raw: $repr) -> Self {
                match raw {
                    $($value => Self::$variant,)*
                    other => Self::Other(other),
                }
            }

            pub fn raw(self) -> $repr {
                match self {
                    $(Self::$variant => $value,)*
                    Self::Other(raw) => raw,
                }
            }
        }

        impl From<$repr> for $name {
            fn from(raw: $repr) -> Self {
                Self::from_raw(raw)
            }
        }
    };
}

pub(crate) use empty_client_packet;
pub(crate) use guid_client_packet;
pub(crate) use wire_enum;
