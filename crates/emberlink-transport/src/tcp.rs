//! Framed TCP transport using `tokio::net`.
//!
//! Frame headers:
//!
//! ```text
//! server → client: u16 size (big-endian, opcode + payload) | u16 opcode (LE) | payload
//! client → server: u16 size (big-endian, opcode + payload) | u32 opcode (LE) | payload
//! ```
//!
//! Header encryption belongs to the authentication layer and is not
//! applied here; this transport speaks the plain framing.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use bytes::{BufMut, Bytes, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::{Inbound, Opcode, Registry, Transport, TransportError};

const INBOUND_HEADER_LEN: usize = 4;
const INBOUND_OPCODE_LEN: usize = 2;
const OUTBOUND_OPCODE_LEN: usize = 4;

/// A connected, framed TCP [`Transport`].
///
/// A background task reads frames and dispatches them by opcode. When the
/// peer closes the connection every inbound stream ends and later sends
/// fail with [`TransportError::ConnectionClosed`].
pub struct TcpTransport {
    registry: Arc<Registry>,
    writer: Mutex<OwnedWriteHalf>,
    connected: Arc<AtomicBool>,
    peer: SocketAddr,
    reader: JoinHandle<()>,
}

impl TcpTransport {
    /// Connects to `addr` and starts the read loop.
    pub async fn connect(addr: &str) -> Result<Self, TransportError> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(TransportError::ConnectFailed)?;
        Self::from_stream(stream)
    }

    /// Wraps an already-connected stream.
    pub fn from_stream(stream: TcpStream) -> Result<Self, TransportError> {
        let peer = stream.peer_addr().map_err(TransportError::ConnectFailed)?;
        stream
            .set_nodelay(true)
            .map_err(TransportError::ConnectFailed)?;
        let (read_half, write_half) = stream.into_split();

        let registry = Arc::new(Registry::new());
        let connected = Arc::new(AtomicBool::new(true));
        let reader = tokio::spawn(read_loop(
            read_half,
            Arc::clone(&registry),
            Arc::clone(&connected),
        ));
        tracing::info!(%peer, "TCP transport connected");

        Ok(Self {
            registry,
            writer: Mutex::new(write_half),
            connected,
            peer,
            reader,
        })
    }

    /// The remote address.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// Whether the read loop is still running.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }
}

impl Drop for TcpTransport {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

impl Transport for TcpTransport {
    fn register(&self, opcode: Opcode) -> Inbound {
        self.registry.register(opcode)
    }

    async fn send(
        &self,
        opcode: Opcode,
        payload: Bytes,
        cancel: &CancellationToken,
    ) -> Result<(), TransportError> {
        if !self.is_connected() {
            return Err(TransportError::ConnectionClosed(format!(
                "peer {} closed the connection",
                self.peer
            )));
        }
        let frame = encode_frame(opcode, &payload)?;

        let mut writer = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(TransportError::Cancelled),
            writer = self.writer.lock() => writer,
        };
        // Once the writer is held the whole frame goes out; cancelling
        // half-way would desynchronise the peer's framing.
        writer
            .write_all(&frame)
            .await
            .map_err(TransportError::SendFailed)?;
        tracing::trace!(%opcode, len = payload.len(), "frame sent");
        Ok(())
    }
}

/// Builds a client → server frame.
fn encode_frame(opcode: Opcode, payload: &[u8]) -> Result<Bytes, TransportError> {
    let size = OUTBOUND_OPCODE_LEN + payload.len();
    let size = u16::try_from(size).map_err(|_| TransportError::FrameTooLarge(size))?;
    let mut frame = BytesMut::with_capacity(2 + usize::from(size));
    frame.put_u16(size);
    frame.put_u32_le(u32::from(opcode.0));
    frame.put_slice(payload);
    Ok(frame.freeze())
}

async fn read_loop(mut reader: OwnedReadHalf, registry: Arc<Registry>, connected: Arc<AtomicBool>) {
    let reason = loop {
        match read_frame(&mut reader).await {
            Ok(Some((opcode, payload))) => {
                let delivered = registry.dispatch(opcode, payload);
                tracing::trace!(%opcode, delivered, "frame received");
            }
            Ok(None) => break "peer closed the connection".to_string(),
            Err(e) => break e.to_string(),
        }
    };
    connected.store(false, Ordering::Release);
    registry.close_all();
    tracing::info!(%reason, "TCP transport read loop ended");
}

async fn read_frame(reader: &mut OwnedReadHalf) -> Result<Option<(Opcode, Bytes)>, TransportError> {
    let mut header = [0u8; INBOUND_HEADER_LEN];
    match reader.read_exact(&mut header).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(TransportError::ReceiveFailed(e)),
    }
    let size = usize::from(u16::from_be_bytes([header[0], header[1]]));
    let opcode = Opcode(u16::from_le_bytes([header[2], header[3]]));
    if size < INBOUND_OPCODE_LEN {
        return Err(TransportError::ReceiveFailed(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("frame size {size} shorter than its opcode"),
        )));
    }

    let mut payload = vec![0u8; size - INBOUND_OPCODE_LEN];
    reader
        .read_exact(&mut payload)
        .await
        .map_err(TransportError::ReceiveFailed)?;
    Ok(Some((opcode, Bytes::from(payload))))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_frame_layout() {
        let frame = encode_frame(Opcode(0x95), &[0xAA, 0xBB]).unwrap();
        assert_eq!(
            frame.as_ref(),
            &[0x00, 0x06, 0x95, 0x00, 0x00, 0x00, 0xAA, 0xBB]
        );
    }

    #[test]
    fn test_encode_frame_rejects_oversized_payload() {
        let payload = vec![0u8; u16::MAX as usize];
        assert!(matches!(
            encode_frame(Opcode(1), &payload),
            Err(TransportError::FrameTooLarge(_))
        ));
    }
}
