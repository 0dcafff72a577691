//! Integration tests for the framed TCP transport.
//!
//! A plain `TcpListener` plays the server: it writes server-framed bytes
//! and reads client-framed bytes, so the framing is checked byte for byte.

#[cfg(feature = "tcp")]
mod tcp {
    use std::time::Duration;

    use bytes::Bytes;
    use emberlink_transport::{Opcode, TcpTransport, Transport, TransportError};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio_util::sync::CancellationToken;

    async fn pair() -> (TcpTransport, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("should bind");
        let addr = listener.local_addr().expect("local addr").to_string();
        let accept = tokio::spawn(async move { listener.accept().await.expect("accept").0 });
        let client = TcpTransport::connect(&addr).await.expect("should connect");
        let server = accept.await.expect("accept task");
        (client, server)
    }

    fn server_frame(opcode: u16, payload: &[u8]) -> Vec<u8> {
        let size = (payload.len() + 2) as u16;
        let mut frame = size.to_be_bytes().to_vec();
        frame.extend_from_slice(&opcode.to_le_bytes());
        frame.extend_from_slice(payload);
        frame
    }

    #[tokio::test]
    async fn test_inbound_frames_reach_registration() {
        let (client, mut server) = pair().await;
        let mut inbound = client.register(Opcode(0x96));

        server.write_all(&server_frame(0x96, b"abc")).await.unwrap();
        server.write_all(&server_frame(0x96, b"def")).await.unwrap();

        let first = tokio::time::timeout(Duration::from_secs(1), inbound.recv())
            .await
            .expect("frame in time")
            .expect("stream open");
        let second = inbound.recv().await.expect("stream open");
        assert_eq!(first, Bytes::from_static(b"abc"));
        assert_eq!(second, Bytes::from_static(b"def"));
    }

    #[tokio::test]
    async fn test_unregistered_opcode_is_skipped() {
        let (client, mut server) = pair().await;
        let mut inbound = client.register(Opcode(0x160));

        server.write_all(&server_frame(0x999, b"zzz")).await.unwrap();
        server.write_all(&server_frame(0x160, b"ok")).await.unwrap();

        let got = tokio::time::timeout(Duration::from_secs(1), inbound.recv())
            .await
            .expect("frame in time")
            .expect("stream open");
        assert_eq!(got, Bytes::from_static(b"ok"));
    }

    #[tokio::test]
    async fn test_send_writes_client_header() {
        let (client, mut server) = pair().await;

        client
            .send(Opcode(0x95), Bytes::from_static(&[1, 2, 3]), &CancellationToken::new())
            .await
            .expect("send should succeed");

        let mut buf = [0u8; 9];
        server.read_exact(&mut buf).await.unwrap();
        assert_eq!(buf, [0x00, 0x07, 0x95, 0x00, 0x00, 0x00, 1, 2, 3]);
    }

    #[tokio::test]
    async fn test_peer_close_ends_streams_and_fails_sends() {
        let (client, server) = pair().await;
        let mut inbound = client.register(Opcode(0x96));

        drop(server);

        let end = tokio::time::timeout(Duration::from_secs(1), inbound.recv())
            .await
            .expect("stream should end in time");
        assert!(end.is_none());

        let result = client
            .send(Opcode(0x95), Bytes::new(), &CancellationToken::new())
            .await;
        assert!(matches!(result, Err(TransportError::ConnectionClosed(_))));
    }

    #[tokio::test]
    async fn test_cancelled_send_writes_nothing() {
        let (client, mut server) = pair().await;
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = client.send(Opcode(0x95), Bytes::from_static(b"x"), &cancel).await;
        assert!(matches!(result, Err(TransportError::Cancelled)));

        let mut buf = [0u8; 1];
        let read = tokio::time::timeout(Duration::from_millis(50), server.read(&mut buf)).await;
        assert!(read.is_err(), "nothing should have been written");
    }
}
