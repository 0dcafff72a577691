/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The connection was closed.
    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    /// Establishing the connection failed.
    #[error("connect failed: {0}")]
    ConnectFailed(#[source] std::io::Error),

    /// Sending data failed.
    #[error("send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    /// Receiving data failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] std::io::Error),

    /// The payload does not fit in a single frame.
    #[error("frame too large: {0} bytes")]
    FrameTooLarge(usize),

    /// The caller cancelled the send before it was written.
    #[error("send cancelled")]
    Cancelled,
}

impl TransportError {
    /// Returns `true` if the error means the connection is gone for good.
    pub fn is_disconnect(&self) -> bool {
        matches!(
            self,
            Self::ConnectionClosed(_) | Self::SendFailed(_) | Self::ReceiveFailed(_)
        )
    }
}
