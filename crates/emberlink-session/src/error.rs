//! Error types for the session layer.

use emberlink_protocol::ProtocolError;
use emberlink_throttle::ThrottleError;
use emberlink_transport::TransportError;

/// A command was refused locally, before anything was sent.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PreconditionViolation {
    /// An argument failed packet validation (oversized string, bad enum
    /// value, ...).
    #[error("invalid argument: {0}")]
    Invalid(#[from] ProtocolError),

    /// The command needs an open window and there isn't one.
    #[error("{0} window is not open")]
    NotOpen(&'static str),

    /// The command names something the session doesn't know about.
    #[error("unknown {what} {id}")]
    NotFound { what: &'static str, id: u64 },

    /// The current state doesn't allow the command.
    #[error("not allowed: {0}")]
    NotAllowed(&'static str),
}

/// Errors returned by subsystem commands.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Refused locally. Nothing was sent and no state changed.
    #[error("precondition failed: {0}")]
    Precondition(#[from] PreconditionViolation),

    /// The transport failed the send. No state changed.
    #[error("transport failure: {0}")]
    Transport(#[source] TransportError),

    /// The caller's cancellation token fired while waiting or sending.
    #[error("cancelled")]
    Cancelled,

    /// The subsystem was disposed.
    #[error("subsystem disposed")]
    Disposed,
}

impl SessionError {
    /// Shorthand for [`PreconditionViolation::NotOpen`].
    pub fn not_open(window: &'static str) -> Self {
        Self::Precondition(PreconditionViolation::NotOpen(window))
    }

    /// Shorthand for [`PreconditionViolation::NotFound`].
    pub fn not_found(what: &'static str, id: impl Into<u64>) -> Self {
        Self::Precondition(PreconditionViolation::NotFound {
            what,
            id: id.into(),
        })
    }

    /// Shorthand for [`PreconditionViolation::NotAllowed`].
    pub fn not_allowed(reason: &'static str) -> Self {
        Self::Precondition(PreconditionViolation::NotAllowed(reason))
    }

    /// Returns `true` if the command was refused before any I/O.
    pub fn is_precondition(&self) -> bool {
        matches!(self, Self::Precondition(_))
    }
}

impl From<ProtocolError> for SessionError {
    fn from(err: ProtocolError) -> Self {
        Self::Precondition(PreconditionViolation::Invalid(err))
    }
}

impl From<TransportError> for SessionError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Cancelled => Self::Cancelled,
            other => Self::Transport(other),
        }
    }
}

impl From<ThrottleError> for SessionError {
    fn from(err: ThrottleError) -> Self {
        match err {
            ThrottleError::Cancelled => Self::Cancelled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_cancel_maps_to_cancelled() {
        let err = SessionError::from(TransportError::Cancelled);
        assert!(matches!(err, SessionError::Cancelled));
    }

    #[test]
    fn test_transport_failure_is_kept() {
        let err = SessionError::from(TransportError::ConnectionClosed("eof".into()));
        assert!(matches!(err, SessionError::Transport(TransportError::ConnectionClosed(_))));
    }

    #[test]
    fn test_protocol_error_is_precondition() {
        let err = SessionError::from(ProtocolError::Empty("target"));
        assert!(err.is_precondition());
        assert_eq!(err.to_string(), "precondition failed: invalid argument: target must not be empty");
    }

    #[test]
    fn test_not_found_display() {
        let err = SessionError::not_found("mail", 42u32);
        assert_eq!(err.to_string(), "precondition failed: unknown mail 42");
    }
}
