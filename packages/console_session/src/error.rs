//! Error types for the session layer.
//!
//! None of these are fatal to a session. Transport errors are always followed
//! by a close (and therefore a scheduled reconnect); decode errors drop the
//! offending frame and leave the controller state untouched.

use tokio_tungstenite::tungstenite;

/// Failure of the underlying WebSocket connection.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("connection refused")]
    Refused,

    #[error("connection reset")]
    Reset,

    #[error("protocol failure: {0}")]
    Protocol(String),

    #[error("i/o failure: {0}")]
    Io(String),
}

impl TransportError {
    /// Classify a tungstenite error into the session taxonomy.
    pub fn from_tungstenite(err: &tungstenite::Error) -> Self {
        match err {
            tungstenite::Error::Io(io_err) => match io_err.kind() {
                std::io::ErrorKind::ConnectionRefused => Self::Refused,
                std::io::ErrorKind::ConnectionReset
                | std::io::ErrorKind::ConnectionAborted
                | std::io::ErrorKind::BrokenPipe
                | std::io::ErrorKind::UnexpectedEof => Self::Reset,
                _ => Self::Io(io_err.to_string()),
            },
            tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed => Self::Reset,
            other => Self::Protocol(other.to_string()),
        }
    }
}

/// A server frame that could not be turned into a [`crate::ServerMessage`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("malformed frame: {0}")]
    Malformed(String),

    #[error("frame has no type tag")]
    MissingType,

    #[error("invalid `{kind}` frame: {reason}")]
    InvalidFields { kind: String, reason: String },
}

/// The configured endpoint could not be turned into a WebSocket URL.
#[derive(Debug, thiserror::Error)]
pub enum EndpointError {
    #[error("invalid url `{input}`: {source}")]
    InvalidUrl {
        input: String,
        #[source]
        source: url::ParseError,
    },

    #[error("unsupported scheme `{0}` (expected ws or wss)")]
    UnsupportedScheme(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refused_io_error_is_classified() {
        let err = tungstenite::Error::Io(std::io::Error::from(
            std::io::ErrorKind::ConnectionRefused,
        ));
        assert_eq!(TransportError::from_tungstenite(&err), TransportError::Refused);
    }

    #[test]
    fn reset_kinds_collapse_to_reset() {
        for kind in [
            std::io::ErrorKind::ConnectionReset,
            std::io::ErrorKind::ConnectionAborted,
            std::io::ErrorKind::BrokenPipe,
        ] {
            let err = tungstenite::Error::Io(std::io::Error::from(kind));
            assert_eq!(TransportError::from_tungstenite(&err), TransportError::Reset);
        }
        assert_eq!(
            TransportError::from_tungstenite(&tungstenite::Error::ConnectionClosed),
            TransportError::Reset
        );
    }

    #[test]
    fn other_errors_are_protocol_failures() {
        assert!(matches!(
            TransportError::from_tungstenite(&tungstenite::Error::AttackAttempt),
            TransportError::Protocol(_)
        ));
    }
}
