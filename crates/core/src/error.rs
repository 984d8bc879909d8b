//! Error types shared by the bridge and its transports.

use crate::bridge::BridgeState;
use thiserror::Error;

/// Failures raised by a duplex stream implementation.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The stream could not be opened.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// The outbound half has already been closed.
    #[error("Stream closed")]
    Closed,

    /// Any other provider-side failure while reading or writing.
    #[error("Provider error: {0}")]
    Provider(String),
}

/// Errors returned by the public bridge operations.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Opening the duplex stream failed during `start()`.
    #[error("failed to open duplex stream: {0}")]
    Connect(#[source] TransportError),

    /// Writing one frame to the duplex stream failed.
    #[error("failed to send `{event}` event: {source}")]
    Send {
        event: &'static str,
        #[source]
        source: TransportError,
    },

    /// An outbound event could not be serialized.
    #[error("failed to encode event: {0}")]
    Encode(#[from] serde_json::Error),

    /// The operation is not allowed in the bridge's current state.
    #[error("bridge is {actual:?}, operation requires {expected:?}")]
    InvalidState {
        expected: BridgeState,
        actual: BridgeState,
    },
}

pub type BridgeResult<T> = Result<T, BridgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bridge_error_display() {
        let err = BridgeError::Send {
            event: "audioInput",
            source: TransportError::Closed,
        };
        assert_eq!(err.to_string(), "failed to send `audioInput` event: Stream closed");

        let err = BridgeError::InvalidState {
            expected: BridgeState::Active,
            actual: BridgeState::Idle,
        };
        assert_eq!(err.to_string(), "bridge is Idle, operation requires Active");

        let err = BridgeError::Connect(TransportError::ConnectionFailed("denied".into()));
        assert_eq!(
            err.to_string(),
            "failed to open duplex stream: Connection failed: denied"
        );
    }
}
