//! The duplex stream capability the bridge is driven over.
//!
//! A session needs two independently owned halves: the outbound [`FrameSink`]
//! is shared by every writer behind the send mutex, while the inbound
//! [`FrameSource`] is owned exclusively by the response pump.

use crate::error::TransportError;
use async_trait::async_trait;
use bytes::Bytes;

/// The outbound half of a duplex stream.
#[async_trait]
pub trait FrameSink: Send {
    /// Writes one complete frame.
    async fn send(&mut self, frame: Bytes) -> Result<(), TransportError>;

    /// Closes the outbound half. Further sends fail with [`TransportError::Closed`].
    async fn close(&mut self) -> Result<(), TransportError>;
}

/// The inbound half of a duplex stream.
#[async_trait]
pub trait FrameSource: Send {
    /// Waits for the next frame.
    ///
    /// An empty frame means the remote delivered a frame with no payload.
    /// `Ok(None)` means the remote has ended the stream.
    async fn recv(&mut self) -> Result<Option<Bytes>, TransportError>;
}

/// Both halves of a freshly opened stream.
pub struct DuplexStream {
    pub sink: Box<dyn FrameSink>,
    pub source: Box<dyn FrameSource>,
}

/// Opens duplex streams against a generation service.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StreamConnector: Send + Sync {
    async fn connect(&self, model_id: &str) -> Result<DuplexStream, TransportError>;
}
