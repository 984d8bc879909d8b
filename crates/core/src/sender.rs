//! The single write path onto the duplex stream.

use crate::{
    error::{BridgeError, BridgeResult, TransportError},
    event::OutboundEvent,
    transport::FrameSink,
};
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};
use tracing::debug;

/// Serializes writers onto one [`FrameSink`].
///
/// Cloning is cheap; all clones share the same sink and lock, so frames from
/// concurrent callers are totally ordered and never interleave.
#[derive(Clone)]
pub struct OutboundSender {
    sink: Arc<Mutex<Box<dyn FrameSink>>>,
}

impl OutboundSender {
    pub fn new(sink: Box<dyn FrameSink>) -> Self {
        Self {
            sink: Arc::new(Mutex::new(sink)),
        }
    }

    /// Writes a single event.
    pub async fn send(&self, event: &OutboundEvent) -> BridgeResult<()> {
        self.lock().await.send(event).await
    }

    /// Takes the write lock for a sequence of sends that must not be split.
    pub async fn lock(&self) -> SenderGuard<'_> {
        SenderGuard {
            sink: self.sink.lock().await,
        }
    }

    /// Closes the outbound half of the stream.
    pub async fn close(&self) -> Result<(), TransportError> {
        self.sink.lock().await.close().await
    }
}

/// Exclusive access to the stream for the guard's lifetime.
pub struct SenderGuard<'a> {
    sink: MutexGuard<'a, Box<dyn FrameSink>>,
}

impl SenderGuard<'_> {
    pub async fn send(&mut self, event: &OutboundEvent) -> BridgeResult<()> {
        let frame = event.encode()?;
        debug!(event = event.name(), bytes = frame.len(), "Sending event");
        self.sink
            .send(frame)
            .await
            .map_err(|source| BridgeError::Send {
                event: event.name(),
                source,
            })
    }

    /// Sends the events in order, stopping at the first failure.
    pub async fn send_all(&mut self, events: &[OutboundEvent]) -> BridgeResult<()> {
        for event in events {
            self.send(event).await?;
        }
        Ok(())
    }
}
