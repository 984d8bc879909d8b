//! In-memory duplex stream used by the unit tests.

use crate::{
    error::TransportError,
    transport::{DuplexStream, FrameSink, FrameSource, StreamConnector},
};
use async_trait::async_trait;
use bytes::Bytes;
use serde_json::Value;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// Everything written to a [`RecordingSink`], decoded back to JSON.
#[derive(Clone, Default)]
pub(crate) struct Recorded {
    inner: Arc<Mutex<RecordedInner>>,
}

#[derive(Default)]
struct RecordedInner {
    frames: Vec<Value>,
    closes: usize,
    fail_sends: bool,
}

impl Recorded {
    pub(crate) fn frames(&self) -> Vec<Value> {
        self.inner.lock().unwrap().frames.clone()
    }

    /// The envelope key of every frame, in write order.
    pub(crate) fn names(&self) -> Vec<String> {
        self.frames()
            .iter()
            .map(|frame| {
                frame["event"]
                    .as_object()
                    .and_then(|event| event.keys().next().cloned())
                    .unwrap_or_default()
            })
            .collect()
    }

    pub(crate) fn clear(&self) {
        self.inner.lock().unwrap().frames.clear();
    }

    pub(crate) fn closes(&self) -> usize {
        self.inner.lock().unwrap().closes
    }

    pub(crate) fn fail_sends(&self) {
        self.inner.lock().unwrap().fail_sends = true;
    }
}

pub(crate) struct RecordingSink {
    recorded: Recorded,
}

#[async_trait]
impl FrameSink for RecordingSink {
    async fn send(&mut self, frame: Bytes) -> Result<(), TransportError> {
        let mut inner = self.recorded.inner.lock().unwrap();
        if inner.fail_sends || inner.closes > 0 {
            return Err(TransportError::Closed);
        }
        inner.frames.push(serde_json::from_slice(&frame).unwrap());
        Ok(())
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.recorded.inner.lock().unwrap().closes += 1;
        Ok(())
    }
}

pub(crate) type Inbound = mpsc::UnboundedSender<Result<Option<Bytes>, TransportError>>;

/// Yields whatever the test pushes through the paired [`Inbound`] sender.
/// Once the sender is dropped the source behaves like a remote end-of-stream.
pub(crate) struct ScriptedSource {
    rx: mpsc::UnboundedReceiver<Result<Option<Bytes>, TransportError>>,
}

#[async_trait]
impl FrameSource for ScriptedSource {
    async fn recv(&mut self) -> Result<Option<Bytes>, TransportError> {
        match self.rx.recv().await {
            Some(item) => item,
            None => Ok(None),
        }
    }
}

pub(crate) fn scripted_source() -> (Inbound, ScriptedSource) {
    let (tx, rx) = mpsc::unbounded_channel();
    (tx, ScriptedSource { rx })
}

pub(crate) fn recording_sink() -> (Recorded, RecordingSink) {
    let recorded = Recorded::default();
    (
        recorded.clone(),
        RecordingSink {
            recorded: recorded.clone(),
        },
    )
}

/// Hands out a single in-memory stream.
pub(crate) struct FakeConnector {
    stream: Mutex<Option<DuplexStream>>,
}

impl FakeConnector {
    /// Returns the connector plus handles to observe writes and script reads.
    pub(crate) fn new() -> (Arc<Self>, Recorded, Inbound) {
        let (recorded, sink) = recording_sink();
        let (inbound, source) = scripted_source();
        let connector = Arc::new(Self {
            stream: Mutex::new(Some(DuplexStream {
                sink: Box::new(sink),
                source: Box::new(source),
            })),
        });
        (connector, recorded, inbound)
    }
}

#[async_trait]
impl StreamConnector for FakeConnector {
    async fn connect(&self, _model_id: &str) -> Result<DuplexStream, TransportError> {
        self.stream
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| TransportError::ConnectionFailed("already connected".into()))
    }
}

pub(crate) fn frame(json: &str) -> Result<Option<Bytes>, TransportError> {
    Ok(Some(Bytes::copy_from_slice(json.as_bytes())))
}
