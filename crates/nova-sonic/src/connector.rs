//! Duplex transport backed by `InvokeModelWithBidirectionalStream`.

use std::time::Duration;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_bedrockruntime::Client as BedrockClient;
use aws_sdk_bedrockruntime::types::error::InvokeModelWithBidirectionalStreamInputError;
use aws_sdk_bedrockruntime::types::{
    BidirectionalInputPayloadPart, InvokeModelWithBidirectionalStreamInput,
    InvokeModelWithBidirectionalStreamOutput,
};
use aws_smithy_types::Blob;
use aws_smithy_types::error::display::DisplayErrorContext;
use bytes::Bytes;
use futures_util::Stream;
use homefix_core::{DuplexStream, FrameSink, FrameSource, StreamConnector, TransportError};
use secrecy::ExposeSecret;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::config::{SonicClientConfig, SonicConfigError};

/// Upper bound on stream setup.
const CONNECTION_TIMEOUT_SECS: u64 = 30;
const OUTBOUND_CHANNEL_CAPACITY: usize = 256;
const INBOUND_CHANNEL_CAPACITY: usize = 256;

type InboundItem = Result<Option<Bytes>, TransportError>;

#[derive(Clone, Debug)]
pub struct NovaSonicConnector {
    client: BedrockClient,
}

impl NovaSonicConnector {
    /// Builds the Bedrock Runtime client. Explicit credentials win over the
    /// default provider chain.
    pub async fn new(config: &SonicClientConfig) -> Result<Self, SonicConfigError> {
        config.validate()?;

        let loader = aws_config::defaults(BehaviorVersion::latest())
            .region(aws_config::Region::new(config.region.clone()));
        let loader = match &config.credentials {
            Some(credentials) => {
                loader.credentials_provider(aws_credential_types::Credentials::new(
                    credentials.access_key_id.clone(),
                    credentials.secret_access_key.expose_secret(),
                    credentials.session_token.clone(),
                    None,
                    "homefix",
                ))
            }
            None => loader,
        };
        let sdk_config = loader.load().await;

        let bedrock_config = aws_sdk_bedrockruntime::config::Builder::from(&sdk_config)
            .endpoint_url(config.endpoint_url())
            .build();

        info!(
            region = %config.region,
            endpoint = %config.endpoint_url(),
            "Bedrock Runtime client configured"
        );
        Ok(Self {
            client: BedrockClient::from_conf(bedrock_config),
        })
    }
}

#[async_trait]
impl StreamConnector for NovaSonicConnector {
    async fn connect(&self, model_id: &str) -> Result<DuplexStream, TransportError> {
        let (outbound_tx, outbound_rx) = mpsc::channel::<Bytes>(OUTBOUND_CHANNEL_CAPACITY);
        let (inbound_tx, inbound_rx) = mpsc::channel::<InboundItem>(INBOUND_CHANNEL_CAPACITY);
        let (connected_tx, connected_rx) = oneshot::channel::<Result<(), TransportError>>();

        let request = self
            .client
            .invoke_model_with_bidirectional_stream()
            .model_id(model_id);

        let connection = tokio::spawn(async move {
            let body = request_body(outbound_rx);
            let output = match request.body(body.into()).send().await {
                Ok(output) => {
                    let _ = connected_tx.send(Ok(()));
                    output
                }
                Err(e) => {
                    let _ = connected_tx.send(Err(TransportError::ConnectionFailed(
                        DisplayErrorContext(&e).to_string(),
                    )));
                    return;
                }
            };

            // The task outlives the frame source so that frames written after
            // the reader is gone, such as promptEnd and sessionEnd, still reach
            // the service. It ends with the response stream.
            let mut response = output.body;
            let mut reader = Some(inbound_tx);
            loop {
                let item = match response.recv().await {
                    Ok(Some(InvokeModelWithBidirectionalStreamOutput::Chunk(part))) => Ok(Some(
                        part.bytes
                            .map(|blob| Bytes::from(blob.into_inner()))
                            .unwrap_or_default(),
                    )),
                    Ok(Some(_)) => {
                        debug!("Ignoring non-chunk output event");
                        Ok(Some(Bytes::new()))
                    }
                    Ok(None) => {
                        info!("Nova Sonic response stream ended");
                        Ok(None)
                    }
                    Err(e) => {
                        warn!(error = %DisplayErrorContext(&e), "Nova Sonic response stream failed");
                        Err(TransportError::Provider(DisplayErrorContext(&e).to_string()))
                    }
                };
                let finished = !matches!(item, Ok(Some(_)));
                let reader_gone = match &reader {
                    Some(tx) => tx.send(item).await.is_err(),
                    None => false,
                };
                if reader_gone {
                    debug!("Frame source dropped, draining the response until it ends");
                    reader = None;
                }
                if finished {
                    break;
                }
            }
        });

        match tokio::time::timeout(Duration::from_secs(CONNECTION_TIMEOUT_SECS), connected_rx).await {
            Ok(Ok(Ok(()))) => {
                info!(model_id, "Nova Sonic stream opened");
                Ok(duplex_halves(outbound_tx, inbound_rx))
            }
            Ok(Ok(Err(e))) => Err(e),
            Ok(Err(_)) => {
                connection.abort();
                Err(TransportError::ConnectionFailed(
                    "Connection channel closed unexpectedly".to_string(),
                ))
            }
            Err(_) => {
                connection.abort();
                Err(TransportError::ConnectionFailed(
                    "Connection timeout".to_string(),
                ))
            }
        }
    }
}

/// The request body: one `chunk` part per outbound frame. It ends once the
/// sink is closed or dropped and every buffered frame has been yielded.
fn request_body(
    mut outbound_rx: mpsc::Receiver<Bytes>,
) -> impl Stream<
    Item = Result<
        InvokeModelWithBidirectionalStreamInput,
        InvokeModelWithBidirectionalStreamInputError,
    >,
> {
    async_stream::stream! {
        while let Some(frame) = outbound_rx.recv().await {
            let part = BidirectionalInputPayloadPart::builder()
                .bytes(Blob::new(frame.to_vec()))
                .build();
            yield Ok::<_, InvokeModelWithBidirectionalStreamInputError>(
                InvokeModelWithBidirectionalStreamInput::Chunk(part),
            );
        }
        debug!("Outbound frame channel closed, ending request body");
    }
}

/// Wraps the two channels of a connection as a [`DuplexStream`].
///
/// Neither half owns the connection task, so dropping the source does not
/// cut off frames still queued behind the sink.
fn duplex_halves(
    outbound_tx: mpsc::Sender<Bytes>,
    inbound_rx: mpsc::Receiver<InboundItem>,
) -> DuplexStream {
    DuplexStream {
        sink: Box::new(SonicSink {
            tx: Some(outbound_tx),
        }),
        source: Box::new(SonicSource { rx: inbound_rx }),
    }
}

/// Writes frames into the request body stream.
struct SonicSink {
    tx: Option<mpsc::Sender<Bytes>>,
}

#[async_trait]
impl FrameSink for SonicSink {
    async fn send(&mut self, frame: Bytes) -> Result<(), TransportError> {
        let tx = self.tx.as_ref().ok_or(TransportError::Closed)?;
        tx.send(frame).await.map_err(|_| TransportError::Closed)
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.tx.take();
        Ok(())
    }
}

/// Reads frames forwarded by the connection task.
struct SonicSource {
    rx: mpsc::Receiver<InboundItem>,
}

#[async_trait]
impl FrameSource for SonicSource {
    async fn recv(&mut self) -> Result<Option<Bytes>, TransportError> {
        match self.rx.recv().await {
            Some(item) => item,
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;
    use homefix_core::{BridgeConfig, SequentialIds, SessionBridge};
    use std::sync::{Arc, Mutex};

    /// Hands out one prepared stream.
    struct PreparedConnector(Mutex<Option<DuplexStream>>);

    #[async_trait]
    impl StreamConnector for PreparedConnector {
        async fn connect(&self, _model_id: &str) -> Result<DuplexStream, TransportError> {
            self.0
                .lock()
                .unwrap()
                .take()
                .ok_or_else(|| TransportError::ConnectionFailed("already used".into()))
        }
    }

    /// Drives the request body the way the SDK does and returns the event
    /// name of every chunk it carried.
    async fn drain_body(outbound_rx: mpsc::Receiver<Bytes>) -> Vec<String> {
        let mut body = Box::pin(request_body(outbound_rx));
        let mut names = Vec::new();
        while let Some(part) = body.next().await {
            let InvokeModelWithBidirectionalStreamInput::Chunk(part) = part.unwrap() else {
                panic!("only chunk parts are sent");
            };
            let bytes = part.bytes.expect("chunk carries bytes").into_inner();
            let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
            names.extend(
                value["event"]
                    .as_object()
                    .and_then(|event| event.keys().next().cloned()),
            );
        }
        names
    }

    #[tokio::test]
    async fn test_close_delivers_teardown_frames_to_the_body() {
        let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_CHANNEL_CAPACITY);
        let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_CHANNEL_CAPACITY);
        let body = tokio::spawn(drain_body(outbound_rx));

        let connector = Arc::new(PreparedConnector(Mutex::new(Some(duplex_halves(
            outbound_tx,
            inbound_rx,
        )))));
        let (mut bridge, _events) = SessionBridge::new(
            BridgeConfig::default(),
            connector,
            Arc::new(SequentialIds::new("id")),
        );

        bridge.start().await.unwrap();
        bridge.close().await;

        let names = tokio::time::timeout(Duration::from_secs(5), body)
            .await
            .expect("request body ends after close")
            .unwrap();
        assert_eq!(
            names,
            [
                "sessionStart",
                "promptStart",
                "contentStart",
                "textInput",
                "contentEnd",
                "promptEnd",
                "sessionEnd"
            ]
        );
        drop(inbound_tx);
    }

    #[tokio::test]
    async fn test_dropping_source_keeps_sink_usable() {
        let (outbound_tx, mut outbound_rx) = mpsc::channel(4);
        let (_inbound_tx, inbound_rx) = mpsc::channel(4);
        let DuplexStream { mut sink, source } = duplex_halves(outbound_tx, inbound_rx);

        drop(source);
        sink.send(Bytes::from_static(b"{}")).await.unwrap();
        assert_eq!(outbound_rx.recv().await.unwrap(), Bytes::from_static(b"{}"));
    }

    #[tokio::test]
    async fn test_sink_forwards_until_closed() {
        let (tx, mut rx) = mpsc::channel(4);
        let mut sink = SonicSink { tx: Some(tx) };

        sink.send(Bytes::from_static(b"{}")).await.unwrap();
        assert_eq!(rx.recv().await.unwrap(), Bytes::from_static(b"{}"));

        sink.close().await.unwrap();
        assert!(rx.recv().await.is_none());
        assert!(matches!(
            sink.send(Bytes::from_static(b"{}")).await,
            Err(TransportError::Closed)
        ));
    }

    #[tokio::test]
    async fn test_sink_reports_dropped_body() {
        let (tx, rx) = mpsc::channel(4);
        drop(rx);
        let mut sink = SonicSink { tx: Some(tx) };
        assert!(matches!(
            sink.send(Bytes::from_static(b"{}")).await,
            Err(TransportError::Closed)
        ));
    }

    #[tokio::test]
    async fn test_source_relays_items_then_ends() {
        let (tx, rx) = mpsc::channel(4);
        let mut source = SonicSource { rx };

        tx.send(Ok(Some(Bytes::from_static(b"a")))).await.unwrap();
        tx.send(Err(TransportError::Provider("boom".into())))
            .await
            .unwrap();
        drop(tx);

        assert_eq!(
            source.recv().await.unwrap(),
            Some(Bytes::from_static(b"a"))
        );
        assert!(matches!(
            source.recv().await,
            Err(TransportError::Provider(msg)) if msg == "boom"
        ));
        assert_eq!(source.recv().await.unwrap(), None);
    }
}
