//! Amazon Nova Sonic over Bedrock's bidirectional streaming API.
//!
//! Provides a [`homefix_core::StreamConnector`] that opens one
//! `InvokeModelWithBidirectionalStream` call per session. Each outbound frame
//! becomes one `chunk` payload part of the request body; each `chunk` part of
//! the response becomes one inbound frame.

pub mod config;
pub mod connector;

pub use config::{SonicClientConfig, SonicConfigError, StaticCredentials};
pub use connector::NovaSonicConnector;
