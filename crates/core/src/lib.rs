//! Bidirectional session bridge for the homeFix voice assistant.
//!
//! The bridge drives one long-lived duplex stream with a speech-to-speech
//! generation service: it opens the session, multiplexes user audio and text
//! turns onto the stream, keeps the session alive while the user is silent,
//! and turns the service's output into [`BridgeEvent`]s for the relay.

pub mod bridge;
pub mod config;
pub mod error;
pub mod event;
pub mod generic_types;
pub mod ids;
mod keepalive;
mod pump;
pub mod sender;
pub mod tracker;
pub mod transport;

#[cfg(test)]
mod testing;

pub use bridge::{BridgeState, SessionBridge};
pub use config::BridgeConfig;
pub use error::{BridgeError, BridgeResult, TransportError};
pub use generic_types::{AudioDelta, BridgeEvent, TextDelta};
pub use ids::{IdGenerator, SequentialIds, UuidGenerator};
pub use transport::{DuplexStream, FrameSink, FrameSource, StreamConnector};
