//! WebSocket Voice Relay
//!
//! This module relays one browser voice session to one bridge:
//!
//! - `protocol`: Defines the JSON-based message format for client-server communication.
//! - `session`: Manages the WebSocket connection lifecycle, from upgrade to teardown.

pub mod protocol;
pub mod session;

pub use session::ws_handler;
