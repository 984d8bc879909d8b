//! homeFix API Library Crate
//!
//! This library contains the HTTP service that relays browser voice sessions
//! to Amazon Nova Sonic: configuration, shared state, the health probe, the
//! WebSocket relay and routing. The `api` binary is a thin wrapper around it.

pub mod config;
pub mod handlers;
pub mod router;
pub mod state;
pub mod ws;
