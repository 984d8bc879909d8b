//! Shared Application State
//!
//! This module defines the `AppState` struct, which holds the resources every
//! relay connection shares: the stream connector and the bridge settings.

use homefix_core::{BridgeConfig, IdGenerator, StreamConnector};
use std::sync::Arc;

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub connector: Arc<dyn StreamConnector>,
    pub ids: Arc<dyn IdGenerator>,
    pub bridge_config: Arc<BridgeConfig>,
}
