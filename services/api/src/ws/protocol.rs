//! Defines the WebSocket message protocol between the browser client and the API server.

use homefix_core::{AudioDelta, TextDelta};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Message types the relay understands.
const KNOWN_TYPES: &[&str] = &["ping", "start_audio", "audio_chunk", "end_audio", "text", "stop"];

/// Messages sent from the client (browser) to the server.
#[derive(Deserialize, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Liveness check, answered with `pong`.
    Ping,
    /// Opens a user audio window.
    StartAudio,
    /// Base64 PCM (16 kHz, 16-bit, mono). Opens a window if none is open.
    AudioChunk {
        #[serde(default)]
        content: String,
    },
    /// Closes the current user audio window.
    EndAudio,
    /// A typed user turn.
    Text { content: String },
    /// Ends the session.
    Stop,
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ProtocolError {
    #[error("Unknown message type: {0}")]
    UnknownType(String),
    #[error("Invalid message: {0}")]
    Malformed(String),
}

impl ClientMessage {
    /// Parses one text frame. Unrecognized `type` values are reported by name.
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        let value: Value =
            serde_json::from_str(text).map_err(|e| ProtocolError::Malformed(e.to_string()))?;

        match value.get("type") {
            Some(Value::String(kind)) if KNOWN_TYPES.contains(&kind.as_str()) => {
                serde_json::from_value(value).map_err(|e| ProtocolError::Malformed(e.to_string()))
            }
            Some(Value::String(kind)) => Err(ProtocolError::UnknownType(kind.clone())),
            Some(other) => Err(ProtocolError::UnknownType(other.to_string())),
            None => Err(ProtocolError::UnknownType("null".to_string())),
        }
    }
}

/// Messages sent from the server to the client (browser).
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    /// The bridge is active. Sent once, right after the session opened.
    Ready { prompt_name: String },
    Pong,
    AssistantText {
        content: String,
        generation_stage: Option<String>,
    },
    /// A chunk of assistant speech (base64 PCM, 24 kHz).
    AssistantAudio {
        content: String,
        media_type: &'static str,
        sample_rate_hertz: u32,
        sample_size_bits: u16,
        channel_count: u16,
    },
    /// Reports an error to the client.
    Error { message: String },
}

impl From<TextDelta> for ServerMessage {
    fn from(delta: TextDelta) -> Self {
        Self::AssistantText {
            content: delta.content,
            generation_stage: delta.generation_stage,
        }
    }
}

impl From<AudioDelta> for ServerMessage {
    fn from(delta: AudioDelta) -> Self {
        Self::AssistantAudio {
            content: delta.content,
            media_type: delta.media_type,
            sample_rate_hertz: delta.sample_rate_hertz,
            sample_size_bits: delta.sample_size_bits,
            channel_count: delta.channel_count,
        }
    }
}
