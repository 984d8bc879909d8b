//! Events the bridge delivers to whoever relays the session to a client.

use crate::event::{CHANNEL_COUNT, LPCM_MEDIA_TYPE, OUTPUT_SAMPLE_RATE_HZ, SAMPLE_SIZE_BITS};

/// A piece of assistant output or a fatal stream failure.
#[derive(Debug, Clone, PartialEq)]
pub enum BridgeEvent {
    /// A text delta authored by the assistant.
    Text(TextDelta),
    /// A chunk of assistant speech.
    Audio(AudioDelta),
    /// The response pump stopped. The session is no longer usable.
    Error(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextDelta {
    pub content: String,
    pub generation_stage: Option<String>,
}

/// Base64 PCM speech, always 24 kHz / 16-bit / mono.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioDelta {
    pub content: String,
    pub media_type: &'static str,
    pub sample_rate_hertz: u32,
    pub sample_size_bits: u16,
    pub channel_count: u16,
}

impl AudioDelta {
    pub fn lpcm(content: String) -> Self {
        Self {
            content,
            media_type: LPCM_MEDIA_TYPE,
            sample_rate_hertz: OUTPUT_SAMPLE_RATE_HZ,
            sample_size_bits: SAMPLE_SIZE_BITS,
            channel_count: CHANNEL_COUNT,
        }
    }
}
