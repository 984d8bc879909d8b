//! Event envelope codec.
//!
//! Every frame exchanged with the generation service is a compact JSON object
//! of the form `{"event": {"<eventName>": { ... }}}`. Outbound events are
//! strongly typed; inbound frames are decoded only as far as the bridge needs
//! them, and any event it does not act on is reported as [`InboundEvent::Other`].

use bytes::Bytes;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Sample rate of the PCM audio the service speaks back with.
pub const OUTPUT_SAMPLE_RATE_HZ: u32 = 24_000;
/// Sample rate of the PCM audio the bridge sends as user input.
pub const INPUT_SAMPLE_RATE_HZ: u32 = 16_000;
pub const SAMPLE_SIZE_BITS: u16 = 16;
pub const CHANNEL_COUNT: u16 = 1;
pub const LPCM_MEDIA_TYPE: &str = "audio/lpcm";
pub const TEXT_MEDIA_TYPE: &str = "text/plain";

// --- Outbound ---

#[derive(Serialize)]
struct Envelope<'a> {
    event: &'a OutboundEvent,
}

/// An event the bridge writes to the duplex stream.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub enum OutboundEvent {
    SessionStart(SessionStart),
    PromptStart(PromptStart),
    ContentStart(ContentStart),
    TextInput(ContentInput),
    AudioInput(ContentInput),
    ContentEnd(ContentRef),
    PromptEnd(PromptRef),
    SessionEnd(SessionEnd),
}

impl OutboundEvent {
    /// The wire name of the event, as used for the envelope key.
    pub fn name(&self) -> &'static str {
        match self {
            OutboundEvent::SessionStart(_) => "sessionStart",
            OutboundEvent::PromptStart(_) => "promptStart",
            OutboundEvent::ContentStart(_) => "contentStart",
            OutboundEvent::TextInput(_) => "textInput",
            OutboundEvent::AudioInput(_) => "audioInput",
            OutboundEvent::ContentEnd(_) => "contentEnd",
            OutboundEvent::PromptEnd(_) => "promptEnd",
            OutboundEvent::SessionEnd(_) => "sessionEnd",
        }
    }

    /// Serializes the event inside its envelope as compact JSON.
    pub fn encode(&self) -> Result<Bytes, serde_json::Error> {
        serde_json::to_vec(&Envelope { event: self }).map(Bytes::from)
    }

    pub fn session_start(inference: InferenceConfiguration) -> Self {
        OutboundEvent::SessionStart(SessionStart {
            inference_configuration: inference,
        })
    }

    pub fn prompt_start(prompt_name: &str, voice_id: &str) -> Self {
        OutboundEvent::PromptStart(PromptStart {
            prompt_name: prompt_name.to_string(),
            text_output_configuration: TextConfiguration::plain(),
            audio_output_configuration: AudioOutputConfiguration {
                media_type: LPCM_MEDIA_TYPE.to_string(),
                sample_rate_hertz: OUTPUT_SAMPLE_RATE_HZ,
                sample_size_bits: SAMPLE_SIZE_BITS,
                channel_count: CHANNEL_COUNT,
                voice_id: voice_id.to_string(),
                encoding: "base64".to_string(),
                audio_type: "SPEECH".to_string(),
            },
        })
    }

    /// Opens a text content unit for the given role.
    pub fn text_content_start(
        prompt_name: &str,
        content_name: &str,
        role: Role,
        interactive: bool,
    ) -> Self {
        OutboundEvent::ContentStart(ContentStart {
            prompt_name: prompt_name.to_string(),
            content_name: content_name.to_string(),
            content_type: ContentType::Text,
            interactive,
            role,
            text_input_configuration: Some(TextConfiguration::plain()),
            audio_input_configuration: None,
        })
    }

    /// Opens an interactive user audio content unit (16 kHz / 16-bit / mono PCM).
    pub fn audio_content_start(prompt_name: &str, content_name: &str) -> Self {
        OutboundEvent::ContentStart(ContentStart {
            prompt_name: prompt_name.to_string(),
            content_name: content_name.to_string(),
            content_type: ContentType::Audio,
            interactive: true,
            role: Role::User,
            text_input_configuration: None,
            audio_input_configuration: Some(AudioInputConfiguration {
                media_type: LPCM_MEDIA_TYPE.to_string(),
                sample_rate_hertz: INPUT_SAMPLE_RATE_HZ,
                sample_size_bits: SAMPLE_SIZE_BITS,
                channel_count: CHANNEL_COUNT,
                audio_type: "SPEECH".to_string(),
                encoding: "base64".to_string(),
            }),
        })
    }

    pub fn text_input(prompt_name: &str, content_name: &str, content: &str) -> Self {
        OutboundEvent::TextInput(ContentInput::new(prompt_name, content_name, content))
    }

    pub fn audio_input(prompt_name: &str, content_name: &str, content: &str) -> Self {
        OutboundEvent::AudioInput(ContentInput::new(prompt_name, content_name, content))
    }

    pub fn content_end(prompt_name: &str, content_name: &str) -> Self {
        OutboundEvent::ContentEnd(ContentRef {
            prompt_name: prompt_name.to_string(),
            content_name: content_name.to_string(),
        })
    }

    pub fn prompt_end(prompt_name: &str) -> Self {
        OutboundEvent::PromptEnd(PromptRef {
            prompt_name: prompt_name.to_string(),
        })
    }

    pub fn session_end() -> Self {
        OutboundEvent::SessionEnd(SessionEnd {})
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionStart {
    pub inference_configuration: InferenceConfiguration,
}

/// Fixed sampling parameters declared once per session.
#[derive(Serialize, Debug, Clone, Copy, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InferenceConfiguration {
    pub max_tokens: u32,
    pub top_p: f64,
    pub temperature: f64,
}

impl Default for InferenceConfiguration {
    fn default() -> Self {
        Self {
            max_tokens: 1024,
            top_p: 0.9,
            temperature: 0.7,
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PromptStart {
    pub prompt_name: String,
    pub text_output_configuration: TextConfiguration,
    pub audio_output_configuration: AudioOutputConfiguration,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TextConfiguration {
    pub media_type: String,
}

impl TextConfiguration {
    fn plain() -> Self {
        Self {
            media_type: TEXT_MEDIA_TYPE.to_string(),
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AudioOutputConfiguration {
    pub media_type: String,
    pub sample_rate_hertz: u32,
    pub sample_size_bits: u16,
    pub channel_count: u16,
    pub voice_id: String,
    pub encoding: String,
    pub audio_type: String,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AudioInputConfiguration {
    pub media_type: String,
    pub sample_rate_hertz: u32,
    pub sample_size_bits: u16,
    pub channel_count: u16,
    pub audio_type: String,
    pub encoding: String,
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum ContentType {
    Text,
    Audio,
}

/// Speaker role of a content unit.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
    #[serde(other)]
    Other,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ContentStart {
    pub prompt_name: String,
    pub content_name: String,
    #[serde(rename = "type")]
    pub content_type: ContentType,
    pub interactive: bool,
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_input_configuration: Option<TextConfiguration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_input_configuration: Option<AudioInputConfiguration>,
}

/// Payload of a `textInput` or `audioInput` event.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ContentInput {
    pub prompt_name: String,
    pub content_name: String,
    pub content: String,
}

impl ContentInput {
    fn new(prompt_name: &str, content_name: &str, content: &str) -> Self {
        Self {
            prompt_name: prompt_name.to_string(),
            content_name: content_name.to_string(),
            content: content.to_string(),
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ContentRef {
    pub prompt_name: String,
    pub content_name: String,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PromptRef {
    pub prompt_name: String,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct SessionEnd {}

// --- Inbound ---

#[derive(Deserialize)]
struct InboundEnvelope {
    #[serde(default)]
    event: Option<Map<String, Value>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ContentStartPayload {
    #[serde(default, deserialize_with = "lenient_role")]
    role: Option<Role>,
    #[serde(default)]
    additional_model_fields: Option<Value>,
}

#[derive(Deserialize)]
struct OutputPayload {
    #[serde(default)]
    content: Option<String>,
}

/// A role that is not a string is treated as absent.
fn lenient_role<'de, D>(deserializer: D) -> Result<Option<Role>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        role @ Value::String(_) => serde_json::from_value(role).ok(),
        _ => None,
    })
}

/// A decoded inbound event.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    /// An output content unit opened.
    ContentStart {
        role: Option<Role>,
        generation_stage: Option<String>,
    },
    TextOutput {
        content: String,
    },
    AudioOutput {
        content: String,
    },
    /// Any event the bridge does not act on, keyed by its first event name.
    Other(Option<String>),
}

impl InboundEvent {
    /// Decodes one inbound frame.
    ///
    /// Only malformed JSON is an error. A malformed `additionalModelFields`
    /// degrades to an absent generation stage.
    pub fn decode(frame: &[u8]) -> Result<Self, serde_json::Error> {
        let envelope: InboundEnvelope = serde_json::from_slice(frame)?;
        let mut event = envelope.event.unwrap_or_default();

        if let Some(payload) = event.remove("contentStart") {
            let payload: ContentStartPayload = serde_json::from_value(payload)?;
            return Ok(InboundEvent::ContentStart {
                role: payload.role,
                generation_stage: payload
                    .additional_model_fields
                    .and_then(generation_stage),
            });
        }
        if let Some(payload) = event.remove("textOutput") {
            let payload: OutputPayload = serde_json::from_value(payload)?;
            return Ok(InboundEvent::TextOutput {
                content: payload.content.unwrap_or_default(),
            });
        }
        if let Some(payload) = event.remove("audioOutput") {
            let payload: OutputPayload = serde_json::from_value(payload)?;
            return Ok(InboundEvent::AudioOutput {
                content: payload.content.unwrap_or_default(),
            });
        }
        Ok(InboundEvent::Other(event.keys().next().cloned()))
    }
}

/// Extracts `generationStage` from `additionalModelFields`, which the service
/// sends as a JSON document embedded in a string.
fn generation_stage(fields: Value) -> Option<String> {
    let fields = match fields {
        Value::String(raw) => serde_json::from_str::<Value>(&raw).ok()?,
        nested @ Value::Object(_) => nested,
        _ => return None,
    };
    fields
        .get("generationStage")
        .and_then(Value::as_str)
        .map(str::to_string)
}
