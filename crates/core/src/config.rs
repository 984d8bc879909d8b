//! Per-session bridge configuration.

use crate::event::InferenceConfiguration;
use std::time::Duration;

pub const DEFAULT_MODEL_ID: &str = "amazon.nova-sonic-v1:0";
pub const DEFAULT_VOICE_ID: &str = "matthew";
pub const DEFAULT_KEEPALIVE_INTERVAL: Duration = Duration::from_secs(25);

pub const DEFAULT_SYSTEM_PROMPT: &str = r#"You are homeFix, a friendly and practical home maintenance AI assistant.
Your job is to help users diagnose and fix problems with home appliances,
devices, and household systems, such as Kindle e-readers, TVs, routers,
washing machines, microwaves, smart home devices, and more.

When a user describes a problem (by voice or image), you will:
1. Identify the likely cause of the issue in simple, plain language
2. Ask one follow-up question if you need more detail before diagnosing
3. Provide 2-3 clear, step-by-step fixes the user can try themselves
4. Tell the user honestly if the issue likely requires a professional

Guidelines:
- Keep responses short and conversational (2-4 sentences max per turn)
- Avoid technical jargon; speak like a helpful neighbour, not a manual
- Always prioritize safety first (e.g. unplug before inspecting)
- If the user shares a photo of an error screen or broken device,
  describe what you see and explain what it means
- If unsure, suggest the most common fix first, then escalate

You do NOT:
- Diagnose backend server or cloud service outages
- Access or request any private user data
- Handle car, medical, or structural building issues

Always end your first response by asking:
"Can you describe what happened just before this issue started?"
"#;

/// Everything a bridge needs to open and drive one session.
#[derive(Debug, Clone, PartialEq)]
pub struct BridgeConfig {
    pub model_id: String,
    pub system_prompt: String,
    pub voice_id: String,
    pub inference: InferenceConfiguration,
    /// How long the session may sit without user audio before a silent turn is sent.
    pub keepalive_interval: Duration,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            model_id: DEFAULT_MODEL_ID.to_string(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            voice_id: DEFAULT_VOICE_ID.to_string(),
            inference: InferenceConfiguration::default(),
            keepalive_interval: DEFAULT_KEEPALIVE_INTERVAL,
        }
    }
}

impl BridgeConfig {
    /// The system prompt as sent to the service: trimmed, falling back to the
    /// default when blank.
    pub fn effective_system_prompt(&self) -> &str {
        match self.system_prompt.trim() {
            "" => DEFAULT_SYSTEM_PROMPT.trim(),
            prompt => prompt,
        }
    }
}
