//! Session state tracking.
//!
//! Input-side state (prompt and content identifiers, the audio window) is
//! owned by the bridge and mutated only from client-driven calls. Output-side
//! state (the role and generation stage of the content unit currently being
//! received) is owned by the response pump. The one value read across tasks,
//! whether an audio window is open, is an atomic shared with the keepalive task.

use crate::event::Role;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Identifiers and audio-window state for one session.
#[derive(Debug)]
pub struct SessionTracker {
    prompt_name: String,
    system_content_name: String,
    pub(crate) audio: AudioWindow,
}

impl SessionTracker {
    pub fn new(prompt_name: String, system_content_name: String, audio_content_name: String) -> Self {
        Self {
            prompt_name,
            system_content_name,
            audio: AudioWindow::new(audio_content_name),
        }
    }

    pub fn prompt_name(&self) -> &str {
        &self.prompt_name
    }

    pub fn system_content_name(&self) -> &str {
        &self.system_content_name
    }

    /// The content identifier the current (or next) user audio unit uses.
    pub fn audio_content_name(&self) -> &str {
        self.audio.content_name()
    }

    pub fn audio_window(&self) -> &AudioWindow {
        &self.audio
    }
}

/// At most one open user audio content unit.
#[derive(Debug)]
pub struct AudioWindow {
    content_name: String,
    open: Arc<AtomicBool>,
    data_sent: bool,
}

impl AudioWindow {
    fn new(content_name: String) -> Self {
        Self {
            content_name,
            open: Arc::new(AtomicBool::new(false)),
            data_sent: false,
        }
    }

    pub fn content_name(&self) -> &str {
        &self.content_name
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    /// Whether at least one chunk went out since the window opened.
    pub fn has_data(&self) -> bool {
        self.data_sent
    }

    /// A read-only view of the open flag for other tasks.
    pub(crate) fn open_flag(&self) -> Arc<AtomicBool> {
        self.open.clone()
    }

    pub(crate) fn mark_open(&mut self) {
        self.open.store(true, Ordering::Release);
        self.data_sent = false;
    }

    pub(crate) fn mark_data_sent(&mut self) {
        self.data_sent = true;
    }

    /// Closes or abandons the window and moves to a fresh identifier so a
    /// late chunk can never reuse the old one.
    pub(crate) fn rotate(&mut self, next_content_name: String) {
        self.content_name = next_content_name;
        self.data_sent = false;
        self.open.store(false, Ordering::Release);
    }
}

/// Role and generation stage of the output content unit being received.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct OutputState {
    role: Option<Role>,
    generation_stage: Option<String>,
}

impl OutputState {
    /// Resets the state for a newly opened output content unit.
    pub fn on_content_start(&mut self, role: Option<Role>, generation_stage: Option<String>) {
        self.role = role;
        self.generation_stage = generation_stage;
    }

    /// Only assistant-authored deltas reach the client.
    pub fn is_assistant(&self) -> bool {
        self.role == Some(Role::Assistant)
    }

    pub fn role(&self) -> Option<Role> {
        self.role
    }

    pub fn generation_stage(&self) -> Option<&str> {
        self.generation_stage.as_deref()
    }
}
