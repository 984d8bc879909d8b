//! The bidirectional session bridge.
//!
//! One [`SessionBridge`] drives one duplex stream with the generation
//! service on behalf of one client connection. Client-driven calls write
//! input events; a background response pump turns inbound frames into
//! [`BridgeEvent`]s; a background keepalive task keeps an idle session open.

use crate::{
    config::BridgeConfig,
    error::{BridgeError, BridgeResult},
    event::{OutboundEvent, Role},
    generic_types::BridgeEvent,
    ids::IdGenerator,
    keepalive::Keepalive,
    pump,
    sender::OutboundSender,
    tracker::SessionTracker,
    transport::{DuplexStream, StreamConnector},
};
use std::sync::Arc;
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, info, warn};

/// Capacity of the channel carrying [`BridgeEvent`]s to the relay.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Lifecycle of a bridge. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeState {
    Idle,
    Starting,
    Active,
    Closing,
    Closed,
}

pub struct SessionBridge {
    config: BridgeConfig,
    connector: Arc<dyn StreamConnector>,
    ids: Arc<dyn IdGenerator>,
    events: mpsc::Sender<BridgeEvent>,
    state: BridgeState,
    session: SessionTracker,
    sender: Option<OutboundSender>,
    pump: Option<JoinHandle<()>>,
    keepalive: Option<JoinHandle<()>>,
}

impl SessionBridge {
    /// Creates an idle bridge and the receiver its events will arrive on.
    ///
    /// The prompt identifier, the system content identifier and the first
    /// user audio content identifier are drawn from `ids` here.
    pub fn new(
        config: BridgeConfig,
        connector: Arc<dyn StreamConnector>,
        ids: Arc<dyn IdGenerator>,
    ) -> (Self, mpsc::Receiver<BridgeEvent>) {
        let (events, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let session = SessionTracker::new(ids.next_id(), ids.next_id(), ids.next_id());
        let bridge = Self {
            config,
            connector,
            ids,
            events,
            state: BridgeState::Idle,
            session,
            sender: None,
            pump: None,
            keepalive: None,
        };
        (bridge, events_rx)
    }

    pub fn prompt_name(&self) -> &str {
        self.session.prompt_name()
    }

    pub fn state(&self) -> BridgeState {
        self.state
    }

    pub fn session(&self) -> &SessionTracker {
        &self.session
    }

    /// Opens the stream, declares the session and prompt, sends the system
    /// prompt, and spawns the response pump and keepalive tasks.
    ///
    /// May be called once. If any step fails the stream is closed and the
    /// bridge ends up [`BridgeState::Closed`].
    pub async fn start(&mut self) -> BridgeResult<()> {
        self.expect_state(BridgeState::Idle)?;
        self.state = BridgeState::Starting;

        match self.open_session().await {
            Ok(()) => {
                self.state = BridgeState::Active;
                info!(
                    prompt_name = %self.prompt_name(),
                    model_id = %self.config.model_id,
                    "Session bridge active"
                );
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Session bridge failed to start");
                if let Some(sender) = self.sender.take() {
                    let _ = sender.close().await;
                }
                self.state = BridgeState::Closed;
                Err(e)
            }
        }
    }

    async fn open_session(&mut self) -> BridgeResult<()> {
        let DuplexStream { sink, source } = self
            .connector
            .connect(&self.config.model_id)
            .await
            .map_err(BridgeError::Connect)?;
        let sender = OutboundSender::new(sink);
        self.sender = Some(sender.clone());

        let prompt_name = self.session.prompt_name();
        let system_content = self.session.system_content_name();
        sender
            .lock()
            .await
            .send_all(&[
                OutboundEvent::session_start(self.config.inference),
                OutboundEvent::prompt_start(prompt_name, &self.config.voice_id),
                OutboundEvent::text_content_start(prompt_name, system_content, Role::System, false),
                OutboundEvent::text_input(
                    prompt_name,
                    system_content,
                    self.config.effective_system_prompt(),
                ),
                OutboundEvent::content_end(prompt_name, system_content),
            ])
            .await?;

        self.pump = Some(tokio::spawn(pump::run(source, self.events.clone())));
        self.keepalive = Some(tokio::spawn(
            Keepalive {
                sender,
                prompt_name: prompt_name.to_string(),
                audio_open: self.session.audio.open_flag(),
                ids: self.ids.clone(),
                interval: self.config.keepalive_interval,
            }
            .run(),
        ));
        Ok(())
    }

    /// Opens a user audio content unit. Does nothing if one is already open.
    pub async fn start_audio_input(&mut self) -> BridgeResult<()> {
        let sender = self.active_sender()?;
        let mut out = sender.lock().await;
        if self.session.audio.is_open() {
            return Ok(());
        }
        out.send(&OutboundEvent::audio_content_start(
            self.session.prompt_name(),
            self.session.audio.content_name(),
        ))
        .await?;
        self.session.audio.mark_open();
        debug!(content_name = %self.session.audio.content_name(), "Audio input started");
        Ok(())
    }

    /// Sends one base64 PCM chunk, opening the audio window first if needed.
    pub async fn send_audio_base64_chunk(&mut self, content: &str) -> BridgeResult<()> {
        let sender = self.active_sender()?;
        let mut out = sender.lock().await;
        if !self.session.audio.is_open() {
            out.send(&OutboundEvent::audio_content_start(
                self.session.prompt_name(),
                self.session.audio.content_name(),
            ))
            .await?;
            self.session.audio.mark_open();
        }
        out.send(&OutboundEvent::audio_input(
            self.session.prompt_name(),
            self.session.audio.content_name(),
            content,
        ))
        .await?;
        self.session.audio.mark_data_sent();
        Ok(())
    }

    /// Closes the open audio window.
    ///
    /// A window that never carried data is abandoned without `contentEnd`,
    /// which the service rejects for an empty audio unit. Either way the
    /// window moves to a fresh content identifier.
    pub async fn end_audio_input(&mut self) -> BridgeResult<()> {
        let sender = self.active_sender()?;
        let mut out = sender.lock().await;
        if !self.session.audio.is_open() {
            return Ok(());
        }
        if self.session.audio.has_data() {
            out.send(&OutboundEvent::content_end(
                self.session.prompt_name(),
                self.session.audio.content_name(),
            ))
            .await?;
        } else {
            debug!("No audio sent since the window opened, abandoning it without contentEnd");
        }
        self.session.audio.rotate(self.ids.next_id());
        Ok(())
    }

    /// Sends one complete user text turn under a fresh content identifier.
    pub async fn send_text_input(&mut self, text: &str) -> BridgeResult<()> {
        let sender = self.active_sender()?;
        let prompt_name = self.session.prompt_name();
        let content_name = self.ids.next_id();
        let mut out = sender.lock().await;
        out.send_all(&[
            OutboundEvent::text_content_start(prompt_name, &content_name, Role::User, true),
            OutboundEvent::text_input(prompt_name, &content_name, text),
            OutboundEvent::content_end(prompt_name, &content_name),
        ])
        .await
    }

    /// Tears the session down. Safe to call any number of times.
    ///
    /// Background tasks are stopped before the stream is touched, so nothing
    /// else writes after `promptEnd`/`sessionEnd`. Teardown failures are
    /// ignored; the stream may already be half closed.
    pub async fn close(&mut self) {
        match self.state {
            BridgeState::Active => {}
            BridgeState::Idle => {
                self.state = BridgeState::Closed;
                return;
            }
            BridgeState::Starting | BridgeState::Closing | BridgeState::Closed => return,
        }
        self.state = BridgeState::Closing;

        for handle in [self.pump.take(), self.keepalive.take()].into_iter().flatten() {
            handle.abort();
            let _ = handle.await;
        }

        if let Some(sender) = self.sender.take() {
            let prompt_name = self.session.prompt_name();
            if let Err(e) = sender.send(&OutboundEvent::prompt_end(prompt_name)).await {
                debug!(error = %e, "promptEnd failed during close");
            } else if let Err(e) = sender.send(&OutboundEvent::session_end()).await {
                debug!(error = %e, "sessionEnd failed during close");
            }
            if let Err(e) = sender.close().await {
                debug!(error = %e, "Closing the stream failed");
            }
        }

        self.state = BridgeState::Closed;
        info!(prompt_name = %self.prompt_name(), "Session bridge closed");
    }

    fn expect_state(&self, expected: BridgeState) -> BridgeResult<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(BridgeError::InvalidState {
                expected,
                actual: self.state,
            })
        }
    }

    fn active_sender(&self) -> BridgeResult<OutboundSender> {
        self.expect_state(BridgeState::Active)?;
        self.sender.clone().ok_or(BridgeError::InvalidState {
            expected: BridgeState::Active,
            actual: self.state,
        })
    }
}

impl Drop for SessionBridge {
    fn drop(&mut self) {
        for handle in [self.pump.take(), self.keepalive.take()].into_iter().flatten() {
            handle.abort();
        }
    }
}
