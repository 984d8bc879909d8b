//! The inbound response pump.
//!
//! Reads frames in arrival order, tracks the output role and generation
//! stage, and forwards assistant deltas as [`BridgeEvent`]s. Any receive or
//! decode failure is reported once as [`BridgeEvent::Error`] and ends the
//! pump; it never restarts itself.

use crate::{
    event::InboundEvent,
    generic_types::{AudioDelta, BridgeEvent, TextDelta},
    tracker::OutputState,
    transport::FrameSource,
};
use tokio::sync::mpsc;
use tracing::{debug, error, info};

pub(crate) async fn run(mut source: Box<dyn FrameSource>, events: mpsc::Sender<BridgeEvent>) {
    let mut output = OutputState::default();

    loop {
        // Give pending outbound sends a turn before blocking on the read.
        tokio::task::yield_now().await;

        let frame = match source.recv().await {
            Ok(Some(frame)) => frame,
            Ok(None) => return fail(&events, "stream closed by remote").await,
            Err(e) => return fail(&events, &e.to_string()).await,
        };
        if frame.is_empty() {
            continue;
        }

        let event = match InboundEvent::decode(&frame) {
            Ok(event) => event,
            Err(e) => return fail(&events, &format!("invalid event frame: {e}")).await,
        };

        let forward = match event {
            InboundEvent::ContentStart {
                role,
                generation_stage,
            } => {
                output.on_content_start(role, generation_stage);
                debug!(role = ?output.role(), stage = ?output.generation_stage(), "Output content started");
                None
            }
            InboundEvent::TextOutput { content } if output.is_assistant() => {
                Some(BridgeEvent::Text(TextDelta {
                    content,
                    generation_stage: output.generation_stage().map(str::to_string),
                }))
            }
            InboundEvent::AudioOutput { content } if output.is_assistant() => {
                Some(BridgeEvent::Audio(AudioDelta::lpcm(content)))
            }
            InboundEvent::TextOutput { .. } | InboundEvent::AudioOutput { .. } => {
                debug!(role = ?output.role(), "Dropping non-assistant output");
                None
            }
            InboundEvent::Other(name) => {
                debug!(event = ?name, "Ignoring event");
                None
            }
        };

        if let Some(event) = forward {
            if events.send(event).await.is_err() {
                info!("Event receiver dropped, stopping response pump.");
                return;
            }
        }
    }
}

async fn fail(events: &mpsc::Sender<BridgeEvent>, cause: &str) {
    let message = format!("Nova Sonic stream error: {cause}");
    error!("{}", message);
    let _ = events.send(BridgeEvent::Error(message)).await;
}
