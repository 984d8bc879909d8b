//! Keeps an idle session open.
//!
//! The service drops a session that receives no audio for about a minute.
//! While no user audio window is open, the keepalive sends one complete
//! silent audio turn per interval under a throwaway content identifier.

use crate::{event::OutboundEvent, ids::IdGenerator, sender::OutboundSender};
use base64::Engine;
use std::sync::{
    Arc, LazyLock,
    atomic::{AtomicBool, Ordering},
};
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::debug;

/// Half a second of 16 kHz / 16-bit / mono silence.
const SILENT_PCM_BYTES: usize = 16_000;

static SILENT_PCM_BASE64: LazyLock<String> =
    LazyLock::new(|| base64::engine::general_purpose::STANDARD.encode(vec![0u8; SILENT_PCM_BYTES]));

pub(crate) fn silent_pcm_base64() -> &'static str {
    &SILENT_PCM_BASE64
}

pub(crate) struct Keepalive {
    pub sender: OutboundSender,
    pub prompt_name: String,
    pub audio_open: Arc<AtomicBool>,
    pub ids: Arc<dyn IdGenerator>,
    pub interval: Duration,
}

impl Keepalive {
    /// Runs until the task is aborted.
    pub(crate) async fn run(self) {
        let silence = silent_pcm_base64();
        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            // The window flag only changes under the send lock, so checking it
            // while holding the lock keeps a silent turn from racing a real one.
            let mut out = self.sender.lock().await;
            if self.audio_open.load(Ordering::Acquire) {
                continue;
            }

            let content_name = self.ids.next_id();
            let turn = [
                OutboundEvent::audio_content_start(&self.prompt_name, &content_name),
                OutboundEvent::audio_input(&self.prompt_name, &content_name, silence),
                OutboundEvent::content_end(&self.prompt_name, &content_name),
            ];
            match out.send_all(&turn).await {
                Ok(()) => debug!(content_name = %content_name, "Sent keepalive turn"),
                Err(e) => debug!(error = %e, "Keepalive turn failed"),
            }
        }
    }
}
