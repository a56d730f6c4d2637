//! Per-channel duplicate suppression.
//!
//! A vehicle waiting at the barrier is recognized on every capture cycle;
//! only the first read within the cooldown window may become an event.
//! Channels are independent: the same plate at entry and exit gates is two
//! distinct events.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::debug;

/// Default cooldown between repeat reads of the same plate on one channel.
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(4);

#[derive(Debug)]
struct ChannelState {
    last_plate: String,
    admitted_at: Instant,
}

/// Decides whether a recognized plate may be reported.
///
/// Shared across worker tasks; the interior mutex is held only for the map
/// lookup and update.
#[derive(Debug)]
pub struct DebounceGate {
    cooldown: Duration,
    channels: Mutex<HashMap<String, ChannelState>>,
}

impl Default for DebounceGate {
    fn default() -> Self {
        Self::new(DEFAULT_COOLDOWN)
    }
}

impl DebounceGate {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            channels: Mutex::new(HashMap::new()),
        }
    }

    /// True if the plate should be reported now. A `true` answer also starts
    /// (or restarts) the cooldown window for this channel.
    pub fn admit(&self, channel_id: &str, plate: &str) -> bool {
        self.admit_at(channel_id, plate, Instant::now())
    }

    /// Clock-injected variant of [`admit`](Self::admit).
    pub fn admit_at(&self, channel_id: &str, plate: &str, now: Instant) -> bool {
        let mut channels = self
            .channels
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let admit = match channels.get(channel_id) {
            Some(state) => {
                state.last_plate != plate
                    || now.saturating_duration_since(state.admitted_at) >= self.cooldown
            }
            None => true,
        };

        if admit {
            channels.insert(
                channel_id.to_string(),
                ChannelState {
                    last_plate: plate.to_string(),
                    admitted_at: now,
                },
            );
        } else {
            debug!(channel = channel_id, plate, "duplicate read suppressed");
        }
        admit
    }
}
