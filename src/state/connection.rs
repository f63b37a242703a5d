//! Connection state.
//!
//! The transport owns a [`ConnectionStatus`] and publishes it; the session
//! and the driver only observe it. [`LinkHealth`] tracks traffic on one
//! open channel for the keepalive logic.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

/// Connection status as seen by the UI.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    /// Claiming, dialing, waiting for a guest, or reconnecting
    Connecting,
    Connected,
    /// Gave up; a new host/join is required
    Error,
}

impl ConnectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Error => "error",
        }
    }

    /// Check if currently connected.
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Check if the transport has stopped for good.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Disconnected | Self::Error)
    }
}

/// Traffic bookkeeping for one open channel.
#[derive(Debug, Clone)]
pub struct LinkHealth {
    /// When this channel was opened
    pub opened_at: Instant,

    /// Last frame received, heartbeats included
    pub last_inbound: Instant,

    /// Last keepalive sent
    pub last_heartbeat_sent: Option<Instant>,

    /// Frames received, heartbeats included
    pub frames_in: u64,

    /// Frames sent, heartbeats included
    pub frames_out: u64,
}

impl LinkHealth {
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            opened_at: now,
            last_inbound: now,
            last_heartbeat_sent: None,
            frames_in: 0,
            frames_out: 0,
        }
    }

    /// Record any inbound frame.
    pub fn record_inbound(&mut self) {
        self.last_inbound = Instant::now();
        self.frames_in += 1;
    }

    pub fn record_heartbeat_sent(&mut self) {
        self.last_heartbeat_sent = Some(Instant::now());
        self.frames_out += 1;
    }

    /// Time since the last inbound frame.
    pub fn idle_for(&self) -> Duration {
        Instant::now().saturating_duration_since(self.last_inbound)
    }

    /// Check if the peer has been silent for at least `timeout`.
    pub fn is_stale(&self, timeout: Duration) -> bool {
        self.idle_for() >= timeout
    }
}

impl Default for LinkHealth {
    fn default() -> Self {
        Self::new()
    }
}
