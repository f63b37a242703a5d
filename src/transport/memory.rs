//! In-process rendezvous.
//!
//! Rooms live in a shared map from identifier to the host's listener. A
//! claim is free again once the host releases it or drops its
//! [`Incoming`]. Cloning the
//! rendezvous shares the map, so both peers of a local game (or a test)
//! meet through the same instance.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::debug;

use super::{DataChannel, Incoming, Rendezvous, RoomId, TransportError};

type Listeners = HashMap<String, mpsc::UnboundedSender<DataChannel>>;

#[derive(Debug, Clone, Default)]
pub struct MemoryRendezvous {
    listeners: Arc<Mutex<Listeners>>,

    /// Simulated signalling delay per dial
    latency: Duration,
}

impl MemoryRendezvous {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency,
            ..Self::default()
        }
    }

    /// Check if a host is listening at `room`.
    pub fn is_claimed(&self, room: &RoomId) -> bool {
        self.listeners
            .lock()
            .get(room.as_str())
            .is_some_and(|tx| !tx.is_closed())
    }
}

#[async_trait]
impl Rendezvous for MemoryRendezvous {
    async fn claim(&self, room: &RoomId) -> Result<Incoming, TransportError> {
        let mut listeners = self.listeners.lock();
        if listeners
            .get(room.as_str())
            .is_some_and(|tx| !tx.is_closed())
        {
            return Err(TransportError::RoomAlreadyExists(room.to_string()));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        listeners.insert(room.to_string(), tx);
        debug!(room = %room, "Room claimed");
        Ok(Incoming::new(rx))
    }

    async fn dial(&self, room: &RoomId) -> Result<DataChannel, TransportError> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let listener = self.listeners.lock().get(room.as_str()).cloned();
        let Some(listener) = listener else {
            return Err(TransportError::PeerUnavailable(room.to_string()));
        };

        let (host_end, guest_end) = DataChannel::pair();
        if listener.send(host_end).is_err() {
            self.listeners.lock().remove(room.as_str());
            return Err(TransportError::PeerUnavailable(room.to_string()));
        }

        debug!(room = %room, "Channel offered to host");
        Ok(guest_end)
    }

    fn release(&self, room: &RoomId) {
        if self.listeners.lock().remove(room.as_str()).is_some() {
            debug!(room = %room, "Room released");
        }
    }
}
