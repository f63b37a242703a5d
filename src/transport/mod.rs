//! Peer-to-peer transport.
//!
//! Two peers meet through a rendezvous service under a room identifier:
//! the host claims it, the guest dials it, and the pair then exchange JSON
//! frames over a reliable ordered channel. [`PeerTransport`] runs the link
//! on a background task (keepalive, idle detection, reconnection) and
//! reports to its owner through [`TransportEvent`]s.
//!
//! # Link lifecycle
//!
//! ```text
//!  host                                   guest
//!  ────                                   ─────
//!  claim(room) ── bootstrap timeout       dial(room) ── per-attempt timeout,
//!      │                                      │         backoff, N attempts
//!      ▼                                      ▼
//!  accept ◀───────────── channel ───────────▶ attached
//!      │    ◀── ping every heartbeat ───────  │
//!      │                                      │
//!  idle timeout / close                   close
//!      │                                      │
//!      ▼                                      ▼
//!  Dropped, back to accept               Dropped, redial (smaller budget)
//!                                             ├─ ok   → Reconnected
//!                                             └─ fail → Lost
//! ```

pub mod memory;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info, instrument, trace, warn};

use crate::config::TransportConfig;
use crate::protocol::{self, Envelope};
use crate::state::{ConnectionStatus, LinkHealth, Role};

pub use memory::MemoryRendezvous;

/// Transport errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("room `{0}` already exists")]
    RoomAlreadyExists(String),
    #[error("room `{room}` unreachable after {attempts} attempts")]
    Unreachable { room: String, attempts: u32 },
    #[error("timed out claiming room `{0}`")]
    BootstrapTimeout(String),
    #[error("no host listening at `{0}`")]
    PeerUnavailable(String),
    #[error("room name `{0}` has no usable characters")]
    InvalidRoomName(String),
    #[error("invalid transport config: {0}")]
    InvalidConfig(String),
}

/// Rendezvous identifier for a room.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RoomId(String);

impl RoomId {
    /// Normalise a human room name and prefix it with the namespace:
    /// lower-cased and trimmed, every run of characters outside `[a-z0-9]`
    /// collapsed into one `-`, no leading or trailing `-`.
    pub fn derive(name: &str, namespace: &str) -> Result<Self, TransportError> {
        let mut slug = String::with_capacity(name.len());
        let mut gap = false;

        for ch in name.trim().chars().flat_map(char::to_lowercase) {
            if ch.is_ascii_lowercase() || ch.is_ascii_digit() {
                if gap && !slug.is_empty() {
                    slug.push('-');
                }
                gap = false;
                slug.push(ch);
            } else {
                gap = true;
            }
        }

        if slug.is_empty() {
            return Err(TransportError::InvalidRoomName(name.to_string()));
        }

        Ok(Self(format!("{}{}", namespace, slug)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One end of a reliable, ordered, bidirectional text channel.
///
/// Dropping either end closes the channel for the other.
#[derive(Debug)]
pub struct DataChannel {
    tx: mpsc::UnboundedSender<String>,
    rx: mpsc::UnboundedReceiver<String>,
}

impl DataChannel {
    /// Two connected ends.
    pub fn pair() -> (DataChannel, DataChannel) {
        let (a_tx, b_rx) = mpsc::unbounded_channel();
        let (b_tx, a_rx) = mpsc::unbounded_channel();
        (
            DataChannel { tx: a_tx, rx: a_rx },
            DataChannel { tx: b_tx, rx: b_rx },
        )
    }

    /// Send a frame; false if the other end is gone.
    pub fn send(&self, frame: String) -> bool {
        self.tx.send(frame).is_ok()
    }

    pub async fn recv(&mut self) -> Option<String> {
        self.rx.recv().await
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    fn split(self) -> (mpsc::UnboundedSender<String>, mpsc::UnboundedReceiver<String>) {
        (self.tx, self.rx)
    }
}

/// Channels offered to a host, one per guest dial.
#[derive(Debug)]
pub struct Incoming {
    rx: mpsc::UnboundedReceiver<DataChannel>,
}

impl Incoming {
    pub fn new(rx: mpsc::UnboundedReceiver<DataChannel>) -> Self {
        Self { rx }
    }

    /// Wait for the next guest; `None` once the rendezvous drops the room.
    pub async fn accept(&mut self) -> Option<DataChannel> {
        self.rx.recv().await
    }
}

/// Rendezvous service: maps room identifiers to listening hosts.
#[async_trait]
pub trait Rendezvous: Send + Sync + fmt::Debug {
    /// Claim `room` and listen for guests. Fails if it is already claimed.
    async fn claim(&self, room: &RoomId) -> Result<Incoming, TransportError>;

    /// Open a channel to the host listening at `room`.
    async fn dial(&self, room: &RoomId) -> Result<DataChannel, TransportError>;

    /// Give up a claim. Dials to `room` fail from the moment this returns.
    fn release(&self, room: &RoomId);
}

/// What the transport reports to its owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// A channel to the other peer is open
    Opened,
    /// A decoded, non-heartbeat message
    Message(Envelope),
    /// The channel closed; `reconnecting` when the guest is redialing
    Dropped { reconnecting: bool },
    /// The guest's redial succeeded
    Reconnected,
    /// The link is gone for good
    Lost,
}

type Outbound = Arc<Mutex<Option<mpsc::UnboundedSender<String>>>>;

/// State shared between the owner and the link task.
#[derive(Clone)]
struct Link {
    role: Role,
    room: RoomId,
    config: TransportConfig,
    rendezvous: Arc<dyn Rendezvous>,
    outbound: Outbound,
    status: Arc<watch::Sender<ConnectionStatus>>,
    events: mpsc::UnboundedSender<TransportEvent>,
}

enum Tick {
    Frame(Option<String>),
    Heartbeat,
    Extra(Option<DataChannel>),
}

/// Next guest offered while a channel is already open, or never.
async fn next_extra(incoming: Option<&mut Incoming>) -> Option<DataChannel> {
    match incoming {
        Some(incoming) => incoming.accept().await,
        None => std::future::pending().await,
    }
}

impl Link {
    fn set_status(&self, status: ConnectionStatus) {
        let previous = self.status.send_replace(status);
        if previous != status {
            debug!(room = %self.room, from = previous.as_str(), to = status.as_str(), "Connection status");
        }
    }

    fn emit(&self, event: TransportEvent) {
        if self.events.send(event).is_err() {
            trace!(room = %self.room, "Event receiver gone");
        }
    }

    fn send_frame(&self, frame: String) -> bool {
        match self.outbound.lock().as_ref() {
            Some(tx) => tx.send(frame).is_ok(),
            None => false,
        }
    }

    fn attach(&self, channel: DataChannel) -> mpsc::UnboundedReceiver<String> {
        let (tx, rx) = channel.split();
        *self.outbound.lock() = Some(tx);
        self.set_status(ConnectionStatus::Connected);
        rx
    }

    fn detach(&self) {
        self.outbound.lock().take();
    }

    async fn dial_with_retry(&self, attempts: u32) -> Result<DataChannel, TransportError> {
        for attempt in 1..=attempts {
            debug!(room = %self.room, attempt, "Dialing");
            match time::timeout(self.config.attempt_timeout(), self.rendezvous.dial(&self.room))
                .await
            {
                Ok(Ok(channel)) => return Ok(channel),
                Ok(Err(e)) => warn!(room = %self.room, attempt, error = %e, "Dial failed"),
                Err(_) => warn!(room = %self.room, attempt, "Dial timed out"),
            }

            if attempt < attempts {
                time::sleep(self.config.backoff(attempt)).await;
            }
        }

        Err(TransportError::Unreachable {
            room: self.room.to_string(),
            attempts,
        })
    }

    /// Pump one open channel until it closes or goes idle.
    async fn drive(
        &self,
        mut rx: mpsc::UnboundedReceiver<String>,
        mut extra: Option<&mut Incoming>,
    ) {
        let mut health = LinkHealth::new();
        let mut heartbeat = time::interval(self.config.heartbeat());
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let tick = tokio::select! {
                frame = rx.recv() => Tick::Frame(frame),
                _ = heartbeat.tick() => Tick::Heartbeat,
                offered = next_extra(extra.as_deref_mut()) => Tick::Extra(offered),
            };

            match tick {
                Tick::Frame(None) => {
                    debug!(room = %self.room, frames_in = health.frames_in, "Channel closed by peer");
                    return;
                }
                Tick::Frame(Some(frame)) => {
                    health.record_inbound();
                    match protocol::decode(&frame) {
                        Ok(envelope) if envelope.is_heartbeat() => trace!("Heartbeat received"),
                        Ok(envelope) => self.emit(TransportEvent::Message(envelope)),
                        Err(e) => warn!(room = %self.room, error = %e, "Dropped frame"),
                    }
                }
                Tick::Heartbeat => match self.role {
                    Role::Guest => match protocol::encode(&Envelope::Ping) {
                        Ok(ping) => {
                            if self.send_frame(ping) {
                                health.record_heartbeat_sent();
                            } else {
                                trace!("Heartbeat not sent, link closing");
                            }
                        }
                        Err(e) => warn!(error = %e, "Failed to encode heartbeat"),
                    },
                    Role::Host => {
                        if health.is_stale(self.config.idle_timeout()) {
                            warn!(room = %self.room, idle = ?health.idle_for(), "Guest went silent");
                            return;
                        }
                    }
                },
                Tick::Extra(Some(refused)) => {
                    warn!(room = %self.room, "Refusing second guest");
                    drop(refused);
                }
                Tick::Extra(None) => {
                    debug!(room = %self.room, "Rendezvous stopped offering guests");
                    extra = None;
                }
            }
        }
    }

    async fn run_host(self, mut incoming: Incoming) {
        loop {
            let Some(channel) = incoming.accept().await else {
                warn!(room = %self.room, "Rendezvous dropped the room");
                self.set_status(ConnectionStatus::Error);
                self.emit(TransportEvent::Lost);
                return;
            };

            info!(room = %self.room, "Guest attached");
            let rx = self.attach(channel);
            self.emit(TransportEvent::Opened);

            self.drive(rx, Some(&mut incoming)).await;

            self.detach();
            warn!(room = %self.room, "Guest link dropped");
            self.set_status(ConnectionStatus::Connecting);
            self.emit(TransportEvent::Dropped {
                reconnecting: false,
            });
        }
    }

    async fn run_guest(self, mut rx: mpsc::UnboundedReceiver<String>) {
        loop {
            self.drive(rx, None).await;

            self.detach();
            warn!(room = %self.room, "Link dropped, reconnecting");
            self.set_status(ConnectionStatus::Connecting);
            self.emit(TransportEvent::Dropped { reconnecting: true });

            match self.dial_with_retry(self.config.reconnect_attempts).await {
                Ok(channel) => {
                    rx = self.attach(channel);
                    info!(room = %self.room, "Reconnected");
                    self.emit(TransportEvent::Reconnected);
                }
                Err(e) => {
                    warn!(room = %self.room, error = %e, "Giving up on the room");
                    self.set_status(ConnectionStatus::Error);
                    self.emit(TransportEvent::Lost);
                    return;
                }
            }
        }
    }
}

/// One peer's end of the link.
pub struct PeerTransport {
    role: Role,
    room: RoomId,
    rendezvous: Arc<dyn Rendezvous>,
    outbound: Outbound,
    status_tx: Arc<watch::Sender<ConnectionStatus>>,
    status: watch::Receiver<ConnectionStatus>,
    events: mpsc::UnboundedReceiver<TransportEvent>,
    task: Option<JoinHandle<()>>,
}

impl PeerTransport {
    fn link(
        role: Role,
        room: RoomId,
        rendezvous: Arc<dyn Rendezvous>,
        config: TransportConfig,
    ) -> (Link, Self) {
        let (status_tx, status) = watch::channel(ConnectionStatus::Connecting);
        let status_tx = Arc::new(status_tx);
        let (events_tx, events) = mpsc::unbounded_channel();
        let outbound: Outbound = Arc::new(Mutex::new(None));

        let link = Link {
            role,
            room: room.clone(),
            config,
            rendezvous: rendezvous.clone(),
            outbound: outbound.clone(),
            status: status_tx.clone(),
            events: events_tx,
        };
        let transport = Self {
            role,
            room,
            rendezvous,
            outbound,
            status_tx,
            status,
            events,
            task: None,
        };
        (link, transport)
    }

    /// Claim `room` and wait for a guest in the background.
    #[instrument(skip(rendezvous, room, config), fields(room = %room))]
    pub async fn host(
        rendezvous: Arc<dyn Rendezvous>,
        room: RoomId,
        config: TransportConfig,
    ) -> Result<Self, TransportError> {
        config
            .validate()
            .map_err(|e| TransportError::InvalidConfig(e.to_string()))?;
        let bootstrap = config.bootstrap_timeout();
        let (link, mut transport) = Self::link(Role::Host, room, rendezvous, config);

        let claimed = time::timeout(bootstrap, link.rendezvous.claim(&link.room)).await;
        let incoming = match claimed {
            Ok(Ok(incoming)) => incoming,
            Ok(Err(e)) => {
                link.set_status(ConnectionStatus::Error);
                return Err(e);
            }
            Err(_) => {
                link.set_status(ConnectionStatus::Error);
                return Err(TransportError::BootstrapTimeout(link.room.to_string()));
            }
        };

        info!("Room claimed, waiting for a guest");
        transport.task = Some(tokio::spawn(link.run_host(incoming)));
        Ok(transport)
    }

    /// Dial the host at `room`, retrying with backoff.
    #[instrument(skip(rendezvous, room, config), fields(room = %room))]
    pub async fn join(
        rendezvous: Arc<dyn Rendezvous>,
        room: RoomId,
        config: TransportConfig,
    ) -> Result<Self, TransportError> {
        config
            .validate()
            .map_err(|e| TransportError::InvalidConfig(e.to_string()))?;
        let attempts = config.dial_attempts;
        let (link, mut transport) = Self::link(Role::Guest, room, rendezvous, config);

        let channel = match link.dial_with_retry(attempts).await {
            Ok(channel) => channel,
            Err(e) => {
                link.set_status(ConnectionStatus::Error);
                return Err(e);
            }
        };

        let rx = link.attach(channel);
        info!("Connected to host");
        link.emit(TransportEvent::Opened);
        transport.task = Some(tokio::spawn(link.run_guest(rx)));
        Ok(transport)
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn room(&self) -> &RoomId {
        &self.room
    }

    pub fn status(&self) -> ConnectionStatus {
        *self.status.borrow()
    }

    /// Send an envelope. On a closed link this logs and returns false.
    pub fn send(&self, envelope: &Envelope) -> bool {
        let frame = match protocol::encode(envelope) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(kind = envelope.kind(), error = %e, "Failed to encode envelope");
                return false;
            }
        };

        let sent = match self.outbound.lock().as_ref() {
            Some(tx) => tx.send(frame).is_ok(),
            None => false,
        };

        if sent {
            debug!(kind = envelope.kind(), "Sent envelope");
        } else {
            warn!(kind = envelope.kind(), room = %self.room, "Link closed, envelope dropped");
        }
        sent
    }

    /// Abort the link task and give up the host's claim at once.
    fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            if self.role == Role::Host {
                self.rendezvous.release(&self.room);
            }
        }
    }

    /// Wait for the next event; `None` once the link task has stopped and
    /// every event has been taken.
    pub async fn next_event(&mut self) -> Option<TransportEvent> {
        self.events.recv().await
    }

    /// Stop every task and close the channel.
    pub fn disconnect(&mut self) {
        self.stop();
        self.outbound.lock().take();
        self.status_tx.send_replace(ConnectionStatus::Disconnected);
        self.events.close();
        info!(room = %self.room, "Disconnected");
    }
}

impl fmt::Debug for PeerTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PeerTransport")
            .field("role", &self.role)
            .field("room", &self.room)
            .field("status", &self.status())
            .finish()
    }
}

impl Drop for PeerTransport {
    fn drop(&mut self) {
        self.stop();
    }
}
