//! Game client.
//!
//! Glue between a [`Session`] and a [`PeerTransport`]: UI operations go to
//! the session and whatever it queues for the other peer is flushed to the
//! transport right away; transport events are fed back into the session.

use std::sync::Arc;

use tracing::{debug, info};

use crate::board::{Move, Position, Side};
use crate::config::Config;
use crate::rules::GameType;
use crate::session::{Notice, Session, SessionError};
use crate::state::{ConnectionStatus, TurnOutcome};
use crate::transport::{PeerTransport, Rendezvous, RoomId, TransportError, TransportEvent};

/// Client errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Transport(#[from] TransportError),
}

#[derive(Debug)]
pub struct GameClient {
    session: Session,
    transport: PeerTransport,
}

impl GameClient {
    /// Claim a room and open it as host.
    pub async fn host(
        local_name: &str,
        room_name: &str,
        rendezvous: Arc<dyn Rendezvous>,
        config: &Config,
    ) -> Result<Self, ClientError> {
        let room = RoomId::derive(room_name, &config.transport.namespace)?;
        let transport =
            PeerTransport::host(rendezvous, room.clone(), config.transport.clone()).await?;

        let mut session = Session::new(local_name, &config.session);
        session.open_room(room_name, room.as_str())?;
        info!(room = %room, player = local_name, "Hosting");

        Ok(Self { session, transport })
    }

    /// Dial an existing room and enter it as guest.
    pub async fn join(
        local_name: &str,
        room_name: &str,
        rendezvous: Arc<dyn Rendezvous>,
        config: &Config,
    ) -> Result<Self, ClientError> {
        let room = RoomId::derive(room_name, &config.transport.namespace)?;
        let transport =
            PeerTransport::join(rendezvous, room.clone(), config.transport.clone()).await?;

        let mut session = Session::new(local_name, &config.session);
        session.enter_room(room_name, room.as_str())?;
        info!(room = %room, player = local_name, "Joined");

        let mut client = Self { session, transport };
        client.flush();
        Ok(client)
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn status(&self) -> ConnectionStatus {
        self.transport.status()
    }

    pub fn room_id(&self) -> &RoomId {
        self.transport.room()
    }

    pub fn drain_notices(&mut self) -> Vec<Notice> {
        self.session.drain_notices()
    }

    fn flush(&mut self) {
        for envelope in self.session.drain_outbox() {
            self.transport.send(&envelope);
        }
    }

    pub fn select_game(&mut self, game: GameType) -> Result<(), ClientError> {
        self.session.select_game(game)?;
        Ok(())
    }

    pub fn choose_color_and_start(&mut self, color: Option<Side>) -> Result<(), ClientError> {
        let result = self.session.choose_color_and_start(color);
        self.flush();
        Ok(result?)
    }

    pub fn select_piece(&mut self, position: Position) -> Result<Vec<Move>, ClientError> {
        Ok(self.session.select_piece(position)?)
    }

    pub fn available_moves(&self) -> Vec<Move> {
        self.session.available_moves()
    }

    pub fn submit_move(&mut self, mv: Move) -> Result<TurnOutcome, ClientError> {
        let result = self.session.submit_move(mv);
        self.flush();
        Ok(result?)
    }

    pub fn surrender(&mut self) -> Result<(), ClientError> {
        let result = self.session.surrender();
        self.flush();
        Ok(result?)
    }

    pub fn return_to_room(&mut self) -> Result<(), ClientError> {
        let result = self.session.return_to_room();
        self.flush();
        Ok(result?)
    }

    /// Close the link and drop the room.
    pub fn reset_to_lobby(&mut self) {
        self.transport.disconnect();
        self.session.reset_to_lobby();
    }

    /// Wait for one transport event and apply it to the session.
    ///
    /// Returns the event, or `None` once the transport has stopped.
    pub async fn next_event(&mut self) -> Option<TransportEvent> {
        let event = self.transport.next_event().await?;

        match &event {
            TransportEvent::Opened => debug!("Link open"),
            TransportEvent::Message(envelope) => self.session.receive(envelope.clone()),
            TransportEvent::Dropped { reconnecting } => {
                self.session.on_link_dropped(*reconnecting)
            }
            TransportEvent::Reconnected => self.session.on_reconnected(),
            TransportEvent::Lost => self.session.on_link_lost(),
        }

        self.flush();
        Some(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{SessionConfig, TransportConfig};
    use crate::protocol::Envelope;
    use crate::state::Phase;
    use crate::transport::MemoryRendezvous;
    use pretty_assertions::assert_eq;

    fn config(seed: u64) -> Config {
        Config {
            transport: TransportConfig::default(),
            session: SessionConfig { seed: Some(seed) },
        }
    }

    async fn pump_until(client: &mut GameClient, done: impl Fn(&Session) -> bool) {
        while !done(client.session()) {
            client.next_event().await.unwrap();
        }
    }

    async fn paired(rendezvous: Arc<dyn Rendezvous>, guest_config: Config) -> (GameClient, GameClient) {
        let mut host = GameClient::host("Ana", "Friday Night", rendezvous.clone(), &config(1))
            .await
            .unwrap();
        let mut guest = GameClient::join("Bo", "friday night", rendezvous, &guest_config)
            .await
            .unwrap();

        pump_until(&mut host, |s| s.phase() == Phase::RoomReady).await;
        pump_until(&mut guest, |s| s.phase() == Phase::RoomReady).await;
        (host, guest)
    }

    #[tokio::test(start_paused = true)]
    async fn test_pairing() {
        let (host, guest) = paired(Arc::new(MemoryRendezvous::new()), config(2)).await;

        assert_eq!(host.room_id().as_str(), "versus-board-v1-friday-night");
        assert_eq!(host.status(), ConnectionStatus::Connected);
        assert_eq!(guest.status(), ConnectionStatus::Connected);
        assert_eq!(
            guest.session().room().unwrap().opponent().unwrap().name,
            "Ana"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_match_over_the_link() {
        let (mut host, mut guest) = paired(Arc::new(MemoryRendezvous::new()), config(2)).await;

        host.select_game(GameType::Checkers).unwrap();
        host.choose_color_and_start(Some(Side::Light)).unwrap();
        pump_until(&mut guest, |s| s.phase() == Phase::InProgress).await;
        assert!(guest.session().is_local_turn());

        let opening = Move::step(Position::new(2, 1), Position::new(3, 0));
        guest.submit_move(opening.clone()).unwrap();
        pump_until(&mut host, Session::is_local_turn).await;
        assert_eq!(
            host.session().game().unwrap().board(),
            guest.session().game().unwrap().board()
        );

        host.surrender().unwrap();
        pump_until(&mut guest, |s| s.phase() == Phase::Finished).await;
        assert_eq!(guest.session().winner().unwrap().name, "Bo");
        assert_eq!(guest.drain_notices(), vec![Notice::OpponentSurrendered]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_join_missing_room() {
        let rendezvous: Arc<dyn Rendezvous> = Arc::new(MemoryRendezvous::new());
        let err = GameClient::join("Bo", "Nowhere", rendezvous, &config(2))
            .await
            .unwrap_err();

        assert_eq!(
            err,
            ClientError::Transport(TransportError::Unreachable {
                room: "versus-board-v1-nowhere".into(),
                attempts: 3,
            })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_host_taken_room() {
        let rendezvous: Arc<dyn Rendezvous> = Arc::new(MemoryRendezvous::new());
        let _first = GameClient::host("Ana", "Friday", rendezvous.clone(), &config(1))
            .await
            .unwrap();

        let err = GameClient::host("Cy", "FRIDAY", rendezvous, &config(3))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ClientError::Transport(TransportError::RoomAlreadyExists(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_guest_rejoins_after_drop() {
        let mut quiet = config(2);
        quiet.transport.heartbeat_ms = 60_000;
        let (mut host, mut guest) = paired(Arc::new(MemoryRendezvous::new()), quiet).await;

        // The host times the silent guest out and reopens the room
        pump_until(&mut host, |s| s.phase() == Phase::RoomWaiting).await;
        assert_eq!(host.drain_notices(), vec![Notice::OpponentDisconnected]);

        assert_eq!(
            guest.next_event().await,
            Some(TransportEvent::Dropped { reconnecting: true })
        );
        assert_eq!(guest.next_event().await, Some(TransportEvent::Reconnected));

        pump_until(&mut host, |s| s.phase() == Phase::RoomReady).await;
        pump_until(&mut guest, |s| s.phase() == Phase::RoomReady).await;
        assert_eq!(guest.drain_notices(), vec![Notice::Reconnecting]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_host_leaving_sends_guest_to_lobby() {
        let (mut host, mut guest) = paired(Arc::new(MemoryRendezvous::new()), config(2)).await;

        host.reset_to_lobby();
        assert_eq!(host.status(), ConnectionStatus::Disconnected);
        assert_eq!(host.session().phase(), Phase::Lobby);

        pump_until(&mut guest, |s| s.phase() == Phase::Lobby).await;
        assert_eq!(guest.status(), ConnectionStatus::Error);
        assert_eq!(
            guest.drain_notices(),
            vec![Notice::Reconnecting, Notice::ConnectionLost]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_stray_envelopes_do_not_break_the_room() {
        let (mut host, mut guest) = paired(Arc::new(MemoryRendezvous::new()), config(2)).await;

        // A move with no match running is dropped by the host
        guest.transport.send(&Envelope::Move {
            mv: Move::step(Position::new(2, 1), Position::new(3, 0)),
        });
        host.next_event().await.unwrap();
        assert_eq!(host.session().phase(), Phase::RoomReady);
        assert!(host.session().game().is_none());
    }
}
