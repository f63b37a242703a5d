//! Versus Board
//!
//! Two-player diagonal board games (checkers, come-come, cat and mouse)
//! played between two peers over a direct channel, with no game server in
//! between.
//!
//! # Overview
//!
//! - **Board** - Coordinates, pieces, moves and a validated board value.
//!
//! - **Rule Engines** - One [`rules::RuleEngine`] per game: setup, legal
//!   moves with mandatory and chained captures, move application, loss
//!   detection.
//!
//! - **Session** - One peer's phase machine, room and running match. Pure
//!   state: UI operations and incoming envelopes in, envelopes and notices
//!   out.
//!
//! - **Transport** - Rendezvous by room name, host/guest link with
//!   keepalive, retries and reconnection.
//!
//! - **Client** - Wires a session to a transport.
//!
//! # Design Principles
//!
//! 1. **State machines validate transitions** - Phase changes that do not
//!    fit are rejected with an error and leave state untouched.
//!
//! 2. **The host is authoritative for setup** - It picks colors, builds
//!    the board and announces the match; the guest adopts it.
//!
//! 3. **Moves are validated on both ends** - A peer only applies what the
//!    rule engine accepts for the side to move.
//!
//! 4. **Serialization-ready** - Wire types are serde types; session state
//!    converts to JSON for the UI.
//!
//! # Example
//!
//! ```rust
//! use versus_board::board::{Move, Position, Side};
//! use versus_board::config::SessionConfig;
//! use versus_board::rules::GameType;
//! use versus_board::session::Session;
//! use versus_board::state::Phase;
//!
//! let mut host = Session::new("Ana", &SessionConfig { seed: Some(7) });
//! let mut guest = Session::new("Bo", &SessionConfig { seed: Some(8) });
//!
//! host.open_room("Friday", "versus-board-v1-friday").unwrap();
//! guest.enter_room("Friday", "versus-board-v1-friday").unwrap();
//!
//! // join, then welcome
//! for env in guest.drain_outbox() {
//!     host.receive(env);
//! }
//! for env in host.drain_outbox() {
//!     guest.receive(env);
//! }
//! assert_eq!(host.phase(), Phase::RoomReady);
//!
//! host.select_game(GameType::Checkers).unwrap();
//! host.choose_color_and_start(Some(Side::Light)).unwrap();
//! for env in host.drain_outbox() {
//!     guest.receive(env);
//! }
//!
//! // Dark moves first
//! guest
//!     .submit_move(Move::step(Position::new(2, 1), Position::new(3, 0)))
//!     .unwrap();
//! for env in guest.drain_outbox() {
//!     host.receive(env);
//! }
//! assert!(host.is_local_turn());
//! ```

pub mod board;
pub mod client;
pub mod config;
pub mod protocol;
pub mod rules;
pub mod session;
pub mod state;
pub mod transport;
