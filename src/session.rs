use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use log::{info, warn};
use thiserror::Error;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::task::JoinHandle;
use tokio::time::sleep;

use crate::board::{BoardError, Side};
use crate::client::{NetEvent, RelayClient};
use crate::game::{Game, Mode};
use crate::protocol::Message;
use crate::relay::RelayServer;

/// Pause between the joiner's handshake writes. The wire has no framing, so
/// back-to-back writes would coalesce into one read on the host side.
const HANDSHAKE_PACING: Duration = Duration::from_millis(100);

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("connection failed: {0}")]
    Connection(#[from] io::Error),
    #[error("the relay closed the connection")]
    Disconnected,
    #[error("peer sent an unusable board: {0}")]
    Board(#[from] BoardError),
}

/// What `pump` surfaced from the network since the last call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// The peer committed a turn; the local board has been replaced.
    TurnEnded,
    BlackWins,
    RedWins,
    /// The connection is gone and no further events will arrive.
    NetworkError,
}

/// A hosted session waiting for its second player. Created by [`host`];
/// `wait_for_joiner` completes the handshake and yields the live session.
pub struct PendingHost {
    addr: SocketAddr,
    pin: String,
    dim: usize,
    rows: usize,
    client: RelayClient,
    events: UnboundedReceiver<NetEvent>,
    server: JoinHandle<io::Result<()>>,
}

/// Start a relay and connect to it as the hosting player. The host plays
/// black and moves first.
pub async fn host(addr: &str, dim: usize, rows: usize) -> Result<PendingHost, SessionError> {
    let (server, addr, _pin) = RelayServer::spawn(addr).await?;
    let (client, mut events) = RelayClient::connect(addr).await?;
    let pin = match events.recv().await {
        Some(NetEvent::Pin(pin)) => pin,
        _ => return Err(SessionError::Disconnected),
    };
    info!("hosting on {addr}, pin {pin}");
    Ok(PendingHost {
        addr,
        pin,
        dim,
        rows,
        client,
        events,
        server,
    })
}

impl PendingHost {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// The pin the joiner must echo to complete the handshake.
    pub fn pin(&self) -> &str {
        &self.pin
    }

    /// Block until a joiner echoes the pin, then send the board specs and
    /// start the game.
    pub async fn wait_for_joiner(mut self) -> Result<(Session, Game), SessionError> {
        loop {
            match self.events.recv().await {
                Some(NetEvent::Message(raw)) => match Message::parse(&raw) {
                    Ok(Message::Start) => continue,
                    Ok(Message::Pin(echo)) if echo == self.pin => break,
                    Ok(other) => warn!("ignoring pre-game message {other:?}"),
                    Err(err) => warn!("ignoring pre-game message: {err}"),
                },
                Some(NetEvent::Closed) | None => return Err(SessionError::Disconnected),
                Some(NetEvent::Pin(_)) => continue,
            }
        }
        info!("joiner authenticated, sending board specs");
        self.client
            .send(&Message::Specs { dim: self.dim, rows: self.rows }.encode())
            .await?;

        let game = Game::new(self.dim, self.rows, Mode::NetHost);
        let session = Session {
            client: self.client,
            events: self.events,
            pin: self.pin,
            mode: Mode::NetHost,
            server: Some(self.server),
            failed: false,
        };
        Ok((session, game))
    }
}

/// Connect to a hosted session. The entered pin must match the one the relay
/// greets us with; the host's echoed copy then unlocks its side. The joiner
/// plays red and moves second.
pub async fn join(addr: SocketAddr, entered_pin: &str) -> Result<(Session, Game), SessionError> {
    let (mut client, mut events) = RelayClient::connect(addr).await?;
    let pin = match events.recv().await {
        Some(NetEvent::Pin(pin)) => pin,
        _ => return Err(SessionError::Disconnected),
    };
    if pin != entered_pin {
        return Err(SessionError::Disconnected);
    }

    client.send(&Message::Start.encode()).await?;
    sleep(HANDSHAKE_PACING).await;
    client.send(&Message::Pin(pin.clone()).encode()).await?;

    let (dim, rows) = loop {
        match events.recv().await {
            Some(NetEvent::Message(raw)) => match Message::parse(&raw) {
                Ok(Message::Specs { dim, rows }) => break (dim, rows),
                Ok(other) => warn!("ignoring pre-game message {other:?}"),
                Err(err) => warn!("ignoring pre-game message: {err}"),
            },
            Some(NetEvent::Closed) | None => return Err(SessionError::Disconnected),
            Some(NetEvent::Pin(_)) => continue,
        }
    };
    info!("joined {addr}, board is {dim}x{dim} with {rows} piece rows");

    let game = Game::new(dim, rows, Mode::NetJoin);
    let session = Session {
        client,
        events,
        pin,
        mode: Mode::NetJoin,
        server: None,
        failed: false,
    };
    Ok((session, game))
}

/// A live two-player connection. The owning game loop calls `commit_turn`
/// after its own moves and `pump` every frame to fold peer traffic into the
/// game.
pub struct Session {
    client: RelayClient,
    events: UnboundedReceiver<NetEvent>,
    pin: String,
    mode: Mode,
    server: Option<JoinHandle<io::Result<()>>>,
    failed: bool,
}

impl Session {
    pub fn pin(&self) -> &str {
        &self.pin
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// True once the connection has failed; the session is unusable.
    pub fn failed(&self) -> bool {
        self.failed
    }

    /// Publish the local board after a committed turn.
    pub async fn commit_turn(&mut self, game: &Game) -> Result<(), SessionError> {
        let message = Message::Board(game.board().serialize()).encode();
        if let Err(err) = self.client.send(&message).await {
            self.failed = true;
            return Err(err.into());
        }
        Ok(())
    }

    /// Drain pending network events into the game without blocking. Malformed
    /// traffic is logged and dropped; everything actionable comes back as
    /// [`SessionEvent`]s in arrival order.
    pub fn pump(&mut self, game: &mut Game) -> Vec<SessionEvent> {
        let mut out = Vec::new();
        loop {
            let event = match self.events.try_recv() {
                Ok(event) => event,
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    if !self.failed {
                        self.failed = true;
                        out.push(SessionEvent::NetworkError);
                    }
                    break;
                }
            };
            match event {
                NetEvent::Message(raw) => match Message::parse(&raw) {
                    Ok(Message::Board(cells)) => match game.apply_remote_board(&cells) {
                        Ok(outcome) => {
                            out.push(SessionEvent::TurnEnded);
                            if let Some(winner) = outcome.winner() {
                                out.push(SessionEvent::win_for(winner));
                            }
                        }
                        Err(err) => warn!("dropping unusable board: {err}"),
                    },
                    Ok(Message::ClientLeft) | Ok(Message::Forfeit) => {
                        let remote = self.mode.local_side().opponent();
                        let outcome = game.forfeit(remote);
                        if let Some(winner) = outcome.winner() {
                            out.push(SessionEvent::win_for(winner));
                        }
                    }
                    Ok(other) => warn!("ignoring in-game message {other:?}"),
                    Err(err) => warn!("dropping message: {err}"),
                },
                NetEvent::Closed => {
                    if !self.failed {
                        self.failed = true;
                        out.push(SessionEvent::NetworkError);
                    }
                }
                NetEvent::Pin(_) => {}
            }
        }
        out
    }

    /// Concede the game. The peer learns of it when our socket closes and
    /// the relay announces the departure.
    pub async fn forfeit(&mut self, game: &mut Game) -> SessionEvent {
        let outcome = game.forfeit(self.mode.local_side());
        let _ = self.client.send(&Message::Forfeit.encode()).await;
        match outcome.winner() {
            Some(winner) => SessionEvent::win_for(winner),
            None => SessionEvent::NetworkError,
        }
    }
}

impl SessionEvent {
    fn win_for(side: Side) -> SessionEvent {
        match side {
            Side::Black => SessionEvent::BlackWins,
            Side::Red => SessionEvent::RedWins,
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Some(server) = self.server.take() {
            server.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::{Coord, SelectOutcome};
    use tokio::time::timeout;

    async fn pump_until(session: &mut Session, game: &mut Game) -> Vec<SessionEvent> {
        for _ in 0..50 {
            let events = session.pump(game);
            if !events.is_empty() {
                return events;
            }
            sleep(Duration::from_millis(20)).await;
        }
        Vec::new()
    }

    #[tokio::test]
    async fn test_handshake_and_first_turn() {
        let pending = host("127.0.0.1:0", 8, 3).await.unwrap();
        let addr = pending.addr();
        let pin = pending.pin().to_string();

        let joiner = tokio::spawn(async move { join(addr, &pin).await.unwrap() });
        let (mut host_session, mut host_game) =
            timeout(Duration::from_secs(5), pending.wait_for_joiner())
                .await
                .unwrap()
                .unwrap();
        let (mut join_session, mut join_game) = joiner.await.unwrap();

        assert_eq!(host_game.mode(), Mode::NetHost);
        assert_eq!(join_game.mode(), Mode::NetJoin);
        assert_eq!(join_game.board().dim(), 8);
        assert_eq!(host_game.side_to_move(), Side::Black);

        // Host (black) opens with a plain step and commits the turn.
        assert_eq!(host_game.select(Coord::new(2, 0)), SelectOutcome::Selected);
        assert!(matches!(host_game.select(Coord::new(3, 1)), SelectOutcome::Moved(_)));
        host_game.end_turn();
        host_session.commit_turn(&host_game).await.unwrap();

        let events = pump_until(&mut join_session, &mut join_game).await;
        assert_eq!(events, vec![SessionEvent::TurnEnded]);
        assert_eq!(join_game.board().serialize(), host_game.board().serialize());
        assert_eq!(join_game.side_to_move(), Side::Red);

        drop(host_session);
    }

    #[tokio::test]
    async fn test_joiner_departure_wins_for_host() {
        let pending = host("127.0.0.1:0", 8, 3).await.unwrap();
        let addr = pending.addr();
        let pin = pending.pin().to_string();

        let joiner = tokio::spawn(async move { join(addr, &pin).await.unwrap() });
        let (mut host_session, mut host_game) = pending.wait_for_joiner().await.unwrap();
        let (join_session, _join_game) = joiner.await.unwrap();

        drop(join_session);
        let events = pump_until(&mut host_session, &mut host_game).await;
        assert!(events.contains(&SessionEvent::BlackWins), "got {events:?}");
        assert_eq!(host_game.outcome().winner(), Some(Side::Black));
    }

    #[tokio::test]
    async fn test_join_rejects_wrong_pin() {
        let pending = host("127.0.0.1:0", 8, 3).await.unwrap();
        let addr = pending.addr();
        let wrong = if pending.pin() == "1000" { "1001" } else { "1000" };

        assert!(matches!(
            join(addr, wrong).await,
            Err(SessionError::Disconnected)
        ));
    }
}
