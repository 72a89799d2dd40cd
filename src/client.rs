use std::io;
use std::net::SocketAddr;

use log::{debug, warn};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::protocol::MESSAGE_CEILING;

/// Inbound traffic as seen by the game loop. Events arrive on an ordered
/// queue; the receive task is the only producer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetEvent {
    /// The first message after connecting: the session pin.
    Pin(String),
    /// Any later message, still unparsed.
    Message(String),
    /// The socket was closed or failed; no further events will arrive.
    Closed,
}

/// One peer's connection to the relay. Sending is synchronous from the
/// caller's point of view; receiving runs in its own task and feeds the
/// event queue handed out by `connect`.
pub struct RelayClient {
    writer: OwnedWriteHalf,
}

impl RelayClient {
    pub async fn connect(addr: SocketAddr) -> io::Result<(RelayClient, UnboundedReceiver<NetEvent>)> {
        let stream = TcpStream::connect(addr).await?;
        let (reader, writer) = stream.into_split();
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(receive_loop(reader, tx));
        Ok((RelayClient { writer }, rx))
    }

    /// Write one whole message. There is no framing: one write is one
    /// message, and the first failure is terminal for the session.
    pub async fn send(&mut self, message: &str) -> io::Result<()> {
        debug!("sending {} bytes", message.len());
        self.writer.write_all(message.as_bytes()).await?;
        Ok(())
    }
}

async fn receive_loop(mut reader: OwnedReadHalf, events: UnboundedSender<NetEvent>) {
    let mut buf = vec![0u8; MESSAGE_CEILING];
    let mut pin_received = false;
    loop {
        match reader.read(&mut buf).await {
            Ok(0) => {
                debug!("relay closed the connection");
                let _ = events.send(NetEvent::Closed);
                break;
            }
            Ok(n) => {
                let text = String::from_utf8_lossy(&buf[..n]).into_owned();
                let event = if pin_received {
                    NetEvent::Message(text)
                } else {
                    pin_received = true;
                    NetEvent::Pin(text)
                };
                if events.send(event).is_err() {
                    // Consumer is gone; stop reading on its behalf.
                    break;
                }
            }
            Err(err) => {
                warn!("receive failed: {err}");
                let _ = events.send(NetEvent::Closed);
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relay::RelayServer;
    use std::time::Duration;
    use tokio::time::timeout;

    async fn next_event(rx: &mut UnboundedReceiver<NetEvent>) -> NetEvent {
        timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("event timed out")
            .expect("event channel closed")
    }

    #[tokio::test]
    async fn test_first_event_is_pin_then_messages() {
        let (_server, addr, pin) = RelayServer::spawn("127.0.0.1:0").await.unwrap();

        let (mut a, mut a_rx) = RelayClient::connect(addr).await.unwrap();
        let (_b, mut b_rx) = RelayClient::connect(addr).await.unwrap();
        assert_eq!(next_event(&mut a_rx).await, NetEvent::Pin(pin.clone()));
        assert_eq!(next_event(&mut b_rx).await, NetEvent::Pin(pin));

        a.send("START").await.unwrap();
        assert_eq!(next_event(&mut b_rx).await, NetEvent::Message("START".to_string()));
    }

    #[tokio::test]
    async fn test_peer_departure_surfaces_sentinel_message() {
        let (_server, addr, _pin) = RelayServer::spawn("127.0.0.1:0").await.unwrap();

        let (a, mut a_rx) = RelayClient::connect(addr).await.unwrap();
        let (_b, mut b_rx) = RelayClient::connect(addr).await.unwrap();
        next_event(&mut a_rx).await;
        next_event(&mut b_rx).await;

        drop(a);
        assert_eq!(
            next_event(&mut b_rx).await,
            NetEvent::Message("CLIENT LEFT".to_string())
        );
    }
}
