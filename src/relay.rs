use std::collections::HashMap;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use log::{debug, info, warn};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::protocol::{self, CLIENT_LEFT_MESSAGE, MESSAGE_CEILING};

/// The set of live peer connections, shared by every receive task. Only the
/// write halves live here; each read half is owned by its own task.
type Registry = Arc<Mutex<HashMap<u64, OwnedWriteHalf>>>;

/// A store-and-forward message relay. It never inspects payloads: whatever a
/// peer sends is written verbatim to every other connected peer. Exactly two
/// peers are expected, which is why broadcast is an acceptable routing rule.
pub struct RelayServer {
    listener: TcpListener,
    pin: String,
    connections: Registry,
}

impl RelayServer {
    pub async fn bind(addr: &str) -> io::Result<RelayServer> {
        let listener = TcpListener::bind(addr).await?;
        Ok(RelayServer {
            listener,
            pin: protocol::generate_pin(),
            connections: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// The session pin every connecting peer is greeted with.
    pub fn pin(&self) -> &str {
        &self.pin
    }

    /// Bind and run in a background task. Returns the handle, the bound
    /// address and the session pin.
    pub async fn spawn(addr: &str) -> io::Result<(JoinHandle<io::Result<()>>, SocketAddr, String)> {
        let server = RelayServer::bind(addr).await?;
        let addr = server.local_addr()?;
        let pin = server.pin.clone();
        Ok((tokio::spawn(server.run()), addr, pin))
    }

    /// Accept connections forever, one receive task per peer.
    pub async fn run(self) -> io::Result<()> {
        info!("relay listening on {}", self.local_addr()?);
        let mut next_id: u64 = 0;
        loop {
            let (stream, peer) = self.listener.accept().await?;
            let id = next_id;
            next_id += 1;
            info!("peer #{id} connected from {peer}");

            let pin = self.pin.clone();
            let connections = Arc::clone(&self.connections);
            tokio::spawn(async move {
                if let Err(err) = serve_peer(stream, id, pin, connections).await {
                    warn!("peer #{id} task failed: {err}");
                }
            });
        }
    }
}

async fn serve_peer(stream: TcpStream, id: u64, pin: String, connections: Registry) -> io::Result<()> {
    let (reader, mut writer) = stream.into_split();
    writer.write_all(pin.as_bytes()).await?;
    connections.lock().await.insert(id, writer);

    receive_loop(reader, id, &connections).await;

    connections.lock().await.remove(&id);
    info!("peer #{id} left");
    broadcast(&connections, None, CLIENT_LEFT_MESSAGE.as_bytes()).await;
    Ok(())
}

async fn receive_loop(mut reader: OwnedReadHalf, id: u64, connections: &Registry) {
    let mut buf = vec![0u8; MESSAGE_CEILING];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                debug!("peer #{id} relayed {n} bytes");
                broadcast(connections, Some(id), &buf[..n]).await;
            }
            Err(err) => {
                warn!("peer #{id} read failed: {err}");
                break;
            }
        }
    }
}

/// Forward `payload` to every registered connection except `from`. Peers
/// whose sockets fail on write are dropped from the registry on the spot.
async fn broadcast(connections: &Registry, from: Option<u64>, payload: &[u8]) {
    let mut registry = connections.lock().await;
    let mut dead = Vec::new();
    for (&id, writer) in registry.iter_mut() {
        if Some(id) == from {
            continue;
        }
        if let Err(err) = writer.write_all(payload).await {
            warn!("dropping peer #{id}, write failed: {err}");
            dead.push(id);
        }
    }
    for id in dead {
        registry.remove(&id);
    }
}
