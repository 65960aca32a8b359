//! Per-peer connection state plus the reader-task/command-loop pair.
//!
//! Every socket gets two tasks: a reader that copies bytes into a bounded
//! channel (closing it on EOF or read error) and a command loop that decodes
//! one call at a time off that channel, dispatches it and writes the reply.
//! Replication offset accounting lives here: on the link to our master the
//! loop adds each command's byte count to `offset` only AFTER the command
//! has been handled, so a `REPLCONF GETACK` observes the count of bytes
//! consumed before the probe itself.

use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::{Mutex, MutexGuard, mpsc, oneshot};
use tracing::{info, trace, warn};

use crate::commands;
use crate::resp::{self, BYTE_CHANNEL_CAPACITY, ByteSource, RespError, RespValue};
use crate::store::Store;

/// How a peer relates to this node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionRole {
    /// An ordinary client.
    Normal,
    /// The primary this node replicates from.
    Master,
    /// A replica this node propagates writes to.
    Replica,
}

/// Mutable per-connection fields, all guarded by the connection's own lock.
#[derive(Debug)]
pub struct ConnectionState {
    pub relation: ConnectionRole,
    /// Last byte count this peer acknowledged (replica connections), or the
    /// bytes of master commands consumed so far (the master link).
    pub offset: usize,
    /// The propagation byte count the peer is expected to acknowledge.
    pub expected_offset: usize,
    /// Cumulative bytes of replicated commands and ack probes sent since the
    /// last PSYNC.
    pub total_propagated: usize,
    pub multi: bool,
    /// Raw calls queued between MULTI and EXEC.
    pub queued: Vec<RespValue>,
    /// Stop handle for the periodic ack probe task.
    pub ack_stop: Option<oneshot::Sender<()>>,
}

#[derive(Debug)]
pub struct Connection {
    addr: String,
    writer: Mutex<OwnedWriteHalf>,
    state: Mutex<ConnectionState>,
}

impl Connection {
    /// Wraps a socket: splits it, starts the reader task and returns the
    /// shared connection together with the inbound byte channel.
    pub fn establish(stream: TcpStream, relation: ConnectionRole) -> (Arc<Self>, ByteSource) {
        let addr = stream
            .peer_addr()
            .map(|addr| addr.to_string())
            .unwrap_or_else(|_| "unknown".to_string());

        let (read_half, write_half) = stream.into_split();
        let source = spawn_reader(read_half, addr.clone());

        let connection = Arc::new(Self {
            addr,
            writer: Mutex::new(write_half),
            state: Mutex::new(ConnectionState {
                relation,
                offset: 0,
                expected_offset: 0,
                total_propagated: 0,
                multi: false,
                queued: Vec::new(),
                ack_stop: None,
            }),
        });

        (connection, source)
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    pub async fn state(&self) -> MutexGuard<'_, ConnectionState> {
        self.state.lock().await
    }

    pub async fn relation(&self) -> ConnectionRole {
        self.state.lock().await.relation
    }

    pub async fn set_relation(&self, relation: ConnectionRole) {
        self.state.lock().await.relation = relation;
    }

    /// Whether this is the link to the primary we replicate from.
    pub async fn is_master_link(&self) -> bool {
        self.relation().await == ConnectionRole::Master
    }

    /// Writes the whole buffer, retrying short writes until complete.
    pub async fn write(&self, data: &[u8]) -> tokio::io::Result<()> {
        let mut writer = self.writer.lock().await;
        writer.write_all(data).await?;
        writer.flush().await?;

        trace!(peer = %self.addr, bytes = data.len(), "wrote to connection");

        Ok(())
    }
}

/// Starts the dedicated reader task feeding the bounded byte channel.
/// EOF and read errors close the channel, which ends the command loop.
fn spawn_reader(mut read_half: OwnedReadHalf, addr: String) -> ByteSource {
    let (sender, receiver) = mpsc::channel(BYTE_CHANNEL_CAPACITY);

    tokio::spawn(async move {
        let mut buf = [0u8; 1024];

        loop {
            match read_half.read(&mut buf).await {
                Ok(0) => break,
                Ok(read) => {
                    trace!(peer = %addr, bytes = read, "read from connection");

                    for &byte in &buf[..read] {
                        if sender.send(byte).await.is_err() {
                            return;
                        }
                    }
                }
                Err(error) => {
                    warn!(peer = %addr, %error, "failed to read from connection");
                    break;
                }
            }
        }
    });

    receiver
}

/// Decode/dispatch/reply loop for one connection. Runs until the byte
/// channel closes or a write fails, then deregisters the peer.
pub async fn run_command_loop(connection: Arc<Connection>, mut source: ByteSource, store: Arc<Store>) {
    let from_master = connection.is_master_link().await;

    loop {
        let (read, value) = match resp::decode(&mut source).await {
            Ok(decoded) => decoded,
            Err(RespError::ConnectionClosed) => break,
            Err(error) => {
                warn!(peer = %connection.addr(), %error, "failed to decode command");
                break;
            }
        };

        let Some(call) = as_command_call(value) else {
            continue;
        };

        let reply = commands::dispatch(call, &connection, &store).await;

        if let Some(reply) = reply {
            if let Err(error) = connection.write(reply.encode().as_bytes()).await {
                warn!(peer = %connection.addr(), %error, "failed to write response");
                break;
            }
        }

        if from_master {
            connection.state().await.offset += read;
        }
    }

    teardown(&connection, &store).await;
}

/// A command call is an array of values; a bare simple or bulk string acts
/// as a zero-argument command. Anything else is protocol noise.
fn as_command_call(value: RespValue) -> Option<Vec<RespValue>> {
    match value {
        RespValue::Array(elements) => {
            if elements.is_empty() {
                None
            } else {
                Some(elements)
            }
        }
        value @ (RespValue::SimpleString(_) | RespValue::BulkString(_)) => Some(vec![value]),
        _ => None,
    }
}

async fn teardown(connection: &Arc<Connection>, store: &Arc<Store>) {
    let relation = {
        let mut state = connection.state().await;

        if let Some(stop) = state.ack_stop.take() {
            let _ = stop.send(());
        }

        state.relation
    };

    if relation == ConnectionRole::Replica {
        store.remove_replica(connection).await;
    }

    info!(peer = %connection.addr(), "connection closed");
}
