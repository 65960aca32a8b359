//! Server configuration and bootstrap.
//!
//! Parses the command line, restores the RDB snapshot, installs startup
//! parameters, performs the replication handshake when running as a
//! replica, and drives the accept loop until the shutdown channel fires.

use std::path::Path;
use std::sync::Arc;

use rand::distr::{Alphanumeric, SampleString};
use regex::Regex;
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tracing::{info, warn};

use crate::connection::{Connection, ConnectionRole, run_command_loop};
use crate::rdb::{self, RdbError};
use crate::resp::{self, ByteSource, RespError, RespValue};
use crate::store::Store;

/// Errors that can occur during command-line argument parsing.
#[derive(Error, Debug, PartialEq, Clone)]
pub enum CliError {
    #[error("Invalid command line flag")]
    InvalidCommandLineFlag,
    #[error("Invalid port flag value")]
    InvalidPortFlagValue,
    #[error("Invalid master address")]
    InvalidMasterAddress,
    #[error("Invalid master port")]
    InvalidMasterPort,
}

/// Fatal startup failures. Any of these aborts the process before the
/// accept loop is entered.
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("failed to bind TCP listener: {0}")]
    Bind(tokio::io::Error),
    #[error("{0}")]
    Rdb(#[from] RdbError),
    #[error("could not connect to master: {0}")]
    MasterUnreachable(tokio::io::Error),
    #[error("failed to perform handshake: {0}")]
    Handshake(#[from] HandshakeError),
}

#[derive(Error, Debug)]
pub enum HandshakeError {
    #[error("I/O error: {0}")]
    Io(#[from] tokio::io::Error),
    #[error("protocol error: {0}")]
    Resp(#[from] RespError),
    #[error("invalid response from master: {0}")]
    InvalidResponseFromMaster(String),
}

/// Parsed server configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct RedisServer {
    /// Directory holding the RDB file.
    pub dir: String,
    /// RDB file name inside `dir`.
    pub dbfilename: String,
    /// The TCP port the server listens on.
    pub port: u32,
    /// The primary to replicate from, when running as a replica.
    pub replicaof: Option<(String, u32)>,
}

impl RedisServer {
    /// Builds a configuration from command-line arguments.
    ///
    /// Supported flags: `--dir <path>`, `--dbfilename <name>`,
    /// `--port <n>` (default 6379) and `--replicaof "<host> <port>"`.
    pub fn new<I: IntoIterator<Item = String>>(command_line_args: I) -> Result<Self, CliError> {
        let mut iter = command_line_args.into_iter().skip(1);
        let mut dir = String::new();
        let mut dbfilename = String::new();
        let mut port: Option<u32> = None;
        let mut replicaof: Option<(String, u32)> = None;

        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "--dir" => {
                    dir = iter.next().ok_or(CliError::InvalidCommandLineFlag)?;
                }
                "--dbfilename" => {
                    dbfilename = iter.next().ok_or(CliError::InvalidCommandLineFlag)?;
                }
                "--port" => {
                    let value = iter.next().ok_or(CliError::InvalidCommandLineFlag)?;
                    port = Some(parse_port(&value).ok_or(CliError::InvalidPortFlagValue)?);
                }
                "--replicaof" => {
                    let value = iter.next().ok_or(CliError::InvalidCommandLineFlag)?;
                    replicaof = Some(parse_master_address(&value)?);
                }
                _ => return Err(CliError::InvalidCommandLineFlag),
            }
        }

        Ok(RedisServer {
            dir,
            dbfilename,
            port: port.unwrap_or(6379),
            replicaof,
        })
    }

    /// Runs the server until the shutdown channel fires.
    ///
    /// Builds the store, restores the snapshot, then either installs a
    /// fresh replication id (primary) or dials the primary and performs
    /// the handshake (replica). Each accepted socket is served by its own
    /// task; in-flight connections may outlive shutdown.
    pub async fn run(&self, mut shutdown: oneshot::Receiver<()>) -> Result<(), ServerError> {
        let store = Arc::new(Store::new());

        let rdb_path = Path::new(&self.dir).join(&self.dbfilename);
        let snapshot = rdb::read_rdb_file(&rdb_path)?;

        for (key, value) in snapshot.params {
            store.set_param(&key, &value).await;
        }
        for entry in snapshot.keys {
            match entry.expires_at_ms {
                Some(deadline_ms) => {
                    store
                        .set_with_absolute_expiry(&entry.key, entry.value, deadline_ms)
                        .await
                }
                None => store.set(&entry.key, entry.value).await,
            }
        }

        store.set_param("dir", &self.dir).await;
        store.set_param("dbfilename", &self.dbfilename).await;

        let listener = TcpListener::bind(format!("0.0.0.0:{}", self.port))
            .await
            .map_err(ServerError::Bind)?;
        info!(port = self.port, "listening");

        match &self.replicaof {
            Some((host, master_port)) => {
                let master_address = format!("{}:{}", host, master_port);
                store.set_param("replicaof", &master_address).await;

                let stream = TcpStream::connect(&master_address)
                    .await
                    .map_err(ServerError::MasterUnreachable)?;
                let (master, mut source) = Connection::establish(stream, ConnectionRole::Master);

                replica_handshake(&master, &mut source, self.port).await?;
                info!(master = %master_address, "completed replication handshake");

                store.set_master(Arc::clone(&master)).await;

                let store_clone = Arc::clone(&store);
                tokio::spawn(async move {
                    run_command_loop(master, source, store_clone).await;
                });
            }
            None => {
                let replid = Alphanumeric.sample_string(&mut rand::rng(), 40);
                store.set_param("master_replid", &replid).await;
                store.set_param("master_repl_offset", "0").await;
            }
        }

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("shutting down");
                    break;
                }
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        info!(peer = %peer, "accepted connection");

                        let (connection, source) =
                            Connection::establish(stream, ConnectionRole::Normal);
                        let store_clone = Arc::clone(&store);

                        tokio::spawn(async move {
                            run_command_loop(connection, source, store_clone).await;
                        });
                    }
                    Err(error) => {
                        warn!(%error, "failed to accept connection");
                    }
                },
            }
        }

        Ok(())
    }
}

/// The replica side of the handshake: PING, both REPLCONF rounds, PSYNC,
/// then the snapshot blob. The master connection's byte channel carries
/// the replies, so nothing is lost if the primary starts streaming
/// commands immediately after the snapshot.
async fn replica_handshake(
    master: &Arc<Connection>,
    source: &mut ByteSource,
    listening_port: u32,
) -> Result<(), HandshakeError> {
    let reply = roundtrip(master, source, &["PING"]).await?;
    expect_simple(&reply, "PONG")?;

    let reply = roundtrip(
        master,
        source,
        &["REPLCONF", "listening-port", &listening_port.to_string()],
    )
    .await?;
    expect_simple(&reply, "OK")?;

    let reply = roundtrip(master, source, &["REPLCONF", "capa", "psync2"]).await?;
    expect_simple(&reply, "OK")?;

    let reply = roundtrip(master, source, &["PSYNC", "?", "-1"]).await?;
    validate_fullresync(&reply)?;

    // The snapshot is discarded; the keyspace restarts empty and the
    // command stream brings it up to date.
    let (read, snapshot) = resp::read_snapshot(source).await?;
    info!(
        bytes = read,
        snapshot_bytes = snapshot.len(),
        "received snapshot from master"
    );

    Ok(())
}

async fn roundtrip(
    master: &Arc<Connection>,
    source: &mut ByteSource,
    parts: &[&str],
) -> Result<RespValue, HandshakeError> {
    master
        .write(RespValue::command(parts).encode().as_bytes())
        .await?;

    let (_, reply) = resp::decode(source).await?;
    Ok(reply)
}

fn expect_simple(reply: &RespValue, expected: &str) -> Result<(), HandshakeError> {
    if reply != &RespValue::SimpleString(expected.to_string()) {
        return Err(HandshakeError::InvalidResponseFromMaster(reply.encode()));
    }

    Ok(())
}

fn validate_fullresync(reply: &RespValue) -> Result<(), HandshakeError> {
    let Some(line) = reply.as_string() else {
        return Err(HandshakeError::InvalidResponseFromMaster(reply.encode()));
    };

    let parts: Vec<&str> = line.split_whitespace().collect();
    let valid = parts.len() == 3
        && parts[0] == "FULLRESYNC"
        && is_valid_repl_id(parts[1])
        && parts[2].parse::<u64>().is_ok();

    if !valid {
        return Err(HandshakeError::InvalidResponseFromMaster(line.to_string()));
    }

    Ok(())
}

fn is_valid_repl_id(repl_id: &str) -> bool {
    let re = Regex::new(r"^[a-zA-Z0-9]{40}$").unwrap();
    re.is_match(repl_id)
}

/// A usable TCP port, or `None` for anything unparseable or out of range.
fn parse_port(value: &str) -> Option<u32> {
    let port = value.parse::<u32>().ok()?;
    (1..=65535).contains(&port).then_some(port)
}

/// Splits a `"<host> <port>"` master specification. The host may be an
/// IPv4 address or a hostname; the port errors are distinguished from the
/// address errors so the caller can report which half was bad.
fn parse_master_address(value: &str) -> Result<(String, u32), CliError> {
    let mut fields = value.split_whitespace();

    let (Some(host), Some(port), None) = (fields.next(), fields.next(), fields.next()) else {
        return Err(CliError::InvalidMasterAddress);
    };

    if !is_valid_host(host) {
        return Err(CliError::InvalidMasterAddress);
    }

    let port = parse_port(port).ok_or(CliError::InvalidMasterPort)?;

    Ok((host.to_string(), port))
}

fn is_valid_host(host: &str) -> bool {
    // A dotted-quad shape must actually be an IPv4 address (catches octets
    // like 300); anything else is treated as a hostname.
    if host.chars().all(|c| c.is_ascii_digit() || c == '.') {
        return host.parse::<std::net::Ipv4Addr>().is_ok();
    }

    host.chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.')
}
