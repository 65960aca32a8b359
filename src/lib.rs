//! A wire-compatible clone of a single-node in-memory key-value server.
//!
//! The crate speaks RESP2 (plus the RESP3 Null, Boolean, Map and Set
//! extensions) over TCP and supports:
//!
//! - string operations with per-key expiry (GET, SET, INCR, TYPE, KEYS)
//! - streams with composite monotonic identifiers (XADD, XRANGE, XREAD,
//!   including blocking reads)
//! - connection-scoped transactions (MULTI, EXEC, DISCARD)
//! - leader/follower replication: handshake, RDB snapshot transfer,
//!   command propagation with offset accounting, and the WAIT barrier
//! - restoring persisted keys from an RDB file on startup
//!
//! Concurrency is task-per-connection on Tokio: a reader task feeds each
//! connection's byte channel and a handler task decodes and dispatches
//! commands from it.

pub mod commands;
pub mod connection;
pub mod rdb;
pub mod resp;
pub mod server;
pub mod store;
pub mod stream;
