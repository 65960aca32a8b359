use std::sync::Arc;

use tracing::{debug, info};

use crate::commands::CommandError;
use crate::connection::Connection;
use crate::resp::RespValue;
use crate::store::Store;

/// REPLCONF subcommands:
///   - `listening-port` arrives during the handshake and registers the peer
///     as a replica;
///   - `GETACK` is the primary's probe; the answer carries the byte count
///     of master commands consumed BEFORE the probe itself;
///   - `ACK` is a replica reporting that count back; it produces no reply.
/// Everything else (e.g. `capa`) is acknowledged with `+OK`.
pub async fn replconf(
    call: &[RespValue],
    connection: &Arc<Connection>,
    store: &Arc<Store>,
) -> Result<Option<RespValue>, CommandError> {
    if call.len() < 2 {
        return Err(CommandError::InvalidArity("REPLCONF"));
    }

    let subcommand = call[1]
        .as_string()
        .ok_or(CommandError::ExpectedString("subcommand for REPLCONF"))?;

    match subcommand.to_uppercase().as_str() {
        "LISTENING-PORT" => {
            let port = call
                .get(2)
                .and_then(|value| value.as_string())
                .ok_or(CommandError::InvalidListeningPort)?;

            store.add_replica(Arc::clone(connection)).await;
            info!(replica = %connection.addr(), port, "registered replica");

            Ok(Some(RespValue::SimpleString("OK".to_string())))
        }
        "GETACK" => {
            let offset = connection.state().await.offset;
            debug!(offset, "answering ack probe");

            Ok(Some(RespValue::command(&[
                "REPLCONF",
                "ACK",
                &offset.to_string(),
            ])))
        }
        "ACK" => {
            let offset = call
                .get(2)
                .and_then(|value| value.as_int())
                .ok_or(CommandError::InvalidAckOffset)?;

            let mut state = connection.state().await;
            state.offset = offset.max(0) as usize;
            debug!(replica = %connection.addr(), offset = state.offset, "replica acknowledged offset");

            Ok(None)
        }
        _ => Ok(Some(RespValue::SimpleString("OK".to_string()))),
    }
}
