//! PSYNC and the primary-side ack machinery.
//!
//! A PSYNC always answers with a full resynchronisation: the FULLRESYNC
//! line, then the snapshot in the no-trailing-CRLF bulk framing. The
//! replica's counters restart from zero and a 200 ms ticker begins probing
//! for acknowledgements whenever the replica is behind.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::commands::CommandError;
use crate::connection::Connection;
use crate::rdb;
use crate::resp::{self, RespValue};
use crate::store::Store;

pub(crate) const ACK_PROBE_INTERVAL: Duration = Duration::from_millis(200);

pub async fn psync(
    call: &[RespValue],
    connection: &Arc<Connection>,
    store: &Arc<Store>,
) -> Result<Option<RespValue>, CommandError> {
    if call.len() != 3 {
        return Err(CommandError::InvalidArity("PSYNC"));
    }

    let replid = store
        .get_param("master_replid")
        .await
        .ok_or(CommandError::NoReplicationId)?;
    let offset = store
        .get_param("master_repl_offset")
        .await
        .ok_or(CommandError::NoReplicationOffset)?;

    let resync = RespValue::SimpleString(format!("FULLRESYNC {} {}", replid, offset));
    if let Err(error) = connection.write(resync.encode().as_bytes()).await {
        warn!(replica = %connection.addr(), %error, "failed to send FULLRESYNC");
        return Ok(None);
    }

    let snapshot = resp::encode_snapshot(rdb::EMPTY_SNAPSHOT);
    if let Err(error) = connection.write(&snapshot).await {
        warn!(replica = %connection.addr(), %error, "failed to send snapshot");
        return Ok(None);
    }
    info!(replica = %connection.addr(), bytes = snapshot.len(), "sent full resync snapshot");

    {
        let mut state = connection.state().await;
        state.total_propagated = 0;
        state.expected_offset = 0;
        state.offset = 0;

        // A repeated PSYNC restarts the probe loop.
        if let Some(stop) = state.ack_stop.take() {
            let _ = stop.send(());
        }
        state.ack_stop = Some(spawn_ack_ticker(Arc::clone(connection)));
    }

    Ok(None)
}

/// Periodic probe task for one replica. Stops when the returned sender
/// fires (connection close or PSYNC restart).
pub(crate) fn spawn_ack_ticker(connection: Arc<Connection>) -> oneshot::Sender<()> {
    let (stop_sender, mut stop_receiver) = oneshot::channel();

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(ACK_PROBE_INTERVAL);

        loop {
            tokio::select! {
                _ = ticker.tick() => send_ack_probe(&connection).await,
                _ = &mut stop_receiver => break,
            }
        }
    });

    stop_sender
}

/// Sends `REPLCONF GETACK *` when the replica has unacknowledged bytes.
/// The probe itself counts toward `total_propagated`.
pub(crate) async fn send_ack_probe(connection: &Arc<Connection>) {
    let mut state = connection.state().await;

    if state.offset == state.expected_offset {
        return;
    }

    state.expected_offset = state.total_propagated;

    let probe = RespValue::command(&["REPLCONF", "GETACK", "*"]).encode();
    if let Err(error) = connection.write(probe.as_bytes()).await {
        warn!(replica = %connection.addr(), %error, "failed to send ack probe");
        return;
    }

    state.total_propagated += probe.len();
    debug!(
        replica = %connection.addr(),
        bytes = probe.len(),
        total_propagated = state.total_propagated,
        "sent ack probe"
    );
}
