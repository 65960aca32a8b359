//! MULTI/EXEC/DISCARD: connection-scoped command queueing.
//!
//! Queueing itself happens in the dispatcher (any command other than
//! EXEC/DISCARD seen while `multi` is set is appended raw and answered
//! `+QUEUED`); these handlers only flip the flag and drain the queue.

use std::sync::Arc;

use crate::commands::{CommandError, dispatch};
use crate::connection::Connection;
use crate::resp::RespValue;
use crate::store::Store;

pub async fn multi(connection: &Arc<Connection>) -> Result<Option<RespValue>, CommandError> {
    connection.state().await.multi = true;

    Ok(Some(RespValue::SimpleString("OK".to_string())))
}

/// EXEC drains the queue and re-dispatches every call in order through the
/// normal dispatcher, collecting the replies into one array. A suppressed
/// sub-reply renders as a null bulk string.
pub async fn exec(
    connection: &Arc<Connection>,
    store: &Arc<Store>,
) -> Result<Option<RespValue>, CommandError> {
    let queued = {
        let mut state = connection.state().await;

        if !state.multi {
            return Err(CommandError::ExecWithoutMulti);
        }

        state.multi = false;
        std::mem::take(&mut state.queued)
    };

    let mut results = Vec::with_capacity(queued.len());
    for raw_call in queued {
        let RespValue::Array(sub_call) = raw_call else {
            continue;
        };

        let reply = Box::pin(dispatch(sub_call, connection, store)).await;
        results.push(reply.unwrap_or(RespValue::NullBulkString));
    }

    Ok(Some(RespValue::Array(results)))
}

pub async fn discard(connection: &Arc<Connection>) -> Result<Option<RespValue>, CommandError> {
    let mut state = connection.state().await;

    if !state.multi {
        return Err(CommandError::DiscardWithoutMulti);
    }

    state.multi = false;
    state.queued.clear();

    Ok(Some(RespValue::SimpleString("OK".to_string())))
}
