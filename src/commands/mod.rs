//! Command dispatch.
//!
//! A call is a decoded array of RESP values whose first element names the
//! command. Dispatch is synchronous within the connection's handler task:
//! queueing (MULTI) is checked first, then the handler runs, then the
//! response policy is applied. A handler returning `None` means "no reply",
//! and replies to commands arriving over the link to our own master are
//! suppressed wholesale, with the single exception of `REPLCONF GETACK`,
//! which the primary always expects answered.

mod command_error;
mod config_get;
mod echo;
mod get;
mod incr;
mod info;
mod keys;
mod ping;
mod psync;
mod replconf;
mod set;
mod transactions;
mod type_command;
mod wait;
mod xadd;
mod xrange;
mod xread;

pub use command_error::CommandError;

use std::sync::Arc;

use tracing::debug;

use crate::connection::Connection;
use crate::resp::RespValue;
use crate::store::Store;

/// Handles one call and applies the response policy. The returned value, if
/// any, is the reply to write back to the peer.
pub async fn dispatch(
    call: Vec<RespValue>,
    connection: &Arc<Connection>,
    store: &Arc<Store>,
) -> Option<RespValue> {
    let reply = match handle(&call, connection, store).await {
        Ok(reply) => reply,
        Err(error) => Some(RespValue::SimpleError(error.to_string())),
    };

    // The primary does not want acknowledgements for the commands it
    // streams to us, but GETACK must be answered.
    if connection.is_master_link().await && !is_getack(&call) {
        return None;
    }

    reply
}

async fn handle(
    call: &[RespValue],
    connection: &Arc<Connection>,
    store: &Arc<Store>,
) -> Result<Option<RespValue>, CommandError> {
    let name = command_name(call)?;

    {
        let mut state = connection.state().await;
        if state.multi && name != "EXEC" && name != "DISCARD" {
            state.queued.push(RespValue::Array(call.to_vec()));
            debug!(peer = %connection.addr(), command = %name, "queued command");
            return Ok(Some(RespValue::SimpleString("QUEUED".to_string())));
        }
    }

    debug!(peer = %connection.addr(), command = %name, "received command");

    match name.as_str() {
        "PING" => ping::ping(call),
        "ECHO" => echo::echo(call),
        "SET" => {
            let reply = set::set(call, store).await?;

            // SET is the only replicated write.
            if !connection.is_master_link().await {
                store
                    .propagate_to_replicas(&RespValue::Array(call.to_vec()))
                    .await;
            }

            Ok(reply)
        }
        "GET" => get::get(call, store).await,
        "CONFIG" => config_get::config_get(call, store).await,
        "KEYS" => keys::keys(call, store).await,
        "INFO" => info::info(call, store).await,
        "REPLCONF" => replconf::replconf(call, connection, store).await,
        "PSYNC" => psync::psync(call, connection, store).await,
        "WAIT" => wait::wait(call, store).await,
        "TYPE" => type_command::type_command(call, store).await,
        "XADD" => xadd::xadd(call, store).await,
        "XRANGE" => xrange::xrange(call, store).await,
        "XREAD" => xread::xread(call, store).await,
        "INCR" => incr::incr(call, store).await,
        "MULTI" => transactions::multi(connection).await,
        "EXEC" => transactions::exec(connection, store).await,
        "DISCARD" => transactions::discard(connection).await,
        _ => Err(CommandError::UnknownCommand(name)),
    }
}

fn command_name(call: &[RespValue]) -> Result<String, CommandError> {
    call.first()
        .and_then(|value| value.as_string())
        .map(|name| name.to_uppercase())
        .ok_or(CommandError::ExpectedCommandName)
}

fn is_getack(call: &[RespValue]) -> bool {
    let Some(name) = call.first().and_then(|value| value.as_string()) else {
        return false;
    };

    name.eq_ignore_ascii_case("REPLCONF")
        && call
            .get(1)
            .and_then(|value| value.as_string())
            .is_some_and(|subcommand| subcommand.eq_ignore_ascii_case("GETACK"))
}
